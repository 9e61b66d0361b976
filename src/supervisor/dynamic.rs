use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::actor::handler::arg;
use crate::actor::runtime::{ActorConfig, ActorRuntime, AdminHandler};
use crate::error::{ActorError, ActorResult};
use crate::log::{info, warn};
use crate::signal::{Signal, SignalReader};
use crate::supervisor::child::{Child, SharedChild, Supervised};
use crate::supervisor::records::SupervisionRecords;
use crate::supervisor::supervise::keep_running;
use crate::supervisor::SupervisorHandle;
use crate::transport::SharedTransport;
use crate::types::{ActorId, Args, ChildSpec, Envelope};

/// Builds a fresh child for a `startChild` request.
pub type ChildFactory = Arc<dyn Fn() -> SharedChild + Send + Sync>;

/// A supervisor without declared children.
///
/// Children are added at runtime with `startChild [kind, spec]` requests on
/// its management address, where `kind` names a factory registered with
/// [`DynamicSupervisor::register`]. Every child runs its own ONE_FOR_ONE
/// restart loop. `stopChild` and `lookup` behave as for static supervisors.
pub struct DynamicSupervisor {
    runtime: ActorRuntime,
    records: SupervisionRecords,
    factories: HashMap<String, ChildFactory>,
    spec: ChildSpec,
}

impl DynamicSupervisor {
    /// Creates a dynamic supervisor registered as `name` on `transport`.
    pub fn new(name: impl Into<ActorId>, transport: SharedTransport) -> Self {
        Self {
            runtime: ActorRuntime::new(name, transport, ActorConfig::default()),
            records: SupervisionRecords::new(),
            factories: HashMap::new(),
            spec: ChildSpec::permanent(),
        }
    }

    /// Makes `kind` startable.
    pub fn register<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> SharedChild + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ActorConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    /// Replaces the contract used when this supervisor is itself supervised.
    pub fn with_child_spec(mut self, spec: ChildSpec) -> Self {
        self.spec = spec;
        self
    }

    /// The live child table.
    pub fn records(&self) -> &SupervisionRecords {
        &self.records
    }

    /// Client handle, including [`SupervisorHandle::start_child`].
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::from(self.runtime.handle())
    }
}

impl fmt::Debug for DynamicSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.factories.keys().collect();
        kinds.sort();
        f.debug_struct("DynamicSupervisor")
            .field("id", self.runtime.id())
            .field("kinds", &kinds)
            .field("records", &self.records)
            .finish()
    }
}

struct Starter {
    records: SupervisionRecords,
    factories: HashMap<String, ChildFactory>,
    scope: SignalReader<bool>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Starter {
    fn start_child(&self, payload: &Args) -> ActorResult<ActorId> {
        let kind: String = arg(payload, 0)?;
        let spec: Option<ChildSpec> = arg(payload, 1)?;
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ActorError::user(format!("no child factory registered as `{kind}`")))?;
        let child = factory();
        let id = child.id();
        let entry = match spec {
            Some(spec) => Supervised::with_spec(child, spec),
            None => Supervised::new(child),
        };
        info!(child = %id, kind = %kind, "starting dynamic child");
        let task = tokio::spawn(keep_running(entry, self.scope.clone(), self.records.clone()));
        let mut loops = self.loops.lock();
        loops.retain(|task| !task.is_finished());
        loops.push(task);
        Ok(id)
    }
}

#[async_trait]
impl AdminHandler for Starter {
    async fn administer(&self, envelope: &Envelope) -> ActorResult<Option<Value>> {
        if envelope.action != "startChild" {
            return self.records.administer(envelope).await;
        }
        // An unknown kind is a caller error, not a supervisor failure.
        match self.start_child(&envelope.payload) {
            Ok(id) => Ok(Some(Value::from(id.as_str()))),
            Err(err) => {
                warn!(error = %err, "startChild rejected");
                Ok(Some(Value::Null))
            }
        }
    }
}

#[async_trait]
impl Child for DynamicSupervisor {
    fn id(&self) -> ActorId {
        self.runtime.id().clone()
    }

    fn child_spec(&self) -> ChildSpec {
        self.spec.clone()
    }

    async fn start(&self, _args: Args, cancel: SignalReader<bool>) -> ActorResult<()> {
        let local = Signal::new(true);
        let scope = SignalReader::all(vec![cancel, local.reader()]);
        self.records.reset();
        let starter = Starter {
            records: self.records.clone(),
            factories: self.factories.clone(),
            scope: scope.clone(),
            loops: Mutex::new(Vec::new()),
        };
        info!(supervisor = %self.runtime.id(), "dynamic supervisor starting");
        let outcome = self.runtime.administer(&local, &scope, &starter).await;
        local.cancel();
        let loops = std::mem::take(&mut *starter.loops.lock());
        future::join_all(loops).await;
        self.runtime.reset_mailbox();
        info!(supervisor = %self.runtime.id(), "dynamic supervisor stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Blip;

    #[async_trait]
    impl Child for Blip {
        fn id(&self) -> ActorId {
            ActorId::from("blip")
        }

        fn child_spec(&self) -> ChildSpec {
            ChildSpec::temporary()
        }

        async fn start(&self, _args: Args, _cancel: SignalReader<bool>) -> ActorResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn finished_child_loops_are_pruned() {
        let live = Signal::new(true);
        let factory: ChildFactory = Arc::new(|| -> SharedChild { Arc::new(Blip) });
        let starter = Starter {
            records: SupervisionRecords::new(),
            factories: HashMap::from([("blip".to_string(), factory)]),
            scope: live.reader(),
            loops: Mutex::new(Vec::new()),
        };
        let request = vec![Value::from("blip")];

        for _ in 0..5 {
            assert_eq!(starter.start_child(&request).unwrap(), ActorId::from("blip"));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(starter.loops.lock().len(), 1, "only the latest loop is kept");
        assert!(starter.records.is_empty());
        assert!(starter.start_child(&vec![Value::from("unknown")]).is_err());
    }
}
