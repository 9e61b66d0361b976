//! Supervision trees: restart strategies, child tables and supervisor servers.
//!
//! A supervisor owns a set of [`Child`]ren. It starts each on its own task,
//! watches how it exits and restarts it according to the group
//! [`RestartStrategy`] and the child's own [`ChildRestart`] policy.
//! Cancellation flows down the tree through derived signals: a child runs
//! only while its parent and its private record signal are both live.
//!
//! [`ChildRestart`]: crate::types::ChildRestart

/// The `Child` capability and supervised entries.
pub mod child;
/// Supervisors that accept new children at runtime.
pub mod dynamic;
/// Per-supervisor child table.
pub mod records;
/// Restart strategies.
pub mod supervise;

use async_trait::async_trait;
use serde_json::Value;

use crate::actor::handle::ActorHandle;
use crate::actor::handler::arg;
use crate::actor::runtime::{ActorConfig, ActorRuntime, AdminHandler};
use crate::error::{ActorResult, AskError, SendError};
use crate::log::{debug, info};
use crate::signal::{Signal, SignalReader};
use crate::transport::SharedTransport;
use crate::types::{short_type_name, ActorId, Args, ChildSpec, Envelope, RestartStrategy};

pub use child::{Child, SharedChild, Supervised};
pub use dynamic::{ChildFactory, DynamicSupervisor};
pub use records::SupervisionRecords;
pub use supervise::supervise;

/// Declares the children of a static supervisor.
pub trait Supervisor: Send + Sync + 'static {
    /// Registered identity, also the mailbox address. Defaults to the type name.
    fn name(&self) -> ActorId {
        ActorId::from(short_type_name::<Self>())
    }

    /// Children to start, in order. Called once per supervisor start.
    fn children(&self) -> Vec<Supervised>;

    /// Contract used when this supervisor is itself supervised.
    fn child_spec(&self) -> ChildSpec {
        ChildSpec::supervisor()
    }
}

#[async_trait]
impl AdminHandler for SupervisionRecords {
    async fn administer(&self, envelope: &Envelope) -> ActorResult<Option<Value>> {
        match envelope.action.as_str() {
            "stopChild" => {
                let id: String = arg(&envelope.payload, 0)?;
                if !self.stop_child(&ActorId::from(id.as_str())) {
                    debug!(child = %id, "stopChild for unknown child ignored");
                }
                Ok(None)
            }
            "lookup" => {
                let ids: Vec<String> = self.ids().iter().map(ToString::to_string).collect();
                Ok(Some(Value::from(ids)))
            }
            other => {
                debug!(action = other, "unknown administrative action ignored");
                Ok(None)
            }
        }
    }
}

/// A [`Supervisor`] composed with the runtime that serves its management
/// address.
pub struct SupervisorServer<S: Supervisor> {
    supervisor: S,
    runtime: ActorRuntime,
    records: SupervisionRecords,
}

impl<S: Supervisor> SupervisorServer<S> {
    /// Binds `supervisor` to `transport` under its declared name.
    pub fn new(supervisor: S, transport: SharedTransport) -> Self {
        let runtime = ActorRuntime::new(supervisor.name(), transport, ActorConfig::default());
        Self {
            supervisor,
            runtime,
            records: SupervisionRecords::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ActorConfig) -> Self {
        self.runtime = self.runtime.with_config(config);
        self
    }

    /// Also listens on `transport`.
    pub fn with_external(mut self, transport: SharedTransport) -> Self {
        self.runtime = self.runtime.with_external(transport);
        self
    }

    /// The wrapped supervisor.
    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    /// The live child table.
    pub fn records(&self) -> &SupervisionRecords {
        &self.records
    }

    /// Client handle for the administrative API.
    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle::from(self.runtime.handle())
    }
}

#[async_trait]
impl<S: Supervisor> Child for SupervisorServer<S> {
    fn id(&self) -> ActorId {
        self.runtime.id().clone()
    }

    fn child_spec(&self) -> ChildSpec {
        self.supervisor.child_spec()
    }

    async fn start(&self, args: Args, cancel: SignalReader<bool>) -> ActorResult<()> {
        let strategy = RestartStrategy::from_args(&args);
        let local = Signal::new(true);
        let scope = SignalReader::all(vec![cancel, local.reader()]);
        self.records.reset();
        info!(supervisor = %self.runtime.id(), strategy = %strategy, "supervisor starting");

        let supervision = async {
            let mut children = self.supervisor.children();
            while scope.is_live() && !children.is_empty() {
                children = supervise(children, strategy, &scope, &self.records).await;
            }
            scope.cancelled().await;
        };
        let admin = async {
            let outcome = self.runtime.administer(&local, &scope, &self.records).await;
            local.cancel();
            outcome
        };
        let ((), outcome) = tokio::join!(supervision, admin);
        self.runtime.reset_mailbox();
        info!(supervisor = %self.runtime.id(), "supervisor stopped");
        outcome
    }
}

/// Client API of a supervisor's management address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SupervisorHandle {
    inner: ActorHandle,
}

impl From<ActorHandle> for SupervisorHandle {
    fn from(inner: ActorHandle) -> Self {
        Self { inner }
    }
}

impl SupervisorHandle {
    /// Addresses the supervisor registered as `id` on `transport`.
    pub fn new(id: impl Into<ActorId>, transport: SharedTransport) -> Self {
        Self::from(ActorHandle::new(id, transport))
    }

    /// Identity of the supervisor.
    pub fn id(&self) -> &ActorId {
        self.inner.id()
    }

    /// Cancels the child registered as `child`. Unknown ids are ignored.
    pub async fn stop_child(&self, child: &ActorId) -> Result<(), SendError> {
        self.inner
            .management()
            .cast("stopChild", vec![Value::from(child.as_str())])
            .await
    }

    /// Returns the ids of the currently registered children.
    pub async fn lookup(&self, caller: &ActorId) -> Result<Vec<ActorId>, AskError> {
        let reply = self
            .inner
            .management()
            .call(caller, "lookup", Vec::new())
            .await?;
        let ids: Vec<String> =
            serde_json::from_value(reply).map_err(|err| AskError::Malformed(err.to_string()))?;
        Ok(ids.into_iter().map(ActorId::from).collect())
    }

    /// Asks a [`DynamicSupervisor`] to start a child built by the factory
    /// registered as `kind`, and returns the new child's id.
    ///
    /// `spec` overrides the child's declared spec.
    pub async fn start_child(
        &self,
        caller: &ActorId,
        kind: &str,
        spec: Option<ChildSpec>,
    ) -> Result<ActorId, AskError> {
        let spec = serde_json::to_value(spec).map_err(|err| AskError::Malformed(err.to_string()))?;
        let reply = self
            .inner
            .management()
            .call(caller, "startChild", vec![Value::from(kind), spec])
            .await?;
        match reply {
            Value::String(id) => Ok(ActorId::from(id)),
            other => Err(AskError::Malformed(other.to_string())),
        }
    }

    /// Cancels the supervisor and, through it, every child.
    pub async fn stop(&self) -> Result<(), SendError> {
        self.inner.stop().await
    }
}
