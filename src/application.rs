//! The root of a supervision tree.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::log::{info, warn};
use crate::signal::Signal;
use crate::supervisor::{supervise, SharedChild, SupervisionRecords, Supervised};
use crate::types::{ActorId, RestartStrategy};

/// Top-level children and the strategy they are supervised with.
#[derive(Debug, Clone)]
pub struct ApplicationSpec {
    /// Root restart strategy.
    pub strategy: RestartStrategy,
    /// Top-level children, in start order.
    pub supervise: Vec<Supervised>,
}

impl ApplicationSpec {
    /// An empty tree supervised with `strategy`.
    pub fn new(strategy: RestartStrategy) -> Self {
        Self {
            strategy,
            supervise: Vec::new(),
        }
    }

    /// Adds a child under its own declared spec.
    pub fn with_child(mut self, child: SharedChild) -> Self {
        self.supervise.push(Supervised::new(child));
        self
    }

    /// Adds an already paired child.
    pub fn with_supervised(mut self, entry: Supervised) -> Self {
        self.supervise.push(entry);
        self
    }

    /// How long `stop` waits: the largest declared budget, or `None` when any
    /// child declares an unbounded one or there are no children to bound it.
    pub fn shutdown_budget(&self) -> Option<Duration> {
        if self.supervise.is_empty() {
            return None;
        }
        self.supervise
            .iter()
            .try_fold(Duration::ZERO, |budget, entry| {
                entry.spec.shutdown.map(|shutdown| budget.max(shutdown))
            })
    }
}

/// Owns the root cancellation signal of a supervision tree.
///
/// [`Application::start`] supervises the declared children and keeps running
/// until [`Application::stop`] is called, so a `main` that awaits it stays
/// alive while the tree is idle.
#[derive(Debug)]
pub struct Application {
    spec: ApplicationSpec,
    root: Signal<bool>,
    running: Signal<bool>,
    records: SupervisionRecords,
}

impl Application {
    /// Prepares the tree. Nothing runs until [`Application::start`].
    pub fn new(spec: ApplicationSpec) -> Self {
        Self {
            spec,
            root: Signal::new(true),
            running: Signal::new(false),
            records: SupervisionRecords::new(),
        }
    }

    /// Runs the tree until the root signal is cancelled.
    pub async fn start(&self) {
        let scope = self.root.reader();
        if !scope.is_live() {
            warn!("application already stopped");
            return;
        }
        self.running.write(true);
        info!(strategy = %self.spec.strategy, children = self.spec.supervise.len(), "application starting");
        let mut children = self.spec.supervise.clone();
        while scope.is_live() && !children.is_empty() {
            children = supervise(children, self.spec.strategy, &scope, &self.records).await;
        }
        scope.cancelled().await;
        self.running.write(false);
        info!("application stopped");
    }

    /// Runs [`Application::start`] on its own task.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.start().await })
    }

    /// Cancels the root signal and waits for the tree to drain, up to the
    /// spec's [`shutdown budget`](ApplicationSpec::shutdown_budget).
    ///
    /// Returns false if the budget elapsed first. Never fails otherwise.
    pub async fn stop(&self) -> bool {
        self.root.cancel();
        let running = self.running.reader();
        let drained = running.wait_for(|running| !*running);
        match self.spec.shutdown_budget() {
            Some(budget) => {
                let drained = tokio::time::timeout(budget, drained).await.is_ok();
                if !drained {
                    warn!(budget = ?budget, "application did not drain in time");
                }
                drained
            }
            None => {
                drained.await;
                true
            }
        }
    }

    /// Returns true between `start` and the end of the drain.
    pub fn is_running(&self) -> bool {
        self.running.read()
    }

    /// Ids of the top-level children currently registered.
    pub fn children(&self) -> Vec<ActorId> {
        self.records.ids()
    }
}
