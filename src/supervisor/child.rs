use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ActorResult;
use crate::signal::SignalReader;
use crate::types::{ActorId, Args, ChildSpec};

/// Anything a supervisor can start, monitor and restart.
///
/// Implemented by [`Server`](crate::actor::runtime::Server) for plain actors
/// and by [`SupervisorServer`](crate::supervisor::SupervisorServer) for
/// nested supervisors.
#[async_trait]
pub trait Child: Send + Sync + 'static {
    /// Identity recorded in the parent's supervision records.
    fn id(&self) -> ActorId;

    /// Restart and shutdown contract.
    fn child_spec(&self) -> ChildSpec;

    /// Runs until `cancel` reads `false` or the child stops on its own.
    ///
    /// An `Err` is a failure outcome; it is never retried in place.
    async fn start(&self, args: Args, cancel: SignalReader<bool>) -> ActorResult<()>;
}

/// Shared, type-erased child.
pub type SharedChild = Arc<dyn Child>;

/// A child paired with the spec it is supervised under.
#[derive(Clone)]
pub struct Supervised {
    /// The child.
    pub child: SharedChild,
    /// Its restart contract, read once per termination.
    pub spec: ChildSpec,
}

impl Supervised {
    /// Pairs `child` with its own declared spec.
    pub fn new(child: SharedChild) -> Self {
        let spec = child.child_spec();
        Self { child, spec }
    }

    /// Pairs `child` with an explicit spec.
    pub fn with_spec(child: SharedChild, spec: ChildSpec) -> Self {
        Self { child, spec }
    }

    /// Identity of the child.
    pub fn id(&self) -> ActorId {
        self.child.id()
    }
}

impl fmt::Debug for Supervised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervised")
            .field("id", &self.child.id())
            .field("spec", &self.spec)
            .finish()
    }
}
