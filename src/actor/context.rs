//! Per-dispatch context handed to every handler.

use std::fmt;

use serde_json::Value;

use crate::actor::handle::ActorHandle;
use crate::actor::runtime::ActorConfig;
use crate::error::{AskError, SendError};
use crate::signal::SignalReader;
use crate::transport::SharedTransport;
use crate::types::{ActorId, ActorStatus, Args};

/// Actor execution context.
///
/// Cheap to clone. Provides:
/// - The actor's unique ID and, while dispatching a request, the caller's
/// - Handles to itself and to other actors on its internal transport
/// - The actor's lifecycle status
#[derive(Clone)]
pub struct ActorContext {
    actor_id: ActorId,
    transport: SharedTransport,
    config: ActorConfig,
    status: SignalReader<ActorStatus>,
    caller: Option<ActorId>,
}

impl ActorContext {
    pub(crate) fn new(
        actor_id: ActorId,
        transport: SharedTransport,
        config: ActorConfig,
        status: SignalReader<ActorStatus>,
    ) -> Self {
        Self {
            actor_id,
            transport,
            config,
            status,
            caller: None,
        }
    }

    pub(crate) fn for_request(&self, caller: Option<ActorId>) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }

    /// Returns the unique identifier of this actor.
    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    /// Returns the caller of the message being handled, if it was a `call`.
    pub fn caller(&self) -> Option<&ActorId> {
        self.caller.as_ref()
    }

    /// Returns the current lifecycle status of the actor.
    pub fn status(&self) -> ActorStatus {
        self.status.read()
    }

    /// Returns a handle to this actor, e.g. to cast to itself.
    pub fn self_handle(&self) -> ActorHandle {
        self.handle(self.actor_id.clone())
    }

    /// Returns a handle to `target` on this actor's internal transport.
    pub fn handle(&self, target: impl Into<ActorId>) -> ActorHandle {
        ActorHandle::new(target, self.transport.clone()).with_config(&self.config)
    }

    /// Sends a fire-and-forget message to `target`.
    pub async fn cast(
        &self,
        target: impl Into<ActorId>,
        action: &str,
        args: Args,
    ) -> Result<(), SendError> {
        self.handle(target).cast(action, args).await
    }

    /// Calls `target` with this actor as the caller.
    ///
    /// The reply is awaited inside the current handler, so the actor
    /// processes nothing else meanwhile.
    pub async fn call(
        &self,
        target: impl Into<ActorId>,
        action: &str,
        args: Args,
    ) -> Result<Value, AskError> {
        self.handle(target).call(&self.actor_id, action, args).await
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("actor_id", &self.actor_id)
            .field("transport", &self.transport.name())
            .field("caller", &self.caller)
            .finish()
    }
}
