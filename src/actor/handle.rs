//! Handle-based communication API for actors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;

use crate::actor::runtime::ActorConfig;
use crate::error::{AskError, SendError};
use crate::log::debug;
use crate::signal::SignalReader;
use crate::transport::{SharedTransport, DEFAULT_CALL_TIMEOUT, DEFAULT_SEND_TIMEOUT};
use crate::types::{ActorId, Args, Envelope};

static NEXT_CORRELATION: AtomicU64 = AtomicU64::new(1);

fn next_correlation() -> u64 {
    NEXT_CORRELATION.fetch_add(1, Ordering::Relaxed)
}

/// Cloneable handle that callers use to communicate with an actor.
///
/// A handle is an address on one transport; it does not keep the actor alive
/// and stays valid across restarts.
#[derive(Clone)]
pub struct ActorHandle {
    id: ActorId,
    transport: SharedTransport,
    send_timeout: Duration,
    call_timeout: Duration,
}

impl std::fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .finish()
    }
}

impl PartialEq for ActorHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.transport.name() == other.transport.name()
    }
}

impl Eq for ActorHandle {}

impl std::hash::Hash for ActorHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.transport.name().hash(state);
    }
}

impl ActorHandle {
    /// Creates a handle to `id` on `transport` with default timeouts.
    pub fn new(id: impl Into<ActorId>, transport: SharedTransport) -> Self {
        Self {
            id: id.into(),
            transport,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Adopts the send and call timeouts of `config`.
    pub fn with_config(mut self, config: &ActorConfig) -> Self {
        self.send_timeout = config.send_timeout;
        self.call_timeout = config.call_timeout;
        self
    }

    /// Overrides the default call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Overrides the send timeout.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Returns the unique identifier of the actor.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Returns the transport this handle sends on.
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Returns a handle addressed at this actor's administration mailbox.
    pub fn management(&self) -> ActorHandle {
        Self {
            id: ActorId::from(self.id.management()),
            ..self.clone()
        }
    }

    /// Returns the current number of messages in the mailbox.
    pub fn mailbox_len(&self) -> usize {
        self.transport.len(self.id.as_str())
    }

    /// Sends a message without waiting for a reply (fire-and-forget).
    ///
    /// Waits for mailbox space up to the send timeout.
    ///
    /// # Errors
    /// Returns `SendError::Timeout` if the mailbox stayed full.
    pub async fn cast(&self, action: &str, args: Args) -> Result<(), SendError> {
        self.transport
            .send(
                self.id.as_str(),
                Envelope::new(action, args),
                self.send_timeout,
            )
            .await
    }

    /// Sends a request and waits for the reply, using the handle's call timeout.
    ///
    /// # Errors
    /// - `AskError::Send` if the request could not be delivered.
    /// - `AskError::Timeout` if no reply arrived in time. This is an
    ///   expected outcome: handlers may choose not to reply at all.
    pub async fn call(&self, caller: &ActorId, action: &str, args: Args) -> Result<Value, AskError> {
        self.call_with_timeout(caller, action, args, self.call_timeout)
            .await
    }

    /// Like [`ActorHandle::call`] with an explicit timeout.
    ///
    /// A caller id should have at most one call in flight: concurrent calls
    /// from the same id may discard each other's replies (they then time out,
    /// they never receive the wrong reply).
    pub async fn call_with_timeout(
        &self,
        caller: &ActorId,
        action: &str,
        args: Args,
        timeout: Duration,
    ) -> Result<Value, AskError> {
        let correlation = next_correlation();
        let request = Envelope::new(action, args).with_caller(caller.clone(), correlation);
        self.transport
            .send(self.id.as_str(), request, self.send_timeout)
            .await?;

        let address = caller.reply_address();
        let never = SignalReader::constant(true);
        let wait = async {
            loop {
                let envelope = self.transport.receive_one(&address, &never, timeout).await?;
                if envelope.is_reply() && envelope.correlation == Some(correlation) {
                    return Some(envelope.payload.into_iter().next().unwrap_or(Value::Null));
                }
                debug!(
                    caller = %caller,
                    correlation = ?envelope.correlation,
                    "discarding stale reply"
                );
            }
        };
        // `tokio::time::timeout` saturates, so `Duration::MAX` waits forever.
        let reply = tokio::time::timeout(timeout, wait).await.ok().flatten();
        if self.transport.is_empty(&address) {
            self.transport.reset_address(&address);
        }
        reply.ok_or(AskError::Timeout(timeout))
    }

    /// Asks the actor to stop after the message it is currently handling.
    pub async fn stop(&self) -> Result<(), SendError> {
        self.management().cast("stop", Vec::new()).await
    }
}
