//! Message transports: bounded, address-keyed mailboxes.
//!
//! Every actor, supervisor and application is bound to exactly one internal
//! transport and any number of named external ones. A transport owns one
//! bounded FIFO queue per address. `send` waits for space up to a timeout.
//! `receive_one` waits for an envelope up to a timeout and gives up early
//! when the caller's cancellation signal flips.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SendError;
use crate::signal::SignalReader;
use crate::types::Envelope;

/// Fan-in reader over several transports.
pub mod combined;
/// In-process transport backed by bounded Tokio channels.
pub mod memory;

pub use combined::CombinedReader;
pub use memory::InMemoryTransport;

/// Default time a sender waits for mailbox space.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Default time a `call` waits for its reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(5_000);
/// Default wait of one iteration of a background receive loop.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Shared, type-erased transport.
pub type SharedTransport = Arc<dyn Transport>;

/// Capability interface every transport provides.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Name stamped on envelopes that travel on this transport.
    fn name(&self) -> &str;

    /// Enqueues `envelope` for `address`, waiting up to `timeout` for space.
    ///
    /// FIFO order is preserved among sends from the same producer.
    async fn send(
        &self,
        address: &str,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<(), SendError>;

    /// Takes an already-buffered envelope without waiting.
    fn try_receive(&self, address: &str) -> Option<Envelope>;

    /// Takes one envelope for `address`.
    ///
    /// Returns immediately when one is buffered. Otherwise waits until one
    /// arrives, `timeout` elapses, or `cancel` reads `false`; the last two
    /// yield `None`. Each envelope is claimed by exactly one waiter.
    async fn receive_one(
        &self,
        address: &str,
        cancel: &SignalReader<bool>,
        timeout: Duration,
    ) -> Option<Envelope>;

    /// Discards every queue. Addresses are recreated on next use.
    fn reset(&self);

    /// Discards the queue of a single address.
    fn reset_address(&self, address: &str);

    /// Number of envelopes currently buffered for `address`.
    fn len(&self, address: &str) -> usize;

    /// Returns true when nothing is buffered for `address`.
    fn is_empty(&self, address: &str) -> bool {
        self.len(address) == 0
    }
}
