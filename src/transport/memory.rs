use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex};

use crate::actor::runtime::MailboxConfig;
use crate::error::SendError;
use crate::log::trace;
use crate::signal::SignalReader;
use crate::transport::Transport;
use crate::types::Envelope;

struct Queue {
    tx: mpsc::Sender<Envelope>,
    // Waiters serialize on the receiver so each envelope has one claimant.
    rx: Mutex<mpsc::Receiver<Envelope>>,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    fn try_take(&self) -> Option<Envelope> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

/// In-process transport: one bounded FIFO queue per address.
///
/// Queues are created implicitly on first send or receive, with the capacity
/// the transport was built with.
pub struct InMemoryTransport {
    name: String,
    capacity: usize,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl InMemoryTransport {
    /// Creates a transport whose queues hold at most `capacity` envelopes.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Creates the conventional `internal` transport.
    pub fn internal(config: &MailboxConfig) -> Self {
        Self::new("internal", config.capacity)
    }

    /// Convenience constructor returning a shared handle.
    pub fn shared(name: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(name, capacity))
    }

    /// Capacity of every queue of this transport.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of addresses that currently own a queue.
    pub fn address_count(&self) -> usize {
        self.queues.read().len()
    }

    fn queue(&self, address: &str) -> Arc<Queue> {
        if let Some(queue) = self.queues.read().get(address) {
            return queue.clone();
        }
        self.queues
            .write()
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Queue::new(self.capacity)))
            .clone()
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("addresses", &self.address_count())
            .finish()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        address: &str,
        mut envelope: Envelope,
        timeout: Duration,
    ) -> Result<(), SendError> {
        envelope.transport = Some(self.name.clone());
        let queue = self.queue(address);
        queue
            .tx
            .send_timeout(envelope, timeout)
            .await
            .map_err(|err| match err {
                mpsc::error::SendTimeoutError::Timeout(_) => {
                    trace!(transport = %self.name, address, "send timed out on a full mailbox");
                    SendError::Timeout {
                        address: address.to_string(),
                        timeout,
                    }
                }
                mpsc::error::SendTimeoutError::Closed(_) => SendError::Closed(address.to_string()),
            })
    }

    fn try_receive(&self, address: &str) -> Option<Envelope> {
        self.queue(address).try_take()
    }

    async fn receive_one(
        &self,
        address: &str,
        cancel: &SignalReader<bool>,
        timeout: Duration,
    ) -> Option<Envelope> {
        let queue = self.queue(address);
        if let Some(envelope) = queue.try_take() {
            return Some(envelope);
        }
        tokio::select! {
            biased;
            envelope = async { queue.rx.lock().await.recv().await } => envelope,
            _ = cancel.cancelled() => None,
            _ = tokio::time::sleep(timeout) => None,
        }
    }

    fn reset(&self) {
        self.queues.write().clear();
    }

    fn reset_address(&self, address: &str) {
        self.queues.write().remove(address);
    }

    fn len(&self, address: &str) -> usize {
        match self.queues.read().get(address) {
            Some(queue) => self.capacity - queue.tx.capacity(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use serde_json::json;

    fn envelope(n: i64) -> Envelope {
        Envelope::new("push", vec![json!(n)])
    }

    #[tokio::test]
    async fn queues_are_created_once_per_address() {
        let transport = InMemoryTransport::new("internal", 4);
        assert_eq!(transport.address_count(), 0);
        assert!(transport.try_receive("a").is_none());
        assert!(transport.try_receive("a").is_none());
        assert_eq!(transport.address_count(), 1);
    }

    #[tokio::test]
    async fn send_stamps_transport_name() {
        let transport = InMemoryTransport::new("ext", 4);
        transport
            .send("a", envelope(1), Duration::from_millis(10))
            .await
            .unwrap();
        let received = transport.try_receive("a").unwrap();
        assert_eq!(received.transport.as_deref(), Some("ext"));
    }

    #[tokio::test]
    async fn cancelled_receive_returns_none() {
        let transport = InMemoryTransport::new("internal", 4);
        let signal = Signal::new(true);
        let reader = signal.reader();
        let waiter = tokio::spawn(async move {
            transport
                .receive_one("a", &reader, Duration::from_secs(10))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation should end the wait")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn reset_address_discards_stale_messages() {
        let transport = InMemoryTransport::new("internal", 4);
        let timeout = Duration::from_millis(10);
        transport.send("a", envelope(1), timeout).await.unwrap();
        transport.send("b", envelope(2), timeout).await.unwrap();
        transport.reset_address("a");
        assert_eq!(transport.len("a"), 0);
        assert_eq!(transport.len("b"), 1);
        transport.reset();
        assert_eq!(transport.address_count(), 0);
    }
}
