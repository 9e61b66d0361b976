use std::time::Duration;

use async_trait::async_trait;
use futures::future;

use crate::error::SendError;
use crate::log::warn;
use crate::signal::SignalReader;
use crate::transport::{SharedTransport, Transport};
use crate::types::Envelope;

/// Read-only fan-in over several transports.
///
/// `receive_one` prefers envelopes that are already buffered in any member;
/// otherwise it races every member's wait (plus cancellation and timeout)
/// and returns whichever resolves first. Fairness between members is
/// best-effort.
pub struct CombinedReader {
    name: String,
    members: Vec<SharedTransport>,
}

impl CombinedReader {
    /// Combines `members` into one readable source.
    pub fn new(members: Vec<SharedTransport>) -> Self {
        let name = members
            .iter()
            .map(|member| member.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { name, members }
    }

    /// The transports read by this combinator.
    pub fn members(&self) -> &[SharedTransport] {
        &self.members
    }

    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&SharedTransport> {
        self.members.iter().find(|member| member.name() == name)
    }
}

#[async_trait]
impl Transport for CombinedReader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        _address: &str,
        _envelope: Envelope,
        _timeout: Duration,
    ) -> Result<(), SendError> {
        Err(SendError::Unsupported(self.name.clone()))
    }

    fn try_receive(&self, address: &str) -> Option<Envelope> {
        self.members
            .iter()
            .find_map(|member| member.try_receive(address))
    }

    async fn receive_one(
        &self,
        address: &str,
        cancel: &SignalReader<bool>,
        timeout: Duration,
    ) -> Option<Envelope> {
        if let Some(envelope) = self.try_receive(address) {
            return Some(envelope);
        }
        if self.members.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {}
            }
            return None;
        }
        let waits = self
            .members
            .iter()
            .map(|member| member.receive_one(address, cancel, timeout));
        let (envelope, _, _) = future::select_all(waits).await;
        envelope
    }

    fn reset(&self) {
        warn!(reader = %self.name, "combined readers are not reset; reset the members");
    }

    fn reset_address(&self, address: &str) {
        warn!(reader = %self.name, address, "combined readers are not reset; reset the members");
    }

    fn len(&self, address: &str) -> usize {
        self.members.iter().map(|member| member.len(address)).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::signal::Signal;
    use crate::transport::InMemoryTransport;
    use serde_json::json;

    fn pair() -> (Arc<InMemoryTransport>, Arc<InMemoryTransport>, CombinedReader) {
        let internal = InMemoryTransport::shared("internal", 10);
        let external = InMemoryTransport::shared("external", 10);
        let reader = CombinedReader::new(vec![
            internal.clone() as SharedTransport,
            external.clone() as SharedTransport,
        ]);
        (internal, external, reader)
    }

    #[tokio::test]
    async fn returns_buffered_envelope_immediately() {
        let (_internal, external, reader) = pair();
        external
            .send("actor", Envelope::new("test", vec![]), Duration::from_millis(10))
            .await
            .unwrap();
        let live = Signal::new(true);
        let envelope = tokio::time::timeout(
            Duration::from_millis(50),
            reader.receive_one("actor", &live.reader(), Duration::from_secs(10)),
        )
        .await
        .expect("buffered data should not wait")
        .unwrap();
        assert_eq!(envelope.action, "test");
        assert_eq!(envelope.transport.as_deref(), Some("external"));
    }

    #[tokio::test]
    async fn waits_for_any_member() {
        let (internal, _external, reader) = pair();
        let reader = Arc::new(reader);
        let live = Signal::new(true);
        let waiter = {
            let reader = reader.clone();
            let cancel = live.reader();
            tokio::spawn(async move {
                reader
                    .receive_one("actor", &cancel, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        internal
            .send(
                "actor",
                Envelope::new("late", vec![json!(1)]),
                Duration::from_millis(10),
            )
            .await
            .unwrap();
        let envelope = waiter.await.unwrap().unwrap();
        assert_eq!(envelope.action, "late");
        assert_eq!(reader.len("actor"), 0);
    }

    #[tokio::test]
    async fn timeout_yields_none() {
        let (_internal, _external, reader) = pair();
        let live = Signal::new(true);
        let result = reader
            .receive_one("actor", &live.reader(), Duration::from_millis(30))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cancellation_skips_reading() {
        let (_internal, external, reader) = pair();
        let live = Signal::new(true);
        live.cancel();
        let result = reader
            .receive_one("actor", &live.reader(), Duration::from_secs(10))
            .await;
        assert!(result.is_none());
        external
            .send("actor", Envelope::new("after", vec![]), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(external.len("actor"), 1, "nothing consumed after cancel");
    }

    #[tokio::test]
    async fn refuses_to_send() {
        let (_internal, _external, reader) = pair();
        let result = reader
            .send("actor", Envelope::new("x", vec![]), Duration::from_millis(10))
            .await;
        assert_eq!(
            result,
            Err(SendError::Unsupported("internal+external".to_string()))
        );
    }
}
