use std::sync::Arc;

use parking_lot::Mutex;

use crate::signal::{Signal, SignalReader};
use crate::types::ActorId;

struct Record {
    id: Option<ActorId>,
    cancel: Signal<bool>,
}

/// The child table of one supervisor.
///
/// Each running child owns a slot holding its identity and private
/// cancellation signal. Stopped children have their identity cleared instead
/// of being removed, so indices held by running loops stay valid.
#[derive(Clone, Default)]
pub struct SupervisionRecords {
    inner: Arc<Mutex<Vec<Record>>>,
}

impl SupervisionRecords {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a slot for `id` and returns its index and cancellation reader.
    pub fn register(&self, id: ActorId) -> (usize, SignalReader<bool>) {
        let cancel = Signal::new(true);
        let reader = cancel.reader();
        let mut records = self.inner.lock();
        records.push(Record {
            id: Some(id),
            cancel,
        });
        (records.len() - 1, reader)
    }

    /// Clears the identity of slot `index`.
    pub fn retire(&self, index: usize) {
        if let Some(record) = self.inner.lock().get_mut(index) {
            record.id = None;
        }
    }

    /// Drops every slot. Used between ONE_FOR_ALL generations.
    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    /// Cancels every live slot registered under `id`.
    ///
    /// Returns false when no such child is registered.
    pub fn stop_child(&self, id: &ActorId) -> bool {
        let mut stopped = false;
        for record in self.inner.lock().iter_mut() {
            if record.id.as_ref() == Some(id) {
                record.cancel.cancel();
                record.id = None;
                stopped = true;
            }
        }
        stopped
    }

    /// Identities of the registered children, in registration order.
    pub fn ids(&self) -> Vec<ActorId> {
        self.inner
            .lock()
            .iter()
            .filter_map(|record| record.id.clone())
            .collect()
    }

    /// Number of registered children.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|record| record.id.is_some())
            .count()
    }

    /// Returns true when no child is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SupervisionRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisionRecords")
            .field("ids", &self.ids())
            .finish()
    }
}
