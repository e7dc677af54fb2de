use super::schema::{FileRecord, StoreSlot};
use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 64;

/// Emitted by the federation for downstream subscribers (notifications,
/// poster lookup). Publishing never blocks or fails an index operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IndexEvent {
    FileIndexed { record: FileRecord, store: StoreSlot },
    StorageFull { name: String, caption: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: IndexEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
