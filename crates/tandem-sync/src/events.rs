//! Engine events, delivered on a tokio broadcast channel.

use std::time::Duration;

use tokio::sync::broadcast;

use tandem_core::models::{ItemKey, ItemOrigin, ItemValue, OperationId, SyncStatus};

use crate::merge::MergeReport;

/// Everything a UI or host can observe about the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A replica value changed. `value` is `None` when the key was removed.
    ItemChanged {
        key: ItemKey,
        value: Option<ItemValue>,
        origin: ItemOrigin,
    },
    SyncStatusChanged(SyncStatus),
    /// The remote acknowledged the operation for `key`.
    ItemCommitted { key: ItemKey, op_id: OperationId },
    /// Commits failed; the engine retries after `after`, and the host may
    /// trigger a replay sooner.
    RetryRequested { after: Duration },
    /// The operation hit the retry cap. It stays queued until connectivity
    /// returns or a sync is forced.
    OperationStalled {
        key: ItemKey,
        op_id: OperationId,
        attempts: u32,
    },
    Merged(MergeReport),
}

/// Sending half of the event channel. Sending with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}
