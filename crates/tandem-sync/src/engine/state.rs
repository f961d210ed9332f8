use std::collections::{HashMap, HashSet};

use tandem_core::models::{ItemKey, OperationId, SyncStatus};

use crate::events::{EngineEvent, EventBus};
use crate::listener::RemoteWatermark;
use crate::outbox::Outbox;
use crate::replay::{Backoff, ReplayTrigger};
use crate::replica::LocalReplica;

/// Mutable engine state, behind one lock. Never held across an await.
#[derive(Debug)]
pub(crate) struct EngineState {
    pub replica: LocalReplica,
    pub outbox: Outbox,
    /// Keys of the batch currently being committed.
    pub in_flight: HashMap<ItemKey, OperationId>,
    pub status: SyncStatus,
    pub online: bool,
    pub backoff: Backoff,
    pub watermark: RemoteWatermark,
    /// Replay requested by the host, picked up by the driver.
    pub requested: Option<ReplayTrigger>,
    pub last_attempt_failed: bool,
}

impl EngineState {
    pub fn new(replica: LocalReplica, outbox: Outbox) -> Self {
        let watermark = RemoteWatermark::at_revision(replica.revision());
        Self {
            replica,
            outbox,
            in_flight: HashMap::new(),
            status: SyncStatus::Idle,
            online: true,
            backoff: Backoff::default(),
            watermark,
            requested: None,
            last_attempt_failed: false,
        }
    }

    /// Every key with unacknowledged work: queued, stalled, or in flight.
    /// The durable queue holds exactly these operations.
    pub fn pending_keys(&self) -> HashSet<ItemKey> {
        self.outbox
            .keys()
            .chain(self.in_flight.keys())
            .cloned()
            .collect()
    }

    pub fn set_status(&mut self, status: SyncStatus, events: &EventBus) {
        if self.status != status {
            self.status = status;
            events.emit(EngineEvent::SyncStatusChanged(status));
        }
    }

    /// Status once nothing is in flight.
    pub fn settled_status(&self) -> SyncStatus {
        if self.last_attempt_failed || self.outbox.stalled_len() > 0 {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        }
    }

    /// Record a host replay request. A request that merges first is not
    /// downgraded by a weaker one.
    pub fn request(&mut self, trigger: ReplayTrigger) {
        self.requested = match self.requested {
            Some(existing) if existing.merge_first().is_some() => Some(existing),
            _ => Some(trigger),
        };
    }
}
