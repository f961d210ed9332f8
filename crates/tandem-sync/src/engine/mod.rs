//! SyncEngine: owns the replica, outbox, and offline queue of one collection
//! and drives them against a remote gateway.
//!
//! Mutations (`set`, `remove`) are synchronous and never touch the network.
//! Network work happens in [`SyncEngine::flush`], [`SyncEngine::reconcile`]
//! and [`SyncEngine::sync_now`], which the background driver
//! ([`SyncEngine::spawn_driver`]) calls on timers, change notifications, and
//! host triggers. Results are reported through [`EngineEvent`]s.

mod driver;
mod flush;
mod reconcile;
mod state;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use tandem_core::config::TandemConfig;
use tandem_core::constants::{DEVICE_ID_KEY, DEVICE_NAMESPACE, EVENT_CHANNEL_CAPACITY};
use tandem_core::errors::{SyncError, TandemResult};
use tandem_core::models::{
    ItemKey, ItemOrigin, ItemValue, Mutation, PendingOperation, SyncStatus,
};
use tandem_core::traits::IDurableStore;

use crate::events::{EngineEvent, EventBus};
use crate::gateway::IRemoteGateway;
use crate::offline_queue::OfflineQueue;
use crate::outbox::Outbox;
use crate::replay::ReplayTrigger;
use crate::replica::LocalReplica;

pub use driver::DriverHandle;
pub use flush::FlushReport;
pub use reconcile::SyncReport;

use state::EngineState;

struct Core<S: IDurableStore + 'static, G: IRemoteGateway> {
    config: TandemConfig,
    device_id: String,
    store: Arc<S>,
    gateway: Arc<G>,
    queue: OfflineQueue<S>,
    state: Mutex<EngineState>,
    /// One flush cycle at a time, so one batch in flight at a time.
    flush_lock: tokio::sync::Mutex<()>,
    wake: Notify,
    events: EventBus,
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> Core<S, G> {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sync engine for one collection. Cheap to clone; clones share state.
pub struct SyncEngine<S: IDurableStore + 'static, G: IRemoteGateway> {
    core: Arc<Core<S, G>>,
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> Clone for SyncEngine<S, G> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> SyncEngine<S, G> {
    /// Load the replica and rehydrate the outbox from the durable queue.
    /// No mutation is accepted before this returns.
    pub fn open(config: TandemConfig, store: Arc<S>, gateway: Arc<G>) -> TandemResult<Self> {
        config.validate()?;
        let device_id = resolve_device_id(&config, store.as_ref())?;

        let (replica, corrupt_items) = LocalReplica::load(store.as_ref(), &config.collection_id)?;
        let queue = OfflineQueue::new(Arc::clone(&store), &config.collection_id);
        let rehydrated = queue.rehydrate()?;

        let mut outbox = Outbox::new(config.outbox.max_batch_size);
        for op in rehydrated.operations {
            outbox.accept(op);
        }

        info!(
            collection = %config.collection_id,
            device = %device_id,
            items = replica.len(),
            pending = outbox.len(),
            dropped = corrupt_items.len() + rehydrated.dropped.len(),
            "sync engine opened"
        );

        Ok(Self {
            core: Arc::new(Core {
                device_id,
                store,
                gateway,
                queue,
                state: Mutex::new(EngineState::new(replica, outbox)),
                flush_lock: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
                events: EventBus::new(EVENT_CHANNEL_CAPACITY),
                config,
            }),
        })
    }

    pub fn config(&self) -> &TandemConfig {
        &self.core.config
    }

    pub fn collection_id(&self) -> &str {
        &self.core.config.collection_id
    }

    pub fn device_id(&self) -> &str {
        &self.core.device_id
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.core.gateway
    }

    pub fn get(&self, key: &str) -> Option<ItemValue> {
        self.core.state().replica.get(key).cloned()
    }

    pub fn get_all(&self) -> BTreeMap<ItemKey, ItemValue> {
        self.core.state().replica.get_all()
    }

    /// Write a value. Visible to `get` immediately, persisted with its
    /// pending operation before returning. Fails only on a malformed
    /// key/value or a local disk error; network outcomes arrive as events.
    pub fn set(&self, key: &str, value: impl Into<ItemValue>) -> TandemResult<()> {
        let key = ItemKey::new(key)?;
        let value = value.into();
        value.validate(key.as_str())?;
        self.write(key, Some(value))?;
        Ok(())
    }

    /// Remove a key. Returns false if the replica did not have it.
    pub fn remove(&self, key: &str) -> TandemResult<bool> {
        let key = ItemKey::new(key)?;
        Ok(self.write(key, None)?.is_some())
    }

    /// Apply a local mutation: durable queue first, then the replica, then
    /// the in-memory outbox. A replica failure rolls the queue back.
    fn write(&self, key: ItemKey, value: Option<ItemValue>) -> TandemResult<Option<ItemValue>> {
        let core = &self.core;
        let (previous, full) = {
            let mut state = core.state();
            let mutation = match &value {
                Some(value) if state.replica.contains(key.as_str()) => Mutation::Update {
                    value: value.clone(),
                },
                Some(value) => Mutation::Add {
                    value: value.clone(),
                },
                None if state.replica.contains(key.as_str()) => Mutation::Delete,
                None => return Ok(None),
            };

            let superseded = state.outbox.get(key.as_str()).cloned();
            let op = state.outbox.stage(&key, mutation);
            core.queue.persist(&op)?;

            let previous = match state.replica.write(core.store.as_ref(), &key, value.clone()) {
                Ok(previous) => previous,
                Err(e) => {
                    let rollback = match &superseded {
                        Some(prev) => core.queue.persist(prev),
                        None => core.queue.remove(op.id),
                    };
                    if let Err(rollback_err) = rollback {
                        warn!(key = %key, error = %rollback_err, "failed to roll back pending operation");
                    }
                    return Err(e);
                }
            };

            debug!(key = %key, op = ?op.op_type(), op_id = %op.id, "local mutation queued");
            state.outbox.accept(op);
            core.events.emit(EngineEvent::ItemChanged {
                key,
                value,
                origin: ItemOrigin::Local,
            });
            (previous, state.outbox.is_full())
        };

        // The driver re-evaluates its flush deadline; a full outbox flushes now.
        core.wake.notify_one();
        if full {
            debug!("outbox reached max batch size");
        }
        Ok(previous)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.core.events.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.core.state().status
    }

    /// Queued operations, stalled ones included, in queue order.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.core.state().outbox.operations()
    }

    /// Queued plus in-flight operations.
    pub fn pending_count(&self) -> usize {
        let state = self.core.state();
        state.outbox.len() + state.in_flight.len()
    }

    pub fn is_online(&self) -> bool {
        self.core.state().online
    }

    /// Revision of the last remote document merged into the replica.
    pub fn remote_revision(&self) -> u64 {
        self.core.state().replica.revision()
    }

    /// Host-reported connectivity. Going online releases stalled operations
    /// and requests a reconnect merge plus replay.
    pub fn set_connectivity(&self, online: bool) {
        let restored = {
            let mut state = self.core.state();
            let was_online = state.online;
            state.online = online;
            if online && !was_online {
                let released = state.outbox.release_stalled();
                state.backoff.clear();
                state.request(ReplayTrigger::ConnectivityRestored);
                info!(released, pending = state.outbox.len(), "connectivity restored");
                true
            } else {
                if !online && was_online {
                    info!(pending = state.outbox.len(), "connectivity lost, queueing locally");
                }
                false
            }
        };
        if restored {
            self.core.wake.notify_one();
        }
    }

    /// Ask the driver for an immediate reconnect merge and replay, stalled
    /// operations included.
    pub fn force_sync(&self) {
        {
            let mut state = self.core.state();
            state.outbox.release_stalled();
            state.backoff.clear();
            state.request(ReplayTrigger::ForceSync);
        }
        self.core.wake.notify_one();
    }

    /// Run a remote call under the commit timeout. A timeout is a transient
    /// network failure.
    async fn with_timeout<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = TandemResult<T>>,
    ) -> TandemResult<T> {
        let limit = self.core.config.outbox.commit_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::network(format!("{what} timed out after {limit:?}")).into()),
        }
    }
}

/// Configured id, else the persisted one, else a new one that is persisted.
fn resolve_device_id<S: IDurableStore + ?Sized>(
    config: &TandemConfig,
    store: &S,
) -> TandemResult<String> {
    if !config.device_id.is_empty() {
        return Ok(config.device_id.clone());
    }
    if let Some(bytes) = store.read(DEVICE_NAMESPACE, DEVICE_ID_KEY)? {
        match String::from_utf8(bytes) {
            Ok(id) if !id.trim().is_empty() => return Ok(id),
            _ => warn!("stored device id is unreadable, generating a new one"),
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    store.write(DEVICE_NAMESPACE, DEVICE_ID_KEY, id.as_bytes())?;
    info!(device = %id, "generated device id");
    Ok(id)
}
