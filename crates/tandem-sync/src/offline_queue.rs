//! OfflineQueue: durable record of every unacknowledged operation.
//!
//! One record per operation in namespace `pending_ops/<collection>`, keyed by
//! operation id. The queue is the source of truth for pending work; the
//! in-memory outbox is rebuilt from it with [`OfflineQueue::rehydrate`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use tandem_core::constants::pending_ops_namespace;
use tandem_core::errors::{SyncError, TandemResult};
use tandem_core::models::{OperationId, PendingOperation};
use tandem_core::traits::IDurableStore;

/// Operations recovered at startup, plus what had to be dropped.
#[derive(Debug, Default)]
pub struct Rehydrated {
    /// One operation per key, in store order.
    pub operations: Vec<PendingOperation>,
    /// Records that failed to parse or validate.
    pub dropped: Vec<SyncError>,
    /// Records removed because a later record for the same key replaced them.
    pub superseded: usize,
}

/// Durable pending-operation queue for one collection.
pub struct OfflineQueue<S: IDurableStore + ?Sized> {
    store: Arc<S>,
    namespace: String,
}

impl<S: IDurableStore + ?Sized> OfflineQueue<S> {
    pub fn new(store: Arc<S>, collection_id: &str) -> Self {
        Self {
            store,
            namespace: pending_ops_namespace(collection_id),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Write (or overwrite) the record of an operation.
    #[instrument(skip(self, op), fields(op_id = %op.id, key = %op.target_key))]
    pub fn persist(&self, op: &PendingOperation) -> TandemResult<()> {
        let bytes = serde_json::to_vec(op)?;
        self.store.write(&self.namespace, &op.id.to_string(), &bytes)?;
        debug!(attempt = op.attempt, "persisted pending operation");
        Ok(())
    }

    /// Delete the record of an acknowledged or superseded operation.
    #[instrument(skip(self))]
    pub fn remove(&self, id: OperationId) -> TandemResult<()> {
        self.store.remove(&self.namespace, &id.to_string())
    }

    /// Delete the records of a committed batch.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn remove_many(&self, ids: &[OperationId]) -> TandemResult<()> {
        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        self.store.remove_many(&self.namespace, &keys)
    }

    pub fn len(&self) -> TandemResult<usize> {
        self.store.count(&self.namespace)
    }

    pub fn is_empty(&self) -> TandemResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read every record back. Corrupt records are deleted and reported.
    /// When two records target the same key, the later one survives with
    /// the earlier payload folded in, and the earlier record is deleted.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub fn rehydrate(&self) -> TandemResult<Rehydrated> {
        let mut result = Rehydrated::default();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut slots: Vec<Option<PendingOperation>> = Vec::new();

        for (record_key, bytes) in self.store.scan(&self.namespace)? {
            let op = match self.decode(&record_key, &bytes) {
                Ok(op) => op,
                Err(err) => {
                    warn!(record_key = %record_key, error = %err, "dropping corrupt pending operation");
                    self.store.remove(&self.namespace, &record_key)?;
                    result.dropped.push(err);
                    continue;
                }
            };

            match by_key.get(op.target_key.as_str()).copied() {
                Some(index) => {
                    let Some(earlier) = slots[index].take() else {
                        continue;
                    };
                    let mut later = op;
                    later.payload = earlier.payload.coalesce(later.payload);
                    later.enqueued_at = earlier.enqueued_at.min(later.enqueued_at);
                    self.persist(&later)?;
                    self.remove(earlier.id)?;
                    result.superseded += 1;
                    debug!(key = %later.target_key, "coalesced duplicate pending operation");
                    by_key.insert(later.target_key.as_str().to_string(), slots.len());
                    slots.push(Some(later));
                }
                None => {
                    by_key.insert(op.target_key.as_str().to_string(), slots.len());
                    slots.push(Some(op));
                }
            }
        }

        result.operations = slots.into_iter().flatten().collect();
        debug!(
            recovered = result.operations.len(),
            dropped = result.dropped.len(),
            superseded = result.superseded,
            "rehydrated offline queue"
        );
        Ok(result)
    }

    fn decode(&self, record_key: &str, bytes: &[u8]) -> Result<PendingOperation, SyncError> {
        let corrupt = |reason: String| SyncError::CorruptLocalRecord {
            namespace: self.namespace.clone(),
            record_key: record_key.to_string(),
            reason,
        };
        let op: PendingOperation =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        op.validate().map_err(|e| corrupt(e.to_string()))?;
        if op.id.to_string() != record_key {
            return Err(corrupt(format!("record holds operation {}", op.id)));
        }
        Ok(op)
    }
}
