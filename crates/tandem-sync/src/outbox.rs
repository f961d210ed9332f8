//! Outbox: the in-memory pending set, one entry per key.
//!
//! The outbox is a cache of the durable offline queue. It never writes to
//! disk itself; the engine persists an operation before handing it to
//! [`Outbox::accept`].

use std::collections::VecDeque;

use tokio::time::Instant;

use tandem_core::models::{ItemKey, Mutation, OperationId, PendingOperation};

/// A pending operation plus its scheduling state.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub op: PendingOperation,
    /// When the key first entered the pending set. Drives the max-wait timer.
    pub queued_at: Instant,
    /// Excluded from timer-driven flushes until released.
    pub stalled: bool,
}

/// Result of returning a failed entry to the outbox.
#[derive(Debug)]
pub enum Restored {
    /// The entry is pending again.
    Requeued,
    /// A newer operation for the key arrived while this one was in flight.
    /// The returned operation is obsolete and its durable record can go.
    Superseded(PendingOperation),
}

/// Ordered pending set with per-key coalescing.
#[derive(Debug)]
pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
    max_batch_size: usize,
}

impl Outbox {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.op.target_key.as_str() == key)
    }

    pub fn get(&self, key: &str) -> Option<&PendingOperation> {
        self.position(key).map(|i| &self.entries[i].op)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// The operation that accepting `mutation` for `key` would leave pending:
    /// the existing entry coalesced with it, or a fresh operation.
    /// Nothing changes until [`accept`](Self::accept).
    pub fn stage(&self, key: &ItemKey, mutation: Mutation) -> PendingOperation {
        match self.get(key.as_str()) {
            Some(existing) => {
                let mut op = existing.clone();
                op.coalesce(mutation);
                op
            }
            None => PendingOperation::new(key.clone(), mutation),
        }
    }

    /// Insert a staged operation. An entry for the same key is replaced in
    /// place, keeping its queue position and `queued_at`, and is un-stalled.
    pub fn accept(&mut self, op: PendingOperation) {
        match self.position(op.target_key.as_str()) {
            Some(i) => {
                let entry = &mut self.entries[i];
                entry.op = op;
                entry.stalled = false;
            }
            None => self.entries.push_back(OutboxEntry {
                op,
                queued_at: Instant::now(),
                stalled: false,
            }),
        }
    }

    /// Remove and return up to `max_batch_size` non-stalled entries, oldest
    /// first.
    pub fn take_batch(&mut self) -> Vec<OutboxEntry> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if !entry.stalled && taken.len() < self.max_batch_size {
                taken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        taken
    }

    /// Put a failed entry back at the front, unless the key already has a
    /// newer entry.
    pub fn restore(&mut self, entry: OutboxEntry) -> Restored {
        if self.contains_key(entry.op.target_key.as_str()) {
            return Restored::Superseded(entry.op);
        }
        self.entries.push_front(entry);
        Restored::Requeued
    }

    /// Mark the entry with `id` as stalled. Returns false if it is not here.
    pub fn stall(&mut self, id: OperationId) -> bool {
        match self.entries.iter_mut().find(|entry| entry.op.id == id) {
            Some(entry) => {
                entry.stalled = true;
                true
            }
            None => false,
        }
    }

    /// Make every stalled entry eligible again. Returns how many were released.
    pub fn release_stalled(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.stalled) {
            entry.stalled = false;
            released += 1;
        }
        released
    }

    /// Entries eligible for the next flush.
    pub fn pending_len(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.stalled).count()
    }

    pub fn stalled_len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.stalled).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether enough work is pending to flush without waiting.
    pub fn is_full(&self) -> bool {
        self.pending_len() >= self.max_batch_size
    }

    /// `queued_at` of the oldest non-stalled entry.
    pub fn oldest_queued_at(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|entry| !entry.stalled)
            .map(|entry| entry.queued_at)
            .min()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.entries.iter().map(|entry| &entry.op.target_key)
    }

    /// Every queued operation, stalled ones included, in queue order.
    pub fn operations(&self) -> Vec<PendingOperation> {
        self.entries.iter().map(|entry| entry.op.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::models::ItemValue;

    fn key(k: &str) -> ItemKey {
        ItemKey::new(k).unwrap()
    }

    fn set(outbox: &mut Outbox, k: &str, value: bool) -> PendingOperation {
        let mutation = if outbox.contains_key(k) {
            Mutation::Update {
                value: ItemValue::Bool(value),
            }
        } else {
            Mutation::Add {
                value: ItemValue::Bool(value),
            }
        };
        let op = outbox.stage(&key(k), mutation);
        outbox.accept(op.clone());
        op
    }

    #[test]
    fn same_key_coalesces_into_one_entry() {
        let mut outbox = Outbox::new(10);
        let first = set(&mut outbox, "tent", true);
        let second = set(&mut outbox, "tent", false);

        assert_eq!(outbox.len(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(
            outbox.get("tent").unwrap().payload,
            Mutation::Add {
                value: ItemValue::Bool(false)
            }
        );
    }

    #[test]
    fn stage_does_not_mutate() {
        let outbox = Outbox::new(10);
        let _ = outbox.stage(&key("a"), Mutation::Delete);
        assert!(outbox.is_empty());
    }

    #[test]
    fn take_batch_is_bounded_and_ordered() {
        let mut outbox = Outbox::new(3);
        for k in ["a", "b", "c", "d", "e"] {
            set(&mut outbox, k, true);
        }
        assert!(outbox.is_full());

        let batch = outbox.take_batch();
        let keys: Vec<&str> = batch.iter().map(|e| e.op.target_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(outbox.len(), 2);
        assert!(!outbox.is_full());
    }

    #[test]
    fn restore_requeues_at_front_unless_superseded() {
        let mut outbox = Outbox::new(10);
        set(&mut outbox, "a", true);
        set(&mut outbox, "b", true);
        let mut batch = outbox.take_batch();
        let b = batch.pop().unwrap();
        let a = batch.pop().unwrap();

        // A newer edit for "a" arrives while the batch is in flight.
        set(&mut outbox, "a", false);

        assert!(matches!(outbox.restore(b), Restored::Requeued));
        match outbox.restore(a) {
            Restored::Superseded(op) => assert_eq!(op.target_key.as_str(), "a"),
            Restored::Requeued => panic!("stale entry must not be requeued"),
        }
        let keys: Vec<&str> = outbox.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn stalled_entries_are_skipped_until_released() {
        let mut outbox = Outbox::new(10);
        let op = set(&mut outbox, "a", true);
        set(&mut outbox, "b", true);
        assert!(outbox.stall(op.id));

        assert_eq!(outbox.pending_len(), 1);
        assert_eq!(outbox.stalled_len(), 1);
        let batch = outbox.take_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].op.target_key.as_str(), "b");

        assert_eq!(outbox.release_stalled(), 1);
        assert_eq!(outbox.pending_len(), 1);
    }

    #[test]
    fn new_mutation_unstalls_key() {
        let mut outbox = Outbox::new(10);
        let op = set(&mut outbox, "a", true);
        outbox.stall(op.id);
        set(&mut outbox, "a", false);
        assert_eq!(outbox.stalled_len(), 0);
        assert!(outbox.oldest_queued_at().is_some());
    }
}
