//! The local replica: the instantly mutable copy of one collection.
//!
//! Every write goes to the durable store before the in-memory map is
//! considered updated. A failed write leaves the replica as it was.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use tandem_core::constants::COLLECTIONS_NAMESPACE;
use tandem_core::errors::{SyncError, TandemResult};
use tandem_core::models::{CollectionRecord, Item, ItemKey, ItemValue, RemoteDocument};
use tandem_core::traits::IDurableStore;
use tandem_core::LocalClock;

/// In-memory view of a collection, mirrored to namespace `collections`.
#[derive(Debug)]
pub struct LocalReplica {
    collection_id: String,
    items: BTreeMap<ItemKey, Item>,
    clock: LocalClock,
    last_updated: Option<DateTime<Utc>>,
    last_writer_id: Option<String>,
    revision: u64,
}

impl LocalReplica {
    /// An empty replica that has never merged a remote document.
    pub fn empty(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            items: BTreeMap::new(),
            clock: LocalClock::new(),
            last_updated: None,
            last_writer_id: None,
            revision: 0,
        }
    }

    /// Load the replica from the store. Records that fail validation are
    /// dropped and returned as `CorruptLocalRecord` errors; an unreadable
    /// collection record yields an empty replica.
    pub fn load<S: IDurableStore + ?Sized>(
        store: &S,
        collection_id: &str,
    ) -> TandemResult<(Self, Vec<SyncError>)> {
        let mut replica = Self::empty(collection_id);
        let Some(bytes) = store.read(COLLECTIONS_NAMESPACE, collection_id)? else {
            return Ok((replica, Vec::new()));
        };

        let record: CollectionRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                let err = SyncError::CorruptLocalRecord {
                    namespace: COLLECTIONS_NAMESPACE.to_string(),
                    record_key: collection_id.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!(collection = collection_id, error = %err, "discarding unreadable replica");
                return Ok((replica, vec![err]));
            }
        };

        let (record, dropped) = record.sanitize(COLLECTIONS_NAMESPACE);
        for err in &dropped {
            tracing::warn!(collection = collection_id, error = %err, "dropped corrupt item");
        }
        for item in record.items {
            replica.clock.observe(item.updated_at_local);
            replica.items.insert(item.key.clone(), item);
        }
        replica.last_updated = record.last_updated;
        replica.last_writer_id = record.last_writer_id;
        replica.revision = record.revision;
        Ok((replica, dropped))
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn get(&self, key: &str) -> Option<&ItemValue> {
        self.items.get(key).map(|item| &item.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Snapshot of every key and value.
    pub fn get_all(&self) -> BTreeMap<ItemKey, ItemValue> {
        self.items
            .iter()
            .map(|(key, item)| (key.clone(), item.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Revision of the last remote document merged in.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn last_writer_id(&self) -> Option<&str> {
        self.last_writer_id.as_deref()
    }

    pub fn to_record(&self) -> CollectionRecord {
        CollectionRecord {
            items: self.items.values().cloned().collect(),
            last_updated: self.last_updated,
            last_writer_id: self.last_writer_id.clone(),
            revision: self.revision,
        }
    }

    fn persist<S: IDurableStore + ?Sized>(&self, store: &S) -> TandemResult<()> {
        let bytes = serde_json::to_vec(&self.to_record())?;
        store.write(COLLECTIONS_NAMESPACE, &self.collection_id, &bytes)
    }

    /// Write one key (`None` removes it) and persist. Returns the previous
    /// value. On a store error the in-memory state is restored.
    pub fn write<S: IDurableStore + ?Sized>(
        &mut self,
        store: &S,
        key: &ItemKey,
        value: Option<ItemValue>,
    ) -> TandemResult<Option<ItemValue>> {
        let previous = match value {
            Some(value) => {
                let item = Item {
                    key: key.clone(),
                    value,
                    updated_at_local: self.clock.tick(),
                };
                self.items.insert(key.clone(), item)
            }
            None => self.items.remove(key),
        };

        if let Err(e) = self.persist(store) {
            match previous {
                Some(item) => self.items.insert(key.clone(), item),
                None => self.items.remove(key),
            };
            return Err(e);
        }
        Ok(previous.map(|item| item.value))
    }

    /// Adopt remote values and the document's metadata in one persisted
    /// write. On a store error nothing changes.
    pub fn adopt<S: IDurableStore + ?Sized>(
        &mut self,
        store: &S,
        adopted: &[(ItemKey, ItemValue)],
        document: &RemoteDocument,
    ) -> TandemResult<()> {
        let snapshot = (
            self.items.clone(),
            self.last_updated,
            self.last_writer_id.clone(),
            self.revision,
        );

        for (key, value) in adopted {
            let item = Item {
                key: key.clone(),
                value: value.clone(),
                updated_at_local: self.clock.tick(),
            };
            self.items.insert(key.clone(), item);
        }
        self.last_updated = Some(document.last_updated);
        self.last_writer_id = document.last_writer_id.clone();
        self.revision = self.revision.max(document.revision);

        if let Err(e) = self.persist(store) {
            (self.items, self.last_updated, self.last_writer_id, self.revision) = snapshot;
            return Err(e);
        }
        Ok(())
    }
}
