use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{Item, ItemKey, ItemValue};
use crate::errors::SyncError;

/// The authoritative projection of a collection held by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub collection_id: String,
    pub items: BTreeMap<ItemKey, ItemValue>,
    /// Server-assigned time of the last commit.
    pub last_updated: DateTime<Utc>,
    /// Device that committed last, if any commit happened.
    pub last_writer_id: Option<String>,
    /// Server commit counter, strictly increasing per commit.
    #[serde(default)]
    pub revision: u64,
}

impl RemoteDocument {
    /// A document no device has written to yet.
    pub fn empty(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            items: BTreeMap::new(),
            last_updated: DateTime::<Utc>::default(),
            last_writer_id: None,
            revision: 0,
        }
    }

    /// Hash of the item map. Items are a `BTreeMap`, so the serialized form is
    /// canonical and equal maps hash equally.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.items).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Durable form of the local replica: one record per collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub items: Vec<Item>,
    /// `last_updated` of the last remote document merged in.
    pub last_updated: Option<DateTime<Utc>>,
    pub last_writer_id: Option<String>,
    /// Revision of the last remote document merged in.
    #[serde(default)]
    pub revision: u64,
}

impl CollectionRecord {
    /// Drop items that fail shape validation, returning one error per drop.
    /// Later duplicates of a key replace earlier ones.
    pub fn sanitize(self, namespace: &str) -> (Self, Vec<SyncError>) {
        let mut dropped = Vec::new();
        let mut by_key: BTreeMap<ItemKey, Item> = BTreeMap::new();
        for item in self.items {
            match item.validate() {
                Ok(()) => {
                    by_key.insert(item.key.clone(), item);
                }
                Err(e) => dropped.push(SyncError::CorruptLocalRecord {
                    namespace: namespace.to_string(),
                    record_key: item.key.as_str().to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        let record = Self {
            items: by_key.into_values().collect(),
            ..self
        };
        (record, dropped)
    }
}
