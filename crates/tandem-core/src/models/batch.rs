use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{ItemKey, ItemValue};
use super::operation::{Mutation, PendingOperation};

/// An atomic group of operations submitted in one commit. Lives for a single
/// commit attempt only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Correlation id for logs and the remote commit receipt.
    pub id: Uuid,
    pub operations: Vec<PendingOperation>,
}

impl Batch {
    pub fn new(operations: Vec<PendingOperation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operations,
        }
    }

    /// A batch of one, used for individual retries.
    pub fn single(operation: PendingOperation) -> Self {
        Self::new(vec![operation])
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.operations.iter().map(|op| &op.target_key)
    }

    /// Apply every operation in order. Adds and updates are upserts and
    /// deletes of absent keys are no-ops, so applying a batch twice leaves
    /// the same state as applying it once.
    pub fn apply_to(&self, items: &mut BTreeMap<ItemKey, ItemValue>) {
        for op in &self.operations {
            match &op.payload {
                Mutation::Add { value } | Mutation::Update { value } => {
                    items.insert(op.target_key.clone(), value.clone());
                }
                Mutation::Delete => {
                    items.remove(&op.target_key);
                }
            }
        }
    }
}
