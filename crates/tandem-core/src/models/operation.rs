use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::item::{ItemKey, ItemValue};
use crate::errors::TandemResult;

/// Locally generated, unique id of a pending operation. Also the record key
/// of the operation in the durable queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    pub fn new() -> Self {
        OperationId(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(OperationId)
    }
}

/// Kind of mutation carried by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Add,
    Update,
    Delete,
}

/// Operation type and payload as one closed union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Add { value: ItemValue },
    Update { value: ItemValue },
    Delete,
}

impl Mutation {
    pub fn op_type(&self) -> OpType {
        match self {
            Mutation::Add { .. } => OpType::Add,
            Mutation::Update { .. } => OpType::Update,
            Mutation::Delete => OpType::Delete,
        }
    }

    /// The written value, `None` for a delete.
    pub fn value(&self) -> Option<&ItemValue> {
        match self {
            Mutation::Add { value } | Mutation::Update { value } => Some(value),
            Mutation::Delete => None,
        }
    }

    /// Fold a newer mutation for the same key into this one. The newer value
    /// always wins; an unconfirmed add stays an add.
    pub fn coalesce(&self, newer: Mutation) -> Mutation {
        match (self, newer) {
            (Mutation::Add { .. }, Mutation::Update { value }) => Mutation::Add { value },
            (_, newer) => newer,
        }
    }
}

/// A mutation that has not been confirmed committed by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: OperationId,
    pub target_key: ItemKey,
    pub payload: Mutation,
    pub enqueued_at: DateTime<Utc>,
    /// Failed commit attempts so far.
    pub attempt: u32,
}

impl PendingOperation {
    pub fn new(target_key: ItemKey, payload: Mutation) -> Self {
        Self {
            id: OperationId::new(),
            target_key,
            payload,
            enqueued_at: Utc::now(),
            attempt: 0,
        }
    }

    pub fn op_type(&self) -> OpType {
        self.payload.op_type()
    }

    /// Shape check applied at the replica boundary and on rehydration.
    pub fn validate(&self) -> TandemResult<()> {
        self.target_key.validate()?;
        match self.payload.value() {
            Some(value) => value.validate(self.target_key.as_str()),
            None => Ok(()),
        }
    }

    /// Replace the payload with a newer mutation for the same key.
    /// Id, enqueue time and attempt count are kept.
    pub fn coalesce(&mut self, newer: Mutation) {
        self.payload = self.payload.coalesce(newer);
    }
}
