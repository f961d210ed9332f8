use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_KEY_LEN, MAX_TEXT_VALUE_LEN};
use crate::errors::{TandemError, TandemResult};

/// Stable identity of an item. The same key addresses the item locally and
/// in the remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Validate and wrap a key.
    pub fn new(key: impl Into<String>) -> TandemResult<Self> {
        let key = ItemKey(key.into());
        key.validate()?;
        Ok(key)
    }

    /// Shape check, also applied to keys read back from disk.
    pub fn validate(&self) -> TandemResult<()> {
        let reason = if self.0.is_empty() {
            Some("key is empty".to_string())
        } else if self.0.len() > MAX_KEY_LEN {
            Some(format!("key exceeds {MAX_KEY_LEN} bytes"))
        } else if self.0.chars().any(char::is_control) {
            Some("key contains control characters".to_string())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TandemError::InvalidMutation {
                key: self.0.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ItemKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The value of an item: a boolean flag or a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ItemValue {
    /// Shape check: floats must be finite, text bounded.
    pub fn validate(&self, key: &str) -> TandemResult<()> {
        match self {
            ItemValue::Float(f) if !f.is_finite() => Err(TandemError::InvalidMutation {
                key: key.to_string(),
                reason: format!("non-finite number {f}"),
            }),
            ItemValue::Text(s) if s.len() > MAX_TEXT_VALUE_LEN => {
                Err(TandemError::InvalidMutation {
                    key: key.to_string(),
                    reason: format!("text value exceeds {MAX_TEXT_VALUE_LEN} bytes"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl From<bool> for ItemValue {
    fn from(value: bool) -> Self {
        ItemValue::Bool(value)
    }
}

impl From<i64> for ItemValue {
    fn from(value: i64) -> Self {
        ItemValue::Int(value)
    }
}

impl From<i32> for ItemValue {
    fn from(value: i32) -> Self {
        ItemValue::Int(value.into())
    }
}

impl From<f64> for ItemValue {
    fn from(value: f64) -> Self {
        ItemValue::Float(value)
    }
}

impl From<&str> for ItemValue {
    fn from(value: &str) -> Self {
        ItemValue::Text(value.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(value: String) -> Self {
        ItemValue::Text(value)
    }
}

/// A tracked unit of state in the local replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub key: ItemKey,
    pub value: ItemValue,
    /// Monotonic local timestamp of the last write, local or adopted.
    pub updated_at_local: u64,
}

impl Item {
    /// Validate key and value, as done for records loaded from disk.
    pub fn validate(&self) -> TandemResult<()> {
        self.key.validate()?;
        self.value.validate(self.key.as_str())
    }
}
