use serde::{Deserialize, Serialize};

/// Engine-wide sync indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing in flight and the last attempt succeeded (or none was needed).
    #[default]
    Idle,
    /// A commit or fetch is in flight.
    Syncing,
    /// The last attempt failed; changes are queued and not yet synced.
    Error,
}

/// Where an item change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
    Local,
    Remote,
}
