use serde::{Deserialize, Serialize};

use super::plan::MergePlan;

/// Why a merge ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeTrigger {
    /// First connection after the engine started.
    ColdStart,
    /// Connectivity came back, or a sync was forced.
    Reconnect,
    /// A change notification, or a full fetch after missed notifications.
    RemoteChange,
    /// The remote rejected a commit; re-fetch before retrying.
    Conflict,
}

/// Counts of what a merge did, emitted as `EngineEvent::Merged`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub trigger: MergeTrigger,
    /// Revision of the remote document that was merged.
    pub revision: u64,
    pub adopted: usize,
    pub retained: usize,
    pub pushed: usize,
    pub unchanged: usize,
}

impl MergeReport {
    pub fn from_plan(trigger: MergeTrigger, revision: u64, plan: &MergePlan) -> Self {
        Self {
            trigger,
            revision,
            adopted: plan.adopt.len(),
            retained: plan.retained.len(),
            pushed: plan.push.len(),
            unchanged: plan.unchanged,
        }
    }
}
