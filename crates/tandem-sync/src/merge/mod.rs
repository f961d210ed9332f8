//! Merge of a remote document into the local replica.
//!
//! Policy, per key:
//! - only remote: adopt the remote value;
//! - only local: keep it, and push it unless a pending operation covers it;
//! - both: a pending operation for the key means local wins, otherwise
//!   remote wins.
//!
//! A key with a pending operation is never touched, whatever its local state.

mod plan;
mod report;

pub use plan::{plan_merge, MergePlan};
pub use report::{MergeReport, MergeTrigger};
