//! # tandem-sync
//!
//! Local-first sync engine. Mutations land in a [`LocalReplica`](replica::LocalReplica)
//! and a durable [`OfflineQueue`](offline_queue::OfflineQueue) synchronously, then an
//! [`Outbox`](outbox::Outbox) batches them toward an [`IRemoteGateway`]. Remote
//! changes come back through the change feed and are merged with
//! [`plan_merge`](merge::plan_merge): a key with unacknowledged local work keeps
//! its local value, every other key takes the remote one.
//!
//! [`SyncEngine`] ties the pieces together; [`SyncEngine::spawn_driver`] runs
//! the timers, the change feed and replay on a tokio task.

pub mod engine;
pub mod events;
pub mod gateway;
pub mod listener;
pub mod merge;
pub mod observability;
pub mod offline_queue;
pub mod outbox;
pub mod replay;
pub mod replica;

pub use engine::{DriverHandle, FlushReport, SyncEngine, SyncReport};
pub use events::EngineEvent;
pub use gateway::{ChangeFeed, CommitReceipt, FeedEvent, IRemoteGateway, InMemoryRemote};
pub use merge::{plan_merge, MergePlan, MergeReport, MergeTrigger};
pub use replay::ReplayTrigger;
