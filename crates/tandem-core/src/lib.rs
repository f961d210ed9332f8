//! # tandem-core
//!
//! Foundation crate for the Tandem local-first sync engine.
//! Defines the item/operation/document model, the durable store trait,
//! errors, config, and constants. Every other crate in the workspace depends on this.

pub mod clock;
pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use clock::LocalClock;
pub use config::TandemConfig;
pub use errors::{StorageError, SyncError, TandemError, TandemResult};
pub use models::{
    Batch, CollectionRecord, Item, ItemKey, ItemOrigin, ItemValue, Mutation, OpType, OperationId,
    PendingOperation, RemoteDocument, SyncStatus,
};
pub use traits::IDurableStore;
