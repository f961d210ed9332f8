//! Data model: items, pending operations, batches, and documents.

mod batch;
mod document;
mod item;
mod operation;
mod status;

pub use batch::Batch;
pub use document::{CollectionRecord, RemoteDocument};
pub use item::{Item, ItemKey, ItemValue};
pub use operation::{Mutation, OpType, OperationId, PendingOperation};
pub use status::{ItemOrigin, SyncStatus};
