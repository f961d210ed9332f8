//! Remote gateway: the boundary to the shared remote document.
//!
//! [`InMemoryRemote`] is an in-process authority for tests and demos.
//! `HttpGateway` (feature `http`) speaks the versioned JSON protocol in
//! [`protocol`].

mod memory;
pub mod protocol;

#[cfg(feature = "http")]
mod http;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use tandem_core::errors::TandemResult;
use tandem_core::models::{Batch, RemoteDocument};

pub use memory::InMemoryRemote;

#[cfg(feature = "http")]
pub use http::{HttpGateway, HttpGatewayConfig};

/// Acknowledgement of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub batch_id: Uuid,
    /// Remote revision that includes the batch.
    pub revision: u64,
    pub committed_at: DateTime<Utc>,
}

/// One event from a change feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Document(RemoteDocument),
    /// The receiver fell behind and this many notifications were lost.
    Lagged(u64),
    Closed,
}

/// Subscription to remote change notifications. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: broadcast::Receiver<RemoteDocument>,
}

impl ChangeFeed {
    pub fn new(rx: broadcast::Receiver<RemoteDocument>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> FeedEvent {
        match self.rx.recv().await {
            Ok(document) => FeedEvent::Document(document),
            Err(broadcast::error::RecvError::Lagged(missed)) => FeedEvent::Lagged(missed),
            Err(broadcast::error::RecvError::Closed) => FeedEvent::Closed,
        }
    }
}

/// Transport to the remote authority for one collection.
///
/// Errors are `SyncError::TransientNetwork` when the attempt may succeed
/// later and `SyncError::CommitConflict` when the remote rejected the write.
pub trait IRemoteGateway: Send + Sync + 'static {
    /// Commit every operation of `batch` atomically, or none of them.
    fn commit_batch(
        &self,
        device_id: &str,
        batch: &Batch,
    ) -> impl Future<Output = TandemResult<CommitReceipt>> + Send;

    /// Read the current remote document.
    fn fetch_document(&self) -> impl Future<Output = TandemResult<RemoteDocument>> + Send;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> TandemResult<ChangeFeed>;
}
