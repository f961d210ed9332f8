//! In-process remote authority with fault injection.
//!
//! Clones share one document, so several engines (devices) can sync
//! against the same `InMemoryRemote`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use tandem_core::constants::EVENT_CHANNEL_CAPACITY;
use tandem_core::errors::{SyncError, TandemResult};
use tandem_core::models::{Batch, ItemKey, ItemValue, Mutation, PendingOperation, RemoteDocument};

use super::{ChangeFeed, CommitReceipt, IRemoteGateway};

#[derive(Debug)]
struct RemoteState {
    document: RemoteDocument,
    online: bool,
    fail_commits: u32,
    reject_commits: u32,
    commit_delay: Option<Duration>,
    commit_log: Vec<Batch>,
    fetch_count: usize,
}

/// Shared remote document plus a change feed.
#[derive(Debug, Clone)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
    feed: broadcast::Sender<RemoteDocument>,
}

impl InMemoryRemote {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self::with_document(RemoteDocument::empty(collection_id))
    }

    /// Start from an existing document.
    pub fn with_document(document: RemoteDocument) -> Self {
        let (feed, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(RemoteState {
                document,
                online: true,
                fail_commits: 0,
                reject_commits: 0,
                commit_delay: None,
                commit_log: Vec::new(),
                fetch_count: 0,
            })),
            feed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline, commits and fetches fail with `TransientNetwork`.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Fail the next `n` commits with `TransientNetwork`.
    pub fn fail_next_commits(&self, n: u32) {
        self.lock().fail_commits = n;
    }

    /// Reject the next `n` commits with `CommitConflict`.
    pub fn reject_next_commits(&self, n: u32) {
        self.lock().reject_commits = n;
    }

    /// Delay every commit, to exercise timeouts.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.lock().commit_delay = delay;
    }

    /// Current document.
    pub fn document(&self) -> RemoteDocument {
        self.lock().document.clone()
    }

    /// Every batch committed so far, in commit order.
    pub fn commit_log(&self) -> Vec<Batch> {
        self.lock().commit_log.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commit_log.len()
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    /// Commit a write from another device, bypassing fault injection.
    pub fn write_as(&self, device_id: &str, key: &str, value: impl Into<ItemValue>) -> TandemResult<u64> {
        let op = PendingOperation::new(
            ItemKey::new(key)?,
            Mutation::Update {
                value: value.into(),
            },
        );
        Ok(self.apply(device_id, &Batch::single(op)).revision)
    }

    /// Delete a key as another device.
    pub fn remove_as(&self, device_id: &str, key: &str) -> TandemResult<u64> {
        let op = PendingOperation::new(ItemKey::new(key)?, Mutation::Delete);
        Ok(self.apply(device_id, &Batch::single(op)).revision)
    }

    /// Send a raw notification, e.g. a stale or duplicate one.
    pub fn publish(&self, document: RemoteDocument) {
        let _ = self.feed.send(document);
    }

    fn apply(&self, device_id: &str, batch: &Batch) -> CommitReceipt {
        let document = {
            let mut state = self.lock();
            let mut items = state.document.items.clone();
            batch.apply_to(&mut items);
            let doc = &mut state.document;
            doc.items = items;
            doc.revision += 1;
            doc.last_updated = Utc::now();
            doc.last_writer_id = Some(device_id.to_string());
            state.commit_log.push(batch.clone());
            state.document.clone()
        };
        let receipt = CommitReceipt {
            batch_id: batch.id,
            revision: document.revision,
            committed_at: document.last_updated,
        };
        self.publish(document);
        receipt
    }
}

impl IRemoteGateway for InMemoryRemote {
    async fn commit_batch(&self, device_id: &str, batch: &Batch) -> TandemResult<CommitReceipt> {
        let delay = self.lock().commit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut state = self.lock();
            if !state.online {
                return Err(SyncError::network("remote unreachable").into());
            }
            if state.fail_commits > 0 {
                state.fail_commits -= 1;
                return Err(SyncError::network("injected commit failure").into());
            }
            if state.reject_commits > 0 {
                state.reject_commits -= 1;
                return Err(SyncError::conflict("injected commit rejection").into());
            }
        }
        Ok(self.apply(device_id, batch))
    }

    async fn fetch_document(&self) -> TandemResult<RemoteDocument> {
        let mut state = self.lock();
        if !state.online {
            return Err(SyncError::network("remote unreachable").into());
        }
        state.fetch_count += 1;
        Ok(state.document.clone())
    }

    fn subscribe(&self) -> TandemResult<ChangeFeed> {
        Ok(ChangeFeed::new(self.feed.subscribe()))
    }
}
