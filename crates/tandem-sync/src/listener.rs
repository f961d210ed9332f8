//! Real-time reconciliation: decides what to do with each change-feed event.
//!
//! Notifications can arrive late, twice, or not at all. A revision watermark
//! drops anything older than the last applied document, revision plus
//! content hash detects duplicates, and a lagged feed falls back to a full
//! fetch.

use tandem_core::models::RemoteDocument;

use crate::gateway::FeedEvent;

/// How a notification relates to what was already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Duplicate,
    OutOfOrder,
}

/// What the engine should do with a feed event.
#[derive(Debug)]
pub enum ListenerAction {
    /// Merge this document.
    Merge(RemoteDocument),
    /// Notifications were missed; fetch the whole document and merge it.
    Refetch { missed: u64 },
    /// Nothing to do.
    Ignore(Freshness),
    /// The feed ended; resubscribe later.
    Closed,
}

/// Last remote state applied to the replica.
#[derive(Debug, Clone, Default)]
pub struct RemoteWatermark {
    revision: u64,
    content_hash: Option<String>,
}

impl RemoteWatermark {
    /// Start from a known revision whose content was not recorded.
    pub fn at_revision(revision: u64) -> Self {
        Self {
            revision,
            content_hash: None,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn classify(&self, document: &RemoteDocument) -> Freshness {
        if document.revision < self.revision {
            return Freshness::OutOfOrder;
        }
        if document.revision == self.revision
            && self.content_hash.as_deref() == Some(document.content_hash().as_str())
        {
            return Freshness::Duplicate;
        }
        Freshness::Fresh
    }

    /// Record `document` as applied.
    pub fn advance(&mut self, document: &RemoteDocument) {
        if document.revision >= self.revision {
            self.revision = document.revision;
            self.content_hash = Some(document.content_hash());
        }
    }

    /// Our own commit produced `revision`; anything older is stale. The
    /// content is unknown until the notification for it arrives.
    pub fn observe_commit(&mut self, revision: u64) {
        if revision > self.revision {
            self.revision = revision;
            self.content_hash = None;
        }
    }

    /// Decide what to do with a feed event.
    pub fn on_event(&self, event: FeedEvent) -> ListenerAction {
        match event {
            FeedEvent::Document(document) => match self.classify(&document) {
                Freshness::Fresh => ListenerAction::Merge(document),
                other => ListenerAction::Ignore(other),
            },
            FeedEvent::Lagged(missed) => ListenerAction::Refetch { missed },
            FeedEvent::Closed => ListenerAction::Closed,
        }
    }
}
