//! Replay triggers and retry backoff for queued operations.

use std::time::Duration;

use tokio::time::Instant;

use crate::merge::MergeTrigger;

/// Why queued work is being replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayTrigger {
    /// The host reported that the network is back.
    ConnectivityRestored,
    /// The periodic replay timer fired.
    Periodic,
    /// The user or host asked for a sync now.
    ForceSync,
    /// The retry backoff elapsed.
    Backoff,
}

impl ReplayTrigger {
    /// Whether stalled operations become eligible again.
    pub fn releases_stalled(self) -> bool {
        matches!(self, Self::ConnectivityRestored | Self::ForceSync)
    }

    /// Whether to fetch and merge the remote document before flushing.
    pub fn merge_first(self) -> Option<MergeTrigger> {
        match self {
            Self::ConnectivityRestored | Self::ForceSync => Some(MergeTrigger::Reconnect),
            Self::Periodic | Self::Backoff => None,
        }
    }

    /// Whether this trigger ignores an armed backoff.
    pub fn overrides_backoff(self) -> bool {
        !matches!(self, Self::Periodic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectivityRestored => "connectivity_restored",
            Self::Periodic => "periodic",
            Self::ForceSync => "force_sync",
            Self::Backoff => "backoff",
        }
    }
}

/// When the next retry is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backoff {
    retry_at: Option<Instant>,
}

impl Backoff {
    pub fn arm(&mut self, delay: Duration) {
        self.retry_at = Some(Instant::now() + delay);
    }

    pub fn clear(&mut self) {
        self.retry_at = None;
    }

    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Whether a retry time is set and still in the future.
    pub fn is_waiting(&self, now: Instant) -> bool {
        self.retry_at.is_some_and(|at| at > now)
    }
}

/// When the outbox should flush next: immediately when a full batch is
/// waiting, otherwise `max_wait` after the oldest pending entry, and never
/// before an armed retry time.
pub fn flush_deadline(
    now: Instant,
    oldest: Option<Instant>,
    full: bool,
    max_wait: Duration,
    retry_at: Option<Instant>,
) -> Option<Instant> {
    let oldest = oldest?;
    let due = if full { now } else { oldest + max_wait };
    Some(match retry_at {
        Some(at) if at > due => at,
        _ => due,
    })
}
