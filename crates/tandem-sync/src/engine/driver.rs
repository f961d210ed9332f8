//! Background driver: flush timers, change feed, periodic replay, and host
//! triggers on one tokio task.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use tandem_core::traits::IDurableStore;

use super::SyncEngine;
use crate::gateway::{ChangeFeed, FeedEvent, IRemoteGateway};
use crate::merge::MergeTrigger;
use crate::replay::{flush_deadline, ReplayTrigger};

/// Handle to a running driver. Dropping it stops the driver too.
#[derive(Debug)]
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the driver and wait for the current step to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync driver task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> SyncEngine<S, G> {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn_driver(&self) -> DriverHandle {
        let (shutdown, rx) = watch::channel(false);
        let engine = self.clone();
        let task = tokio::spawn(async move { engine.run_driver(rx).await });
        DriverHandle { shutdown, task }
    }

    async fn run_driver(self, mut shutdown: watch::Receiver<bool>) {
        info!(collection = %self.collection_id(), "sync driver started");

        let mut feed = self.open_feed();
        if self.is_online() {
            if let Err(e) = self.reconcile(MergeTrigger::ColdStart).await {
                warn!(error = %e, "cold start merge failed");
            }
            self.flush().await;
        }

        let interval = self.core.config.retry.replay_interval();
        let mut replay = tokio::time::interval_at(Instant::now() + interval, interval);
        replay.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(trigger) = self.take_requested() {
                if feed.is_none() {
                    feed = self.open_feed();
                }
                self.sync_now(trigger).await;
                continue;
            }

            let deadline = self.next_flush_deadline();
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = self.core.wake.notified() => {}
                _ = sleep_until(deadline) => {
                    if self.backoff_elapsed() {
                        self.sync_now(ReplayTrigger::Backoff).await;
                    } else {
                        self.flush().await;
                    }
                }
                _ = replay.tick() => {
                    if feed.is_none() && self.is_online() {
                        feed = self.open_feed();
                        if let Err(e) = self.reconcile(MergeTrigger::Reconnect).await {
                            warn!(error = %e, "resubscribe merge failed");
                        }
                    }
                    self.sync_now(ReplayTrigger::Periodic).await;
                }
                event = next_event(&mut feed) => {
                    if !self.on_feed_event(event).await {
                        feed = None;
                    }
                }
            }
        }

        info!(collection = %self.collection_id(), "sync driver stopped");
    }

    fn open_feed(&self) -> Option<ChangeFeed> {
        match self.core.gateway.subscribe() {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!(error = %e, "change feed subscription failed");
                None
            }
        }
    }

    fn take_requested(&self) -> Option<ReplayTrigger> {
        self.core.state().requested.take()
    }

    fn backoff_elapsed(&self) -> bool {
        self.core
            .state()
            .backoff
            .retry_at()
            .is_some_and(|at| at <= Instant::now())
    }

    /// None while offline or with nothing eligible to send.
    fn next_flush_deadline(&self) -> Option<Instant> {
        let state = self.core.state();
        if !state.online {
            return None;
        }
        flush_deadline(
            Instant::now(),
            state.outbox.oldest_queued_at(),
            state.outbox.is_full(),
            self.core.config.outbox.max_wait(),
            state.backoff.retry_at(),
        )
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_event(feed: &mut Option<ChangeFeed>) -> FeedEvent {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}
