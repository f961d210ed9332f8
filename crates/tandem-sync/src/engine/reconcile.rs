//! Pulling remote state: fetch, merge, and change-feed handling.

use tracing::{debug, info, warn};

use tandem_core::errors::{SyncError, TandemResult};
use tandem_core::models::{ItemOrigin, Mutation, RemoteDocument, SyncStatus};
use tandem_core::traits::IDurableStore;

use super::{FlushReport, SyncEngine};
use crate::events::EngineEvent;
use crate::gateway::{FeedEvent, IRemoteGateway};
use crate::listener::ListenerAction;
use crate::merge::{plan_merge, MergePlan, MergeReport, MergeTrigger};
use crate::replay::ReplayTrigger;

/// Outcome of [`SyncEngine::sync_now`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Present when the trigger merged before replaying and the fetch worked.
    pub merge: Option<MergeReport>,
    pub flush: FlushReport,
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> SyncEngine<S, G> {
    /// Fetch the remote document and merge it into the replica.
    pub async fn reconcile(&self, trigger: MergeTrigger) -> TandemResult<MergeReport> {
        let core = &self.core;
        {
            let mut state = core.state();
            if !state.online {
                return Err(SyncError::network("device is offline").into());
            }
            state.set_status(SyncStatus::Syncing, &core.events);
        }

        let fetched = self
            .with_timeout("fetch", core.gateway.fetch_document())
            .await;
        let result = match fetched {
            Ok(document) => self.apply_remote_document(document, trigger),
            Err(e) => {
                warn!(trigger = ?trigger, error = %e, "remote fetch failed");
                core.state().last_attempt_failed = true;
                Err(e)
            }
        };

        let mut state = core.state();
        let status = state.settled_status();
        state.set_status(status, &core.events);
        result
    }

    /// Merge a remote document into the replica.
    ///
    /// Keys with unacknowledged local work keep their local value. Remote
    /// values are adopted without being queued for push. Local-only keys
    /// are queued as `add` operations; one that cannot be persisted is
    /// skipped and picked up by the next merge.
    ///
    /// A document older than the last applied or committed revision is
    /// stale and changes nothing; its report has all counts at zero.
    pub fn apply_remote_document(
        &self,
        document: RemoteDocument,
        trigger: MergeTrigger,
    ) -> TandemResult<MergeReport> {
        let core = &self.core;
        let _span = crate::merge_span!(trigger, document.revision).entered();

        let (report, adopted) = {
            let mut state = core.state();
            let watermark = state.watermark.revision();
            if document.revision < watermark {
                debug!(
                    revision = document.revision,
                    watermark, "skipping stale remote document"
                );
                return Ok(MergeReport::from_plan(
                    trigger,
                    document.revision,
                    &MergePlan::default(),
                ));
            }

            let pending = state.pending_keys();
            let plan = plan_merge(&state.replica.get_all(), &document.items, &pending);

            state
                .replica
                .adopt(core.store.as_ref(), &plan.adopt, &document)?;
            let mut pushed = 0;
            for (key, value) in &plan.push {
                let op = state.outbox.stage(
                    key,
                    Mutation::Add {
                        value: value.clone(),
                    },
                );
                match core.queue.persist(&op) {
                    Ok(()) => {
                        state.outbox.accept(op);
                        pushed += 1;
                    }
                    Err(e) => warn!(key = %key, error = %e, "failed to queue local-only key"),
                }
            }
            state.watermark.advance(&document);

            let mut report = MergeReport::from_plan(trigger, document.revision, &plan);
            report.pushed = pushed;
            (report, plan.adopt)
        };

        for (key, value) in adopted {
            core.events.emit(EngineEvent::ItemChanged {
                key,
                value: Some(value),
                origin: ItemOrigin::Remote,
            });
        }
        core.events.emit(EngineEvent::Merged(report.clone()));

        info!(
            revision = report.revision,
            adopted = report.adopted,
            retained = report.retained,
            pushed = report.pushed,
            "remote document merged"
        );
        if report.pushed > 0 {
            core.wake.notify_one();
        }
        Ok(report)
    }

    /// Handle one change-feed event. Returns false once the feed is closed.
    pub(crate) async fn on_feed_event(&self, event: FeedEvent) -> bool {
        let action = self.core.state().watermark.on_event(event);
        match action {
            ListenerAction::Merge(document) => {
                if let Err(e) = self.apply_remote_document(document, MergeTrigger::RemoteChange) {
                    warn!(error = %e, "failed to merge remote change");
                }
                true
            }
            ListenerAction::Refetch { missed } => {
                warn!(missed, "change feed lagged, refetching remote document");
                if let Err(e) = self.reconcile(MergeTrigger::RemoteChange).await {
                    warn!(error = %e, "refetch after lag failed");
                }
                true
            }
            ListenerAction::Ignore(freshness) => {
                debug!(?freshness, "ignoring remote notification");
                true
            }
            ListenerAction::Closed => {
                warn!("change feed closed");
                false
            }
        }
    }

    /// Replay queued operations now. Triggers that merge first fetch the
    /// remote document before flushing. A periodic replay waits out an
    /// armed backoff.
    pub async fn sync_now(&self, trigger: ReplayTrigger) -> SyncReport {
        {
            let mut state = self.core.state();
            if trigger.releases_stalled() {
                let released = state.outbox.release_stalled();
                if released > 0 {
                    info!(released, "released stalled operations");
                }
            }
            if trigger.overrides_backoff() {
                state.backoff.clear();
            } else if state.backoff.is_waiting(tokio::time::Instant::now()) {
                debug!(trigger = trigger.as_str(), "replay deferred by backoff");
                return SyncReport::default();
            }
        }
        debug!(trigger = trigger.as_str(), "replaying queued operations");

        let merge = match trigger.merge_first() {
            Some(merge_trigger) => match self.reconcile(merge_trigger).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(trigger = trigger.as_str(), error = %e, "merge before replay failed");
                    None
                }
            },
            None => None,
        };
        let flush = self.flush().await;
        SyncReport { merge, flush }
    }
}
