//! Flush cycle: drain the outbox in bounded batches, one batch in flight.

use tracing::{debug, info, warn, Instrument};

use tandem_core::errors::{SyncError, TandemError, TandemResult};
use tandem_core::models::{Batch, SyncStatus};
use tandem_core::traits::IDurableStore;

use super::SyncEngine;
use crate::events::EngineEvent;
use crate::gateway::{CommitReceipt, IRemoteGateway};
use crate::merge::MergeTrigger;
use crate::outbox::{OutboxEntry, Restored};

/// Outcome of one [`SyncEngine::flush`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches sent, whether or not they committed.
    pub batches: usize,
    /// Operations acknowledged by the remote.
    pub committed: usize,
    /// Operations returned to the outbox for a later retry.
    pub failed: usize,
    /// Failed operations dropped because a newer one for the same key was queued.
    pub superseded: usize,
    /// Failed operations that reached the attempt cap.
    pub stalled: usize,
    /// Failures that were commit conflicts. Any conflict triggers a merge.
    pub conflicts: usize,
    /// Pending work was left alone because the device is offline.
    pub skipped_offline: bool,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.stalled == 0 && !self.skipped_offline
    }
}

impl<S: IDurableStore + 'static, G: IRemoteGateway> SyncEngine<S, G> {
    /// Send every eligible pending operation, `max_batch_size` at a time.
    ///
    /// A failed batch is retried operation by operation so one bad write does
    /// not hold back the rest. Operations that still fail go back to the
    /// outbox with `attempt + 1`, the backoff is armed, and the cycle stops.
    /// A commit conflict is followed by a merge against the remote document.
    pub async fn flush(&self) -> FlushReport {
        let report = {
            let _cycle = self.core.flush_lock.lock().await;
            self.flush_cycle()
                .instrument(crate::flush_span!(self.collection_id()))
                .await
        };

        if report.conflicts > 0 {
            if let Err(e) = self.reconcile(MergeTrigger::Conflict).await {
                warn!(error = %e, "merge after commit conflict failed");
            }
        }
        report
    }

    async fn flush_cycle(&self) -> FlushReport {
        let core = &self.core;
        let mut report = FlushReport::default();

        loop {
            let entries = {
                let mut state = core.state();
                if !state.online {
                    report.skipped_offline = state.outbox.pending_len() > 0;
                    break;
                }
                let entries = state.outbox.take_batch();
                if entries.is_empty() {
                    break;
                }
                for entry in &entries {
                    state
                        .in_flight
                        .insert(entry.op.target_key.clone(), entry.op.id);
                }
                state.set_status(SyncStatus::Syncing, &core.events);
                entries
            };

            report.batches += 1;
            let batch = Batch::new(entries.iter().map(|entry| entry.op.clone()).collect());
            let failures = match self.commit(&batch).await {
                Ok(receipt) => {
                    report.committed += entries.len();
                    self.on_committed(entries, &receipt);
                    Vec::new()
                }
                Err(e) if entries.len() == 1 => entries.into_iter().zip(std::iter::once(e)).collect(),
                Err(e) => {
                    warn!(
                        batch_id = %batch.id,
                        size = batch.len(),
                        error = %e,
                        "batch commit failed, retrying operations individually"
                    );
                    self.commit_individually(entries, &mut report).await
                }
            };

            if !failures.is_empty() {
                self.on_failed(failures, &mut report);
                break;
            }
        }

        let mut state = core.state();
        if report.skipped_offline {
            state.last_attempt_failed = true;
        } else if report.batches > 0 && report.failed == 0 && report.superseded == 0 {
            state.last_attempt_failed = false;
            state.backoff.clear();
        }
        let status = state.settled_status();
        state.set_status(status, &core.events);
        drop(state);

        if report.batches > 0 {
            info!(
                batches = report.batches,
                committed = report.committed,
                failed = report.failed,
                stalled = report.stalled,
                "flush complete"
            );
        }
        report
    }

    async fn commit(&self, batch: &Batch) -> TandemResult<CommitReceipt> {
        let core = &self.core;
        self.with_timeout("commit", core.gateway.commit_batch(&core.device_id, batch))
            .instrument(crate::commit_span!(batch.id, batch.len()))
            .await
    }

    /// Commit each entry as its own batch. Returns the ones that failed.
    async fn commit_individually(
        &self,
        entries: Vec<OutboxEntry>,
        report: &mut FlushReport,
    ) -> Vec<(OutboxEntry, TandemError)> {
        let mut failures = Vec::new();
        for entry in entries {
            let batch = Batch::single(entry.op.clone());
            match self.commit(&batch).await {
                Ok(receipt) => {
                    report.committed += 1;
                    self.on_committed(vec![entry], &receipt);
                }
                Err(e) => failures.push((entry, e)),
            }
        }
        failures
    }

    fn on_committed(&self, entries: Vec<OutboxEntry>, receipt: &CommitReceipt) {
        let core = &self.core;
        let ids: Vec<_> = entries.iter().map(|entry| entry.op.id).collect();
        // A leftover record is replayed on the next start; commits are idempotent.
        if let Err(e) = core.queue.remove_many(&ids) {
            warn!(error = %e, count = ids.len(), "failed to clear committed operations");
        }

        let mut state = core.state();
        state.watermark.observe_commit(receipt.revision);
        for entry in entries {
            state.in_flight.remove(&entry.op.target_key);
            core.events.emit(EngineEvent::ItemCommitted {
                key: entry.op.target_key,
                op_id: entry.op.id,
            });
        }
        debug!(
            batch_id = %receipt.batch_id,
            revision = receipt.revision,
            count = ids.len(),
            "batch committed"
        );
    }

    fn on_failed(&self, failures: Vec<(OutboxEntry, TandemError)>, report: &mut FlushReport) {
        let core = &self.core;
        let retry = &core.config.retry;
        let mut state = core.state();
        let mut retry_attempt = None;

        for (mut entry, error) in failures {
            state.in_flight.remove(&entry.op.target_key);
            if matches!(error.as_sync_error(), Some(SyncError::CommitConflict { .. })) {
                report.conflicts += 1;
            }

            entry.op.attempt = entry.op.attempt.saturating_add(1);
            let id = entry.op.id;
            let key = entry.op.target_key.clone();
            let attempt = entry.op.attempt;

            match state.outbox.restore(entry) {
                Restored::Superseded(stale) => {
                    report.superseded += 1;
                    if let Err(e) = core.queue.remove(stale.id) {
                        warn!(key = %key, error = %e, "failed to drop superseded operation");
                    }
                    debug!(key = %key, op_id = %stale.id, "failed operation superseded by a newer write");
                }
                Restored::Requeued => {
                    report.failed += 1;
                    if let Some(op) = state.outbox.get(key.as_str()) {
                        if let Err(e) = core.queue.persist(op) {
                            warn!(key = %key, error = %e, "failed to persist retry attempt");
                        }
                    }

                    if retry.is_exhausted(attempt) {
                        state.outbox.stall(id);
                        report.stalled += 1;
                        let stalled = SyncError::ExhaustedRetry {
                            key: key.to_string(),
                            attempts: attempt,
                        };
                        warn!(error = %stalled, last_error = %error, "operation stalled");
                        core.events.emit(EngineEvent::OperationStalled {
                            key,
                            op_id: id,
                            attempts: attempt,
                        });
                    } else {
                        debug!(
                            key = %key,
                            attempt,
                            kind = error.as_sync_error().map_or("local", SyncError::kind),
                            error = %error,
                            "operation will be retried"
                        );
                        retry_attempt = retry_attempt.max(Some(attempt));
                    }
                }
            }
        }

        state.last_attempt_failed = true;
        if let Some(attempt) = retry_attempt {
            let delay = retry.backoff_for(attempt);
            state.backoff.arm(delay);
            core.events.emit(EngineEvent::RetryRequested { after: delay });
            info!(?delay, attempt, "retry scheduled");
        }
    }
}
