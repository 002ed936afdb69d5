//! The sync coordinator.
//!
//! Drains the primary queue against the registered submitters, at most one
//! pass at a time.
//!
//! ## Pass protocol
//!
//! 1. Take the pass flag with a compare-and-set; if it is taken, return
//!    [`PassOutcome::Skipped`].
//! 2. Snapshot the queue with `get_all()`. Entries enqueued later wait for
//!    the next pass.
//! 3. Process entries one at a time, in queue order:
//!    - mark `IN_FLIGHT` (best-effort)
//!    - submit under `submit_timeout`
//!    - applied: delete from the queue
//!    - retryable failure: bump `retry_count` and stay queued, or
//!      dead-letter once `max_retries` is used up
//!    - conflict: ask the resolver; resubmit once or dead-letter
//!    - rejected / unknown entity type: dead-letter immediately
//! 4. An entry that is deferred (backoff not elapsed) or left for retry
//!    holds back every later entry for the same record key until the next
//!    pass, so two edits of one record never apply out of order.
//!
//! Only a store failure aborts a pass; it is returned as
//! [`SyncError::Storage`].

use crate::config::SyncConfig;
use crate::conflict::{ApplyMode, ConflictResolver, FieldMergeResolver, Resolution};
use crate::error::{SyncError, SyncResult};
use crate::notify::{NoopNotifier, Notifier, SyncEvent};
use crate::stats::{PassOutcome, PassReport, SyncState, SyncStats};
use crate::submit::{SubmitOutcome, SubmitRequest, Submitter, SubmitterRegistry};
use chrono::{DateTime, TimeDelta, Utc};
use outbox_core::{
    DeadLetterEntry, DeadLetterStore, FailureReason, Operation, OperationDraft, OperationId,
    QueueStore, RecordKey, RecoveryReport,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

/// How one entry left the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Resolved,
    Retrying,
    DeadLettered,
}

/// Drains the queue. Share it behind an `Arc`.
pub struct SyncCoordinator {
    config: SyncConfig,
    queue: Arc<dyn QueueStore>,
    dead_letters: Arc<dyn DeadLetterStore>,
    submitters: SubmitterRegistry,
    resolver: Arc<dyn ConflictResolver>,
    notifier: Arc<dyn Notifier>,
    syncing: AtomicBool,
    /// Held by recovery; a pass waits on it before reading the queue.
    maintenance: Mutex<()>,
    state: watch::Sender<SyncState>,
    stats: RwLock<SyncStats>,
    wake: Notify,
}

impl SyncCoordinator {
    /// Creates a coordinator with the field-merge resolver and no notifier.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `config` does not validate.
    pub fn new(
        config: SyncConfig,
        queue: Arc<dyn QueueStore>,
        dead_letters: Arc<dyn DeadLetterStore>,
        submitters: SubmitterRegistry,
    ) -> SyncResult<Self> {
        config.validate()?;
        let (state, _) = watch::channel(SyncState::Idle);
        Ok(Self {
            config,
            queue,
            dead_letters,
            submitters,
            resolver: Arc::new(FieldMergeResolver),
            notifier: Arc::new(NoopNotifier),
            syncing: AtomicBool::new(false),
            maintenance: Mutex::new(()),
            state,
            stats: RwLock::new(SyncStats::default()),
            wake: Notify::new(),
        })
    }

    /// Replaces the conflict resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ConflictResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Installs a notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current drain state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Subscribes to drain state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Returns true while a pass holds the pass flag.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Running totals.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The primary queue.
    pub fn queue(&self) -> &Arc<dyn QueueStore> {
        &self.queue
    }

    /// The dead-letter store.
    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterStore> {
        &self.dead_letters
    }

    /// Queues an operation. Allowed at any time, including mid-pass.
    ///
    /// Durable once this returns.
    pub fn enqueue(&self, draft: OperationDraft) -> SyncResult<Operation> {
        let op = Operation::from_draft(draft, Utc::now())?;
        self.queue.put(&op)?;
        debug!(operation = %op.id, entity_type = %op.entity_type, kind = %op.kind, "queued operation");
        self.notifier.notify(&SyncEvent::Queued {
            operation_id: op.id,
            entity_type: op.entity_type.clone(),
        });
        Ok(op)
    }

    /// Queued operations, oldest first.
    pub fn pending(&self) -> SyncResult<Vec<Operation>> {
        Ok(self.queue.get_all()?)
    }

    /// Dead-lettered operations, oldest first.
    pub fn dead_lettered(&self) -> SyncResult<Vec<DeadLetterEntry>> {
        Ok(self.dead_letters.get_all()?)
    }

    /// Moves a dead letter back into the queue under a fresh id.
    pub fn replay_dead_letter(&self, id: OperationId) -> SyncResult<Operation> {
        let op = outbox_core::replay_dead_letter(
            self.queue.as_ref(),
            self.dead_letters.as_ref(),
            id,
            Utc::now(),
        )?;
        self.notifier.notify(&SyncEvent::Queued {
            operation_id: op.id,
            entity_type: op.entity_type.clone(),
        });
        Ok(op)
    }

    /// Deletes a dead letter for good.
    pub fn discard_dead_letter(&self, id: OperationId) -> SyncResult<DeadLetterEntry> {
        Ok(outbox_core::discard_dead_letter(
            self.dead_letters.as_ref(),
            id,
        )?)
    }

    /// Repairs the queue after a crash. See [`outbox_core::recover`].
    ///
    /// Does nothing while a pass is running. Leaves the sync state and the
    /// pass statistics untouched.
    pub fn recover(&self) -> SyncResult<RecoveryReport> {
        let _maintenance = self.maintenance.lock();
        if self.is_syncing() {
            debug!("pass running; recovery skipped");
            return Ok(RecoveryReport::default());
        }
        Ok(outbox_core::recover(
            self.queue.as_ref(),
            self.dead_letters.as_ref(),
        )?)
    }

    /// Runs one drain pass, or returns [`PassOutcome::Skipped`] if one is
    /// already running.
    ///
    /// Runs regardless of network status.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if a store fails; the pass stops at
    /// the entry being processed.
    pub async fn sync(&self) -> SyncResult<PassOutcome> {
        let Some(_guard) = PassGuard::acquire(self) else {
            debug!("drain pass already running; trigger ignored");
            self.stats.write().passes_skipped += 1;
            return Ok(PassOutcome::Skipped);
        };
        // Waits out a recovery that started before the flag was taken.
        drop(self.maintenance.lock());

        match self.drain().await {
            Ok(report) => {
                self.stats.write().record_pass(&report);
                info!(
                    snapshot = report.snapshot,
                    resolved = report.resolved,
                    retried = report.retried,
                    deferred = report.deferred,
                    dead_lettered = report.dead_lettered,
                    duration = ?report.duration,
                    "drain pass completed"
                );
                self.notifier
                    .notify(&SyncEvent::SyncCompleted(report.clone()));
                Ok(PassOutcome::Completed(report))
            }
            Err(err) => {
                error!(error = %err, "drain pass aborted");
                let mut stats = self.stats.write();
                stats.passes_failed += 1;
                stats.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Asks the background worker for a pass.
    ///
    /// Has no effect until [`SyncCoordinator::spawn_worker`] runs.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    pub(crate) fn wake_signal(&self) -> &Notify {
        &self.wake
    }

    async fn drain(&self) -> SyncResult<PassReport> {
        let started = Instant::now();
        let snapshot = self.queue.get_all()?;
        let mut report = PassReport {
            snapshot: snapshot.len(),
            ..PassReport::default()
        };
        self.notifier.notify(&SyncEvent::SyncStarted {
            pending: snapshot.len(),
        });
        debug!(pending = snapshot.len(), "drain pass started");

        let mut held: HashSet<RecordKey> = HashSet::new();
        for op in snapshot {
            let key = op.record_key();
            if held.contains(&key) {
                debug!(operation = %op.id, record = %key, "held behind earlier entry for the same record");
                report.deferred += 1;
                continue;
            }
            if !op.is_due(Utc::now()) {
                debug!(operation = %op.id, next_attempt_at = ?op.next_attempt_at, "backoff not elapsed");
                report.deferred += 1;
                held.insert(key);
                continue;
            }

            if self.process(op, &mut report).await? == EntryOutcome::Retrying {
                held.insert(key);
            }
        }

        report.duration = started.elapsed();
        Ok(report)
    }

    async fn process(&self, mut op: Operation, report: &mut PassReport) -> SyncResult<EntryOutcome> {
        // Left behind by an aborted pass.
        op.recover_in_flight();
        op.begin_attempt(Utc::now());
        if let Err(err) = self.queue.put(&op) {
            warn!(operation = %op.id, error = %err, "could not mark entry in flight");
        }

        let Some(submitter) = self.submitters.get(&op.entity_type) else {
            let error = SyncError::UnknownEntity(op.entity_type.clone());
            op.last_error = Some(error.to_string());
            return self.dead_letter(op, FailureReason::UnknownEntityType, Vec::new(), report);
        };

        let mut resubmitted = false;
        loop {
            report.attempts += 1;
            match self.submit(submitter.as_ref(), &op).await {
                Ok(SubmitOutcome::Applied) => return self.resolve(&op, report),
                Ok(SubmitOutcome::Rejected(reason)) => {
                    op.last_error = Some(SyncError::Rejected(reason).to_string());
                    return self.dead_letter(op, FailureReason::Rejected, Vec::new(), report);
                }
                Ok(SubmitOutcome::Conflict(remote)) => {
                    report.conflicts += 1;
                    let conflicts = match self.resolver.resolve(&op, &remote) {
                        Resolution::Applyable(ApplyMode::AlreadyApplied) => {
                            debug!(operation = %op.id, "remote already reflects the operation");
                            return self.resolve(&op, report);
                        }
                        Resolution::Applyable(ApplyMode::Resubmit) if !resubmitted => {
                            debug!(
                                operation = %op.id,
                                from = op.local_version,
                                to = remote.version,
                                "conflict resolvable; resubmitting"
                            );
                            op.rebase(remote.version);
                            resubmitted = true;
                            continue;
                        }
                        Resolution::Applyable(ApplyMode::Resubmit) => vec![format!(
                            "remote version {} still conflicts after resubmitting",
                            remote.version
                        )],
                        Resolution::Conflicting(conflicts) if conflicts.is_empty() => {
                            vec![format!(
                                "remote version {} differs from local version {}",
                                remote.version, op.local_version
                            )]
                        }
                        Resolution::Conflicting(conflicts) => conflicts,
                    };
                    op.last_error = Some(
                        SyncError::Conflict {
                            operation: op.id,
                            conflicts: conflicts.clone(),
                        }
                        .to_string(),
                    );
                    return self.dead_letter(op, FailureReason::Conflict, conflicts, report);
                }
                Err(err) if err.is_retryable() => return self.retry_or_exhaust(op, &err, report),
                Err(err) => {
                    op.last_error = Some(err.to_string());
                    return self.dead_letter(op, FailureReason::Rejected, Vec::new(), report);
                }
            }
        }
    }

    async fn submit(&self, submitter: &dyn Submitter, op: &Operation) -> SyncResult<SubmitOutcome> {
        let request = SubmitRequest::from(op);
        let timeout = self.config.submit_timeout;
        match tokio::time::timeout(timeout, submitter.submit(&request)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    fn resolve(&self, op: &Operation, report: &mut PassReport) -> SyncResult<EntryOutcome> {
        self.queue.delete(op.id)?;
        report.resolved += 1;
        debug!(operation = %op.id, entity_type = %op.entity_type, "operation applied");
        Ok(EntryOutcome::Resolved)
    }

    fn retry_or_exhaust(
        &self,
        mut op: Operation,
        err: &SyncError,
        report: &mut PassReport,
    ) -> SyncResult<EntryOutcome> {
        let now = Utc::now();
        if op.retry_count < self.config.max_retries {
            let next_attempt_at = self.next_attempt_at(now, op.retry_count + 1);
            op.schedule_retry(now, next_attempt_at, err.to_string());
            self.queue.put(&op)?;
            report.retried += 1;
            warn!(
                operation = %op.id,
                retry = op.retry_count,
                max_retries = self.config.max_retries,
                error = %err,
                "retryable failure; entry stays queued"
            );
            Ok(EntryOutcome::Retrying)
        } else {
            op.updated_at = now;
            op.last_error = Some(err.to_string());
            self.dead_letter(op, FailureReason::RetriesExhausted, Vec::new(), report)
        }
    }

    fn next_attempt_at(&self, now: DateTime<Utc>, retry: u32) -> Option<DateTime<Utc>> {
        let delay = self.config.retry.delay_for_retry(retry);
        if delay.is_zero() {
            return None;
        }
        TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
    }

    /// Moves `op` to the dead-letter store: dead letter first, then the
    /// queue delete. [`SyncCoordinator::recover`] cleans up a crash between
    /// the two.
    fn dead_letter(
        &self,
        op: Operation,
        reason: FailureReason,
        conflicts: Vec<String>,
        report: &mut PassReport,
    ) -> SyncResult<EntryOutcome> {
        let entry = DeadLetterEntry::new(op, reason, conflicts, Utc::now());
        self.dead_letters.put(&entry)?;
        self.queue.delete(entry.id())?;
        report.dead_lettered += 1;

        warn!(
            operation = %entry.id(),
            entity_type = %entry.operation.entity_type,
            %reason,
            retries = entry.operation.retry_count,
            "operation moved to dead letters"
        );
        self.notifier.notify(&SyncEvent::EntryFailed {
            operation_id: entry.id(),
            entity_type: entry.operation.entity_type.clone(),
            reason,
            conflicts: entry.conflicts.clone(),
        });
        Ok(EntryOutcome::DeadLettered)
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("submitters", &self.submitters)
            .finish_non_exhaustive()
    }
}

/// Holds the pass flag; releases it and returns to `Idle` on drop.
struct PassGuard<'a> {
    coordinator: &'a SyncCoordinator,
}

impl<'a> PassGuard<'a> {
    fn acquire(coordinator: &'a SyncCoordinator) -> Option<Self> {
        coordinator
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        coordinator.state.send_replace(SyncState::Draining);
        Some(Self { coordinator })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.state.send_replace(SyncState::Idle);
        self.coordinator.syncing.store(false, Ordering::Release);
    }
}
