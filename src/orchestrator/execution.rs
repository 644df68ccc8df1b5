//! Running pending tasks
//!
//! Each execution performs the two collaborator calls of one task and
//! commits the resulting transitions. A commit only lands if the task is
//! still in the set, still in the expected predecessor state and its
//! execution has not been cancelled; anything else is a straggler whose
//! result is discarded.

use super::UploadOrchestrator;
use crate::client::{TransferProgress, UploadManifest, UploadTarget};
use crate::error::{Result, TaskFailure, UploadError};
use crate::file::UploadFile;
use crate::task::{TaskId, TaskState, TaskStatus, PROGRESS_STARTED, PROGRESS_STORED};
use log::{debug, error, info, warn};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Outcome of the tasks launched by one [`run`](UploadOrchestrator::run) call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Removed from the batch before the run returned
    pub removed: usize,
}

impl RunSummary {
    pub fn all_completed(&self) -> bool {
        self.completed == self.launched
    }
}

struct Claimed {
    id: TaskId,
    file: UploadFile,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    /// Upload every task that is currently `pending`.
    ///
    /// Tasks run concurrently on the current tokio runtime, bounded by
    /// `max_concurrent_uploads` when set. The returned future resolves once
    /// every launched task is terminal (or was removed). Nothing is retried.
    ///
    /// Individual failures are reported through task state only.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Launch`] when there is no runtime to spawn on,
    /// or when an execution unit died; in the latter case the affected task
    /// is moved to `error` before returning.
    pub async fn run(&self) -> Result<RunSummary> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| UploadError::launch(e.to_string()))?;

        let claimed = self.claim_pending();
        if claimed.is_empty() {
            debug!("No pending tasks to run");
            return Ok(RunSummary::default());
        }

        info!("Launching {} uploads", claimed.len());

        let (ids, handles): (Vec<_>, Vec<_>) = claimed
            .into_iter()
            .map(|claimed| {
                let id = claimed.id.clone();
                let this = self.clone();
                (id, runtime.spawn(async move { this.execute(claimed).await }))
            })
            .unzip();

        let results = futures::future::join_all(handles).await;

        let mut aborted = 0;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                error!("Upload execution for task {} died: {}", id, e);
                aborted += 1;
                self.abort_execution(id);
            }
        }

        let summary = self.summarize(&ids);
        info!(
            "Run finished: {} launched, {} completed, {} failed ({} cancelled), {} removed",
            summary.launched, summary.completed, summary.failed, summary.cancelled, summary.removed
        );

        if aborted > 0 {
            return Err(UploadError::launch(format!(
                "{} upload executions aborted",
                aborted
            )));
        }

        Ok(summary)
    }

    /// Take every unclaimed pending task for this run
    fn claim_pending(&self) -> Vec<Claimed> {
        let mut set = self.lock();
        set.slots
            .iter_mut()
            .filter(|slot| slot.task.status() == TaskStatus::Pending && !slot.claimed)
            .map(|slot| {
                slot.claimed = true;
                Claimed {
                    id: slot.task.id().clone(),
                    file: slot.task.file().clone(),
                    cancel: slot.cancel.clone(),
                }
            })
            .collect()
    }

    async fn execute(self, claimed: Claimed) {
        let Claimed { id, file, cancel } = claimed;

        let _permit = match &self.inner.limiter {
            Some(limiter) => {
                let acquired = tokio::select! {
                    _ = cancel.cancelled() => return,
                    permit = limiter.clone().acquire_owned() => permit,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        self.commit(&id, &cancel, TaskStatus::Pending, failed(e.to_string()));
                        return;
                    }
                }
            }
            None => None,
        };

        if !self.commit(&id, &cancel, TaskStatus::Pending, TaskState::Uploading) {
            return;
        }

        let target = UploadTarget::from_config(&self.inner.config);
        let progress = self.transfer_progress(&id, &cancel, file.size());

        let stored = match self
            .guarded(
                &cancel,
                "upload",
                self.inner.storage.upload(&file, &target, &progress, &cancel),
            )
            .await
        {
            None => return,
            Some(Ok(stored)) => stored,
            Some(Err(e)) => {
                warn!("Upload of {} ({}) failed: {}", file.name(), id, e);
                self.commit(
                    &id,
                    &cancel,
                    TaskStatus::Uploading,
                    TaskState::Failed(TaskFailure::transfer(e.to_string())),
                );
                return;
            }
        };

        if !self.commit(&id, &cancel, TaskStatus::Uploading, TaskState::Processing) {
            warn!(
                "Task {} was cancelled after {} was stored at {}; the object is left in place",
                id,
                file.name(),
                stored.path
            );
            return;
        }

        let manifest = UploadManifest::new(&file, &target, &stored);
        let outcome = match self
            .guarded(
                &cancel,
                "create_record",
                self.inner.metadata.create_record(&manifest, &cancel),
            )
            .await
        {
            None => return,
            Some(outcome) => outcome,
        };

        let next = match outcome {
            Ok(Some(record)) => {
                debug!("Created record {} for {}", record.id, file.name());
                TaskState::Completed(record)
            }
            Ok(None) => {
                warn!(
                    "No record returned for {}; stored object {} is orphaned",
                    file.name(),
                    stored.path
                );
                TaskState::Failed(TaskFailure::record_creation("no record returned"))
            }
            Err(e) => {
                warn!(
                    "Record creation for {} failed: {}; stored object {} is orphaned",
                    file.name(),
                    e,
                    stored.path
                );
                TaskState::Failed(TaskFailure::record_creation(e.to_string()))
            }
        };

        self.commit(&id, &cancel, TaskStatus::Processing, next);
    }

    /// Race a collaborator call against cancellation and the optional call
    /// timeout. `None` means the task was cancelled and the call abandoned.
    async fn guarded<T, F>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        call: F,
    ) -> Option<Result<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.inner.config.call_timeout_duration();
        let bounded = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(UploadError::timeout(operation))),
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = bounded => Some(result),
        }
    }

    /// Apply `next` to task `id` if it is still in state `expected` and its
    /// execution was not cancelled. Returns whether the transition landed.
    pub(crate) fn commit(
        &self,
        id: &TaskId,
        cancel: &CancellationToken,
        expected: TaskStatus,
        next: TaskState,
    ) -> bool {
        let mut set = self.lock();
        if cancel.is_cancelled() {
            debug!("Discarding result for cancelled task {}", id);
            return false;
        }

        let Some(slot) = set.get_mut(id) else {
            debug!("Discarding result for removed task {}", id);
            return false;
        };

        let current = slot.task.status();
        if current != expected {
            debug!(
                "Discarding {} -> {} for task {}: now {}",
                expected,
                next.status(),
                id,
                current
            );
            return false;
        }

        if let Err(e) = slot.task.transition(next) {
            warn!("Task {}: {}", id, e);
            return false;
        }
        debug!("Task {}: {} -> {}", id, current, slot.task.status());

        self.publish(set);
        true
    }

    /// Map transferred bytes into the window between the start and stored
    /// checkpoints
    fn transfer_progress(
        &self,
        id: &TaskId,
        cancel: &CancellationToken,
        total_bytes: u64,
    ) -> TransferProgress {
        if total_bytes == 0 {
            return TransferProgress::noop(total_bytes);
        }

        let this = self.clone();
        let id = id.clone();
        let cancel = cancel.clone();
        TransferProgress::new(total_bytes, move |sent| {
            let window = u64::from(PROGRESS_STORED - PROGRESS_STARTED);
            let percent = PROGRESS_STARTED + (window * sent / total_bytes) as u8;

            let mut set = this.lock();
            if cancel.is_cancelled() {
                return;
            }
            let changed = match set.get_mut(&id) {
                Some(slot) if slot.task.status() == TaskStatus::Uploading => {
                    slot.task.advance_progress(percent)
                }
                _ => false,
            };
            if changed {
                this.publish(set);
            }
        })
    }

    /// Move a task whose execution unit died to `error`
    fn abort_execution(&self, id: &TaskId) {
        let mut set = self.lock();
        if let Some(slot) = set.get_mut(id) {
            if !slot.task.is_terminal() {
                slot.cancel.cancel();
                let _ = slot.task.transition(TaskState::Failed(TaskFailure::transfer(
                    "execution aborted",
                )));
                self.publish(set);
            }
        }
    }

    fn summarize(&self, ids: &[TaskId]) -> RunSummary {
        let set = self.lock();
        let mut summary = RunSummary {
            launched: ids.len(),
            ..RunSummary::default()
        };

        for id in ids {
            match set.get(id).map(|slot| slot.task.state()) {
                Some(TaskState::Completed(_)) => summary.completed += 1,
                Some(TaskState::Failed(failure)) => {
                    summary.failed += 1;
                    if failure.is_cancellation() {
                        summary.cancelled += 1;
                    }
                }
                Some(_) => {}
                None => summary.removed += 1,
            }
        }

        summary
    }
}

fn failed(message: String) -> TaskState {
    TaskState::Failed(TaskFailure::transfer(message))
}
