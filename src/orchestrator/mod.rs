//! Upload orchestration
//!
//! The [`UploadOrchestrator`] owns one batch of tasks. Admission and the
//! read-side queries live here, execution in [`execution`] and the
//! cancel/remove/clear operations in [`lifecycle`].
//!
//! The task set sits behind a single mutex that is never held across an
//! `.await`. Every mutation publishes a fresh [`BatchSnapshot`] on a watch
//! channel, so readers only ever see whole snapshots.

pub mod execution;
pub mod lifecycle;

use crate::client::{MetadataClient, StorageClient};
use crate::config::UploaderConfig;
use crate::error::Result;
use crate::file::UploadFile;
use crate::stats::{BatchSnapshot, BatchStats};
use crate::task::{TaskId, UploadTask};
use crate::validator::Validator;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

pub use execution::RunSummary;

/// A task plus the execution bookkeeping the caller never sees
pub(crate) struct TaskSlot {
    pub(crate) task: UploadTask,
    pub(crate) cancel: CancellationToken,
    /// Set once a `run` call has taken the task
    pub(crate) claimed: bool,
}

#[derive(Default)]
pub(crate) struct TaskSet {
    slots: Vec<TaskSlot>,
    next_sequence: u64,
    /// Bumped on every published change
    version: u64,
}

impl TaskSet {
    pub(crate) fn get(&self, id: &TaskId) -> Option<&TaskSlot> {
        self.slots.iter().find(|slot| slot.task.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &TaskId) -> Option<&mut TaskSlot> {
        self.slots.iter_mut().find(|slot| slot.task.id() == id)
    }

    fn next_id(&mut self, file: &UploadFile, admitted_at: &DateTime<Utc>) -> TaskId {
        loop {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            let id = TaskId::derive(file.name(), file.size(), admitted_at, sequence);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    pub(crate) fn snapshot(&self) -> BatchSnapshot {
        let mut snapshot =
            BatchSnapshot::from_tasks(self.slots.iter().map(|slot| slot.task.clone()).collect());
        snapshot.version = self.version;
        snapshot
    }
}

pub(crate) struct Inner {
    pub(crate) config: UploaderConfig,
    pub(crate) validator: Validator,
    pub(crate) storage: Arc<dyn StorageClient>,
    pub(crate) metadata: Arc<dyn MetadataClient>,
    pub(crate) limiter: Option<Arc<Semaphore>>,
    tasks: Mutex<TaskSet>,
    snapshots: watch::Sender<BatchSnapshot>,
}

/// Owner of one upload batch.
///
/// Cloning is cheap and yields another handle on the same batch.
#[derive(Clone)]
pub struct UploadOrchestrator {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl UploadOrchestrator {
    /// Create an orchestrator with an empty batch
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an accepted
    /// type pattern cannot be parsed.
    pub fn new(
        config: UploaderConfig,
        storage: Arc<dyn StorageClient>,
        metadata: Arc<dyn MetadataClient>,
    ) -> Result<Self> {
        config.validate()?;
        let validator = Validator::from_config(&config)?;
        let limiter = config
            .max_concurrent_uploads
            .map(|max| Arc::new(Semaphore::new(max)));
        let (snapshots, _) = watch::channel(BatchSnapshot::default());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                validator,
                storage,
                metadata,
                limiter,
                tasks: Mutex::new(TaskSet::default()),
                snapshots,
            }),
        })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.inner.config
    }

    pub fn validator(&self) -> &Validator {
        &self.inner.validator
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TaskSet> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push the current state to subscribers and release the lock.
    ///
    /// The snapshot is taken under the task lock but sent after it is
    /// dropped, so a subscriber holding a borrow of the channel can still
    /// query the orchestrator. Versions are assigned under the lock; a
    /// snapshot older than the one already in the channel is discarded.
    pub(crate) fn publish(&self, mut set: MutexGuard<'_, TaskSet>) {
        set.version += 1;
        let snapshot = set.snapshot();
        drop(set);

        self.inner.snapshots.send_if_modified(move |current| {
            if snapshot.version > current.version {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    /// Validate and enqueue files.
    ///
    /// Every file becomes a task: accepted files start `pending`, rejected
    /// ones start in `error` with the validation cause. Ids are returned in
    /// input order. No I/O happens here.
    pub fn admit(&self, files: Vec<UploadFile>) -> Vec<TaskId> {
        let admitted_at = Utc::now();
        let mut set = self.lock();
        let mut rejected = 0;

        let ids: Vec<TaskId> = files
            .into_iter()
            .map(|file| {
                let id = set.next_id(&file, &admitted_at);
                let task = match self.inner.validator.validate(&file) {
                    Ok(()) => UploadTask::pending(id.clone(), file, admitted_at),
                    Err(reason) => {
                        warn!("Rejected {} at admission: {}", file.name(), reason);
                        rejected += 1;
                        UploadTask::rejected(id.clone(), file, admitted_at, reason)
                    }
                };
                set.slots.push(TaskSlot {
                    task,
                    cancel: CancellationToken::new(),
                    claimed: false,
                });
                id
            })
            .collect();

        info!(
            "Admitted {} files ({} rejected), batch now holds {} tasks",
            ids.len(),
            rejected,
            set.slots.len()
        );
        self.publish(set);
        ids
    }

    /// Convenience wrapper around [`admit`](Self::admit) for a single file
    pub fn admit_one(&self, file: UploadFile) -> TaskId {
        // admit returns exactly one id per file
        self.admit(vec![file]).remove(0)
    }

    /// Current batch statistics
    pub fn stats(&self) -> BatchStats {
        BatchStats::from_tasks(self.lock().slots.iter().map(|slot| &slot.task))
    }

    /// All tasks in admission order
    pub fn tasks(&self) -> Vec<UploadTask> {
        self.lock()
            .slots
            .iter()
            .map(|slot| slot.task.clone())
            .collect()
    }

    pub fn task(&self, id: &TaskId) -> Option<UploadTask> {
        self.lock().get(id).map(|slot| slot.task.clone())
    }

    /// Tasks and stats taken under one lock
    pub fn snapshot(&self) -> BatchSnapshot {
        self.lock().snapshot()
    }

    /// Receive a new snapshot after every change to the batch
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }
}
