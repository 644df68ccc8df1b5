//! Caller-driven lifecycle operations: cancel, remove, clear, resubmit
//!
//! Tasks leave the batch only through these calls. Cancelling signals the
//! task's token, which aborts its in-flight collaborator call and keeps any
//! late result from committing.

use super::{TaskSet, UploadOrchestrator};
use crate::error::TaskFailure;
use crate::task::{TaskId, TaskState, TaskStatus, UploadTask};
use log::{debug, info};

impl TaskSet {
    /// Cancel a non-terminal slot in place; false if already terminal
    fn cancel_slot(&mut self, id: &TaskId) -> bool {
        let Some(slot) = self.get_mut(id) else {
            return false;
        };

        if slot.task.is_terminal() {
            return false;
        }

        slot.cancel.cancel();
        slot.task
            .transition(TaskState::Failed(TaskFailure::Cancelled))
            .is_ok()
    }
}

impl UploadOrchestrator {
    /// Cancel a task that has not finished.
    ///
    /// The task moves to `error` with a cancellation cause right away; an
    /// in-flight execution is told to stop and its result is discarded.
    /// Returns false for unknown ids and for tasks already terminal.
    pub fn cancel(&self, id: &TaskId) -> bool {
        let mut set = self.lock();
        let cancelled = set.cancel_slot(id);
        if cancelled {
            info!("Cancelled task {}", id);
            self.publish(set);
        }
        cancelled
    }

    /// Cancel every task that has not finished; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let mut set = self.lock();
        let active: Vec<TaskId> = set
            .slots
            .iter()
            .filter(|slot| !slot.task.is_terminal())
            .map(|slot| slot.task.id().clone())
            .collect();

        let cancelled = active.iter().filter(|id| set.cancel_slot(id)).count();
        if cancelled > 0 {
            info!("Cancelled {} tasks", cancelled);
            self.publish(set);
        }
        cancelled
    }

    /// Cancel the task if needed, then drop it from the batch
    pub fn remove(&self, id: &TaskId) -> Option<UploadTask> {
        let mut set = self.lock();
        set.cancel_slot(id);

        let index = set.slots.iter().position(|slot| slot.task.id() == id)?;
        let slot = set.slots.remove(index);
        debug!("Removed task {} ({})", id, slot.task.file().name());
        self.publish(set);
        Some(slot.task)
    }

    /// Drop every `completed` and `error` task; returns how many were dropped
    pub fn clear_completed(&self) -> usize {
        let mut set = self.lock();
        let before = set.slots.len();
        set.slots.retain(|slot| !slot.task.is_terminal());
        let removed = before - set.slots.len();

        if removed > 0 {
            info!("Cleared {} finished tasks", removed);
            self.publish(set);
        }
        removed
    }

    /// Cancel everything still running and empty the batch.
    ///
    /// In-flight executions are detached rather than awaited: their tokens
    /// are cancelled and their ids are gone, so nothing they return can be
    /// committed. Safe to call repeatedly.
    pub fn clear_all(&self) -> usize {
        let mut set = self.lock();
        for slot in &set.slots {
            slot.cancel.cancel();
        }
        let removed = set.slots.len();
        set.slots.clear();

        if removed > 0 {
            info!("Cleared all {} tasks", removed);
        }
        self.publish(set);
        removed
    }

    /// Admit the file of a failed task again as a new task.
    ///
    /// The failed task is left as it is. Returns `None` unless `id` names a
    /// task in the `error` state.
    pub fn resubmit(&self, id: &TaskId) -> Option<TaskId> {
        let file = {
            let set = self.lock();
            let slot = set.get(id)?;
            if slot.task.status() != TaskStatus::Error {
                return None;
            }
            slot.task.file().clone()
        };

        let new_id = self.admit_one(file);
        info!("Resubmitted task {} as {}", id, new_id);
        Some(new_id)
    }
}
