//! The per-file state machine
//!
//! ```text
//! pending -> uploading -> processing -> completed
//!    |           |             |
//!    +-----------+-------------+------> error
//! ```
//!
//! `completed` and `error` are terminal. Every mutation of a task goes
//! through [`UploadTask::transition`], which rejects anything else.

use super::types::{
    TaskId, TaskState, TaskStatus, PROGRESS_DONE, PROGRESS_STARTED, PROGRESS_STORED,
};
use crate::client::Record;
use crate::error::{TaskFailure, ValidationError};
use crate::file::UploadFile;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid task transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// One file's journey from admission to a terminal state
#[derive(Debug, Clone)]
pub struct UploadTask {
    id: TaskId,
    file: UploadFile,
    progress: u8,
    admitted_at: DateTime<Utc>,
    state: TaskState,
}

impl UploadTask {
    /// A task that passed validation
    pub fn pending(id: TaskId, file: UploadFile, admitted_at: DateTime<Utc>) -> Self {
        Self {
            id,
            file,
            progress: 0,
            admitted_at,
            state: TaskState::Pending,
        }
    }

    /// A task refused at admission
    pub fn rejected(
        id: TaskId,
        file: UploadFile,
        admitted_at: DateTime<Utc>,
        reason: ValidationError,
    ) -> Self {
        Self {
            id,
            file,
            progress: 0,
            admitted_at,
            state: TaskState::Failed(TaskFailure::Validation(reason)),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Set only in the `error` state
    pub fn error(&self) -> Option<&TaskFailure> {
        match &self.state {
            TaskState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Set only in the `completed` state
    pub fn result(&self) -> Option<&Record> {
        match &self.state {
            TaskState::Completed(record) => Some(record),
            _ => None,
        }
    }

    /// Bytes of this file counted as transferred
    pub fn transferred_bytes(&self) -> u64 {
        (self.file.size() as u128 * self.progress as u128 / 100) as u64
    }

    /// Apply a state change, adjusting progress to the matching checkpoint
    pub fn transition(&mut self, next: TaskState) -> Result<(), InvalidTransition> {
        let from = self.status();
        let to = next.status();

        let allowed = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::Uploading)
                | (TaskStatus::Uploading, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
        ) || (!from.is_terminal() && to == TaskStatus::Error);

        if !allowed {
            return Err(InvalidTransition { from, to });
        }

        match to {
            TaskStatus::Uploading => self.progress = self.progress.max(PROGRESS_STARTED),
            TaskStatus::Processing => self.progress = self.progress.max(PROGRESS_STORED),
            TaskStatus::Completed => self.progress = PROGRESS_DONE,
            _ => {}
        }

        self.state = next;
        Ok(())
    }

    /// Raise progress while in flight; never lowers it and never reaches 100
    pub fn advance_progress(&mut self, percent: u8) -> bool {
        if !matches!(self.status(), TaskStatus::Uploading | TaskStatus::Processing) {
            return false;
        }

        let percent = percent.min(PROGRESS_DONE - 1);
        if percent <= self.progress {
            return false;
        }

        self.progress = percent;
        true
    }
}
