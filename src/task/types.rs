use crate::client::Record;
use crate::error::TaskFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};

/// Progress recorded when a task is picked for execution
pub const PROGRESS_STARTED: u8 = 10;
/// Progress recorded once the bytes are stored but no record exists yet
pub const PROGRESS_STORED: u8 = 60;
/// Progress of a completed task
pub const PROGRESS_DONE: u8 = 100;

/// Identifier of a task within one orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Derive an id from the file identity and its admission instant.
    ///
    /// `sequence` is the orchestrator's admission counter, so two identical
    /// files admitted within the same clock tick still get distinct ids.
    pub fn derive(name: &str, size: u64, admitted_at: &DateTime<Utc>, sequence: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(size.to_le_bytes());
        hasher.update(
            admitted_at
                .timestamp_nanos_opt()
                .unwrap_or_else(|| admitted_at.timestamp_micros())
                .to_le_bytes(),
        );
        hasher.update(sequence.to_le_bytes());
        let digest = hasher.finalize();

        TaskId(digest[..8].iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Status of a task, without the payload of terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Uploading => write!(f, "uploading"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// State of a task; terminal states carry their outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Uploading,
    Processing,
    Completed(Record),
    Failed(TaskFailure),
}

impl TaskState {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Uploading => TaskStatus::Uploading,
            TaskState::Processing => TaskStatus::Processing,
            TaskState::Completed(_) => TaskStatus::Completed,
            TaskState::Failed(_) => TaskStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_id_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let a = TaskId::derive("notes.pdf", 1024, &at, 0);
        let b = TaskId::derive("notes.pdf", 1024, &at, 0);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_task_id_distinguishes_readmission() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let first = TaskId::derive("notes.pdf", 1024, &at, 0);
        assert_ne!(first, TaskId::derive("notes.pdf", 1024, &at, 1));
        assert_ne!(first, TaskId::derive("notes.pdf", 1025, &at, 0));
        assert_ne!(
            first,
            TaskId::derive("notes.pdf", 1024, &(at + chrono::Duration::seconds(1)), 0)
        );
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Uploading.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert_eq!(TaskStatus::Processing.to_string(), "processing");
        assert_eq!(
            TaskState::Failed(TaskFailure::Cancelled).status(),
            TaskStatus::Error
        );
    }
}
