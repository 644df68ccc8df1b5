//! Batch-level progress statistics
//!
//! Stats are never stored: they are recomputed from the task set whenever
//! someone asks, so they cannot drift from the tasks they describe.

use crate::task::{TaskStatus, UploadTask};
use bytesize::ByteSize;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub pending: usize,
    pub uploading: usize,
    pub processing: usize,
    pub completed: usize,
    /// Tasks in the `error` state, cancellations included
    pub failed: usize,
    /// Subset of `failed` that was cancelled by the caller
    pub cancelled: usize,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    /// Overall progress in percent, 0 when there are no bytes to send
    pub percent: f64,
}

impl BatchStats {
    pub fn from_tasks<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a UploadTask>,
    {
        let mut stats = BatchStats::default();

        for task in tasks {
            stats.total += 1;
            match task.status() {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Uploading => stats.uploading += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Error => {
                    stats.failed += 1;
                    if task.error().is_some_and(|e| e.is_cancellation()) {
                        stats.cancelled += 1;
                    }
                }
            }
            stats.total_bytes += task.file().size();
            stats.transferred_bytes += task.transferred_bytes();
        }

        if stats.total_bytes > 0 {
            stats.percent = stats.transferred_bytes as f64 * 100.0 / stats.total_bytes as f64;
        }

        stats
    }

    /// Tasks that have not reached a terminal state
    pub fn active(&self) -> usize {
        self.pending + self.uploading + self.processing
    }

    pub fn is_finished(&self) -> bool {
        self.active() == 0
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files | {} pending | {} uploading | {} processing | {} completed | {} failed | {} of {} ({:.0}%)",
            self.total,
            self.pending,
            self.uploading,
            self.processing,
            self.completed,
            self.failed,
            ByteSize::b(self.transferred_bytes),
            ByteSize::b(self.total_bytes),
            self.percent
        )
    }
}

/// Consistent view of the whole batch at one instant
#[derive(Debug, Clone, Default)]
pub struct BatchSnapshot {
    pub tasks: Vec<UploadTask>,
    pub stats: BatchStats,
    /// Change counter of the batch; a later change has a larger version
    pub version: u64,
}

impl BatchSnapshot {
    pub fn from_tasks(tasks: Vec<UploadTask>) -> Self {
        let stats = BatchStats::from_tasks(&tasks);
        Self {
            tasks,
            stats,
            version: 0,
        }
    }
}
