//! Upload tasks
//!
//! A task is one file's upload lifecycle record. Tasks are created by the
//! orchestrator at admission and mutated only by it.

pub mod state;
pub mod types;

pub use state::{InvalidTransition, UploadTask};
pub use types::{
    TaskId, TaskState, TaskStatus, PROGRESS_DONE, PROGRESS_STARTED, PROGRESS_STORED,
};
