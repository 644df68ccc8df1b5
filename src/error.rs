//! Error handling for the upload orchestrator
//!
//! This module defines the crate-level error type returned by fallible
//! operations, the admission-time validation errors, and the per-task
//! failure causes stored inside a task's `error` state.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UploadError>;

/// Error types returned by the orchestrator and its collaborators
#[derive(Error, Debug)]
pub enum UploadError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Byte transfer to storage failed
    #[error("Storage operation failed: {operation} - {message}")]
    Storage { operation: String, message: String },

    /// Record creation failed
    #[error("Metadata operation failed: {message}")]
    Metadata { message: String },

    /// Operation timed out
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Operation was cancelled
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Executions could not be scheduled or an execution unit died
    #[error("Failed to launch uploads: {message}")]
    Launch { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        UploadError::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage_error(operation: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a new metadata error
    pub fn metadata_error(message: impl Into<String>) -> Self {
        UploadError::Metadata {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        UploadError::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a new cancelled error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        UploadError::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a new launch error
    pub fn launch(message: impl Into<String>) -> Self {
        UploadError::Launch {
            message: message.into(),
        }
    }
}

/// Reasons a file is refused at admission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File {name} is too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("File {name} has an unsupported type: {mime_type}")]
    UnsupportedType { name: String, mime_type: String },
}

/// Why a task ended in the `error` state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// Rejected at admission; no network call was made
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The storage upload failed
    #[error("Transfer failed: {message}")]
    Transfer { message: String },

    /// The bytes were stored but no record was created
    #[error("Record creation failed: {message}")]
    RecordCreation { message: String },

    /// Aborted on caller request
    #[error("Upload cancelled")]
    Cancelled,
}

impl TaskFailure {
    pub fn transfer(message: impl Into<String>) -> Self {
        TaskFailure::Transfer {
            message: message.into(),
        }
    }

    pub fn record_creation(message: impl Into<String>) -> Self {
        TaskFailure::RecordCreation {
            message: message.into(),
        }
    }

    /// Cancellations are deliberate and usually should not be shown as errors
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskFailure::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = UploadError::config_error("bad");
        assert!(matches!(err, UploadError::Config { .. }));

        let err = UploadError::storage_error("upload", "quota exceeded");
        assert!(matches!(err, UploadError::Storage { .. }));

        let err = UploadError::launch("no runtime");
        assert!(matches!(err, UploadError::Launch { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = UploadError::storage_error("upload", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Storage operation failed: upload - quota exceeded"
        );

        let err = ValidationError::FileTooLarge {
            name: "big.pdf".to_string(),
            size: 20,
            max: 10,
        };
        assert_eq!(
            err.to_string(),
            "File big.pdf is too large: 20 bytes exceeds the 10 byte limit"
        );
    }

    #[test]
    fn test_task_failure_cancellation() {
        assert!(TaskFailure::Cancelled.is_cancellation());
        assert!(!TaskFailure::transfer("network").is_cancellation());

        let failure: TaskFailure = ValidationError::UnsupportedType {
            name: "a.exe".to_string(),
            mime_type: "application/x-msdownload".to_string(),
        }
        .into();
        assert!(matches!(failure, TaskFailure::Validation(_)));
        assert_eq!(
            TaskFailure::record_creation("no record returned").to_string(),
            "Record creation failed: no record returned"
        );
    }
}
