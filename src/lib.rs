pub mod client;
pub mod config;
pub mod error;
pub mod file;

pub mod orchestrator;
pub mod stats;
pub mod task;
pub mod validator;

// Collaborators and the data passed to them
pub use client::{
    FsStorage, JsonlMetadata, MemoryMetadata, MemoryStorage, MetadataClient, Record,
    StorageClient, StoredObject, StoredRecord, TransferProgress, UploadManifest, UploadTarget,
};

pub use config::{UploaderConfig, DEFAULT_ACCEPTED_KINDS, DEFAULT_MAX_FILE_SIZE};

pub use error::{Result, TaskFailure, UploadError, ValidationError};

pub use file::{FileKind, FileSource, UploadFile};

pub use orchestrator::{RunSummary, UploadOrchestrator};

pub use stats::{BatchSnapshot, BatchStats};

pub use task::{TaskId, TaskState, TaskStatus, UploadTask};

pub use validator::{AcceptPattern, Validator};
