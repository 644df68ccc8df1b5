//! Collaborators performing the actual work of an upload
//!
//! An upload is two calls: a [`StorageClient`] transfers the bytes, then a
//! [`MetadataClient`] creates the backend record pointing at them. Both
//! receive the task's cancellation token; implementations that can abort
//! should watch it, the orchestrator drops the call's future either way.

pub mod fs;
pub mod jsonl;
pub mod memory;
pub mod types;

use crate::error::Result;
use crate::file::UploadFile;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use fs::FsStorage;
pub use jsonl::{JsonlMetadata, StoredRecord};
pub use memory::{MemoryMetadata, MemoryStorage};
pub use types::{Record, StoredObject, TransferProgress, UploadManifest, UploadTarget};

/// Transfers raw file bytes to remote storage
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn upload(
        &self,
        file: &UploadFile,
        target: &UploadTarget,
        progress: &TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<StoredObject>;
}

/// Creates the backend record for stored bytes.
///
/// `Ok(None)` means the backend accepted the call but returned no record;
/// the orchestrator treats it as a failure.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn create_record(
        &self,
        manifest: &UploadManifest,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>>;
}
