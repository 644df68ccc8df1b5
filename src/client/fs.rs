//! Directory-backed storage
//!
//! Objects are written to `<root>/<owner>/<container>/<millis>-<seq>_<name>`,
//! streamed in fixed-size chunks so progress can be reported and a
//! cancellation observed between chunks.

use super::types::{StoredObject, TransferProgress, UploadTarget};
use super::StorageClient;
use crate::error::{Result, UploadError};
use crate::file::{FileSource, UploadFile};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    chunk_size: usize,
    // distinguishes identical names stored within the same millisecond
    sequence: Arc<AtomicU64>,
}

impl FsStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a stored object path
    pub fn resolve(&self, stored: &StoredObject) -> PathBuf {
        self.root.join(&stored.path)
    }

    fn object_path(&self, file: &UploadFile, target: &UploadTarget) -> Result<String> {
        let owner = path_component("owner_id", &target.owner_id)?;
        let container = path_component("container_id", &target.container_id)?;
        let name = file.name().replace(['/', '\\'], "_");

        Ok(format!(
            "{}/{}/{}-{}_{}",
            owner,
            container,
            Utc::now().timestamp_millis(),
            self.sequence.fetch_add(1, Ordering::Relaxed),
            name
        ))
    }

    async fn copy_chunks(
        &self,
        file: &UploadFile,
        out: &mut tokio::fs::File,
        progress: &TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut sent: u64 = 0;

        match file.source() {
            FileSource::Memory(bytes) => {
                for chunk in bytes.chunks(self.chunk_size) {
                    if cancel.is_cancelled() {
                        return Err(UploadError::cancelled("upload"));
                    }
                    out.write_all(chunk).await?;
                    sent += chunk.len() as u64;
                    progress.report(sent);
                }
            }
            FileSource::Path(path) => {
                let mut input = tokio::fs::File::open(path).await?;
                let mut buffer = vec![0u8; self.chunk_size];
                loop {
                    if cancel.is_cancelled() {
                        return Err(UploadError::cancelled("upload"));
                    }
                    let n = input.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    out.write_all(&buffer[..n]).await?;
                    sent += n as u64;
                    progress.report(sent);
                }
            }
        }

        out.flush().await?;
        Ok(())
    }
}

/// An object file that is deleted on drop unless kept
struct PartialObject {
    path: PathBuf,
    keep: bool,
}

impl PartialObject {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialObject {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial object {}", self.path.display()),
            Err(e) => debug!("Failed to remove partial object {}: {}", self.path.display(), e),
        }
    }
}

fn path_component<'a>(parameter: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(UploadError::invalid_parameter(
            parameter,
            format!("Not usable as a path component: {:?}", value),
        ));
    }
    Ok(value)
}

#[async_trait]
impl StorageClient for FsStorage {
    async fn upload(
        &self,
        file: &UploadFile,
        target: &UploadTarget,
        progress: &TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<StoredObject> {
        let stored = StoredObject::new(self.object_path(file, target)?);
        let destination = self.resolve(&stored);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .map_err(|e| {
                UploadError::storage_error("upload", format!("{}: {}", destination.display(), e))
            })?;

        // removes the file unless the copy completes, including when this
        // future is dropped mid-transfer
        let mut partial = PartialObject::new(destination.clone());
        let mut out = opened;
        self.copy_chunks(file, &mut out, progress, cancel).await?;
        drop(out);
        partial.keep();

        debug!("Stored {} at {}", file.name(), destination.display());
        Ok(stored)
    }
}
