//! In-memory collaborators
//!
//! Scriptable stand-ins for a remote backend: failures, missing records
//! and latency can be configured per file name. Used by the test suite and
//! for wiring an orchestrator without any backend.

use super::types::{Record, StoredObject, TransferProgress, UploadManifest, UploadTarget};
use super::{MetadataClient, StorageClient};
use crate::error::{Result, UploadError};
use crate::file::UploadFile;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Waits out `delay` unless cancelled first
async fn simulate_latency(
    delay: Option<Duration>,
    cancel: &CancellationToken,
    operation: &str,
) -> Result<()> {
    let Some(delay) = delay else {
        return Ok(());
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(UploadError::cancelled(operation)),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, String>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads of `name` fail with `message`
    pub fn fail_for<N: Into<String>, M: Into<String>>(self, name: N, message: M) -> Self {
        lock(&self.failures).insert(name.into(), message.into());
        self
    }

    /// Delay uploads of `name`
    pub fn delay_for<N: Into<String>>(self, name: N, delay: Duration) -> Self {
        lock(&self.delays).insert(name.into(), delay);
        self
    }

    /// Delay every upload without a specific delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Number of upload calls received
    pub fn upload_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths of stored objects, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = lock(&self.objects).keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(path).cloned()
    }
}

#[async_trait]
impl StorageClient for MemoryStorage {
    async fn upload(
        &self,
        file: &UploadFile,
        target: &UploadTarget,
        progress: &TransferProgress,
        cancel: &CancellationToken,
    ) -> Result<StoredObject> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.delays)
            .get(file.name())
            .copied()
            .or(self.default_delay);
        simulate_latency(delay, cancel, "upload").await?;

        if let Some(message) = lock(&self.failures).get(file.name()).cloned() {
            return Err(UploadError::storage_error("upload", message));
        }

        let bytes = file.read_all().await?;
        progress.report(bytes.len() as u64 / 2);

        let path = format!(
            "{}/{}/{}_{}",
            target.owner_id,
            target.container_id,
            call,
            file.name()
        );
        progress.report(bytes.len() as u64);
        lock(&self.objects).insert(path.clone(), bytes);

        Ok(StoredObject::new(path))
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetadata {
    records: Mutex<Vec<(Record, UploadManifest)>>,
    failures: Mutex<HashMap<String, String>>,
    missing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make record creation for `name` fail with `message`
    pub fn fail_for<N: Into<String>, M: Into<String>>(self, name: N, message: M) -> Self {
        lock(&self.failures).insert(name.into(), message.into());
        self
    }

    /// Make record creation for `name` succeed without returning a record
    pub fn no_record_for<N: Into<String>>(self, name: N) -> Self {
        lock(&self.missing).insert(name.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of create_record calls received
    pub fn create_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Manifests that produced a record, in creation order
    pub fn manifests(&self) -> Vec<UploadManifest> {
        lock(&self.records)
            .iter()
            .map(|(_, manifest)| manifest.clone())
            .collect()
    }
}

#[async_trait]
impl MetadataClient for MemoryMetadata {
    async fn create_record(
        &self,
        manifest: &UploadManifest,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        simulate_latency(self.delay, cancel, "create_record").await?;

        if let Some(message) = lock(&self.failures).get(&manifest.name).cloned() {
            return Err(UploadError::metadata_error(message));
        }

        if lock(&self.missing).contains(&manifest.name) {
            return Ok(None);
        }

        let record = Record::new(format!("rec-{}", call), manifest.path.clone());
        lock(&self.records).push((record.clone(), manifest.clone()));
        Ok(Some(record))
    }
}
