//! Record creation backed by a JSON-lines file
//!
//! Each created record is appended as one JSON object per line, holding
//! the record handle and the manifest it was created from.

use super::types::{Record, UploadManifest};
use super::MetadataClient;
use crate::error::{Result, UploadError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One line of the records file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub manifest: UploadManifest,
}

impl StoredRecord {
    pub fn record(&self) -> Record {
        Record::new(self.id.clone(), self.manifest.path.clone()).created_at(self.created_at)
    }
}

#[derive(Debug)]
pub struct JsonlMetadata {
    path: PathBuf,
    // serializes appends from concurrent executions
    write_lock: Mutex<()>,
}

impl JsonlMetadata {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record written so far
    pub async fn records(&self) -> Result<Vec<StoredRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(UploadError::from))
            .collect()
    }
}

fn record_id(manifest: &UploadManifest, created_at: &DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(manifest.container_id.as_bytes());
    hasher.update(manifest.path.as_bytes());
    hasher.update(created_at.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    digest[..12].iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl MetadataClient for JsonlMetadata {
    async fn create_record(
        &self,
        manifest: &UploadManifest,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>> {
        if manifest.path.is_empty() {
            return Err(UploadError::invalid_parameter(
                "path",
                "Manifest path cannot be empty",
            ));
        }

        let created_at = Utc::now();
        let line = StoredRecord {
            id: record_id(manifest, &created_at),
            created_at,
            manifest: manifest.clone(),
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let _guard = self.write_lock.lock().await;
        if cancel.is_cancelled() {
            return Err(UploadError::cancelled("create_record"));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut out = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        out.write_all(json.as_bytes()).await?;
        out.flush().await?;

        Ok(Some(line.record()))
    }
}
