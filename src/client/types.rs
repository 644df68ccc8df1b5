use crate::config::UploaderConfig;
use crate::file::{FileKind, UploadFile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where an upload lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub owner_id: String,
    pub container_id: String,
}

impl UploadTarget {
    pub fn new<O: Into<String>, C: Into<String>>(owner_id: O, container_id: C) -> Self {
        Self {
            owner_id: owner_id.into(),
            container_id: container_id.into(),
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(config.owner_id.clone(), config.container_id.clone())
    }
}

/// Location of bytes accepted by a storage client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
}

impl StoredObject {
    pub fn new<P: Into<String>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

/// Metadata sent to the record-creation call after a successful transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadManifest {
    pub container_id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub kind: FileKind,
    pub mime_type: String,
}

impl UploadManifest {
    pub fn new(file: &UploadFile, target: &UploadTarget, stored: &StoredObject) -> Self {
        Self {
            container_id: target.container_id.clone(),
            name: file.name().to_string(),
            path: stored.path.clone(),
            size: file.size(),
            kind: file.kind(),
            mime_type: file.mime_type().to_string(),
        }
    }

    /// Human-readable size
    pub fn display_size(&self) -> String {
        bytesize::ByteSize::b(self.size).to_string()
    }
}

/// Handle of a backend record created for an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub path: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new<I: Into<String>, P: Into<String>>(id: I, path: P) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            created_at: Utc::now(),
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Byte-level progress reporter handed to storage clients.
///
/// Clients that can observe their transfer call [`report`](Self::report)
/// with the cumulative number of bytes sent. Reporting is optional.
#[derive(Clone)]
pub struct TransferProgress {
    total_bytes: u64,
    on_progress: Option<Arc<dyn Fn(u64) + Send + Sync>>,
}

impl std::fmt::Debug for TransferProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferProgress")
            .field("total_bytes", &self.total_bytes)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl TransferProgress {
    pub fn new<F>(total_bytes: u64, callback: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        Self {
            total_bytes,
            on_progress: Some(Arc::new(callback)),
        }
    }

    /// A reporter that discards updates
    pub fn noop(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            on_progress: None,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn report(&self, bytes_sent: u64) {
        if let Some(ref callback) = self.on_progress {
            callback(bytes_sent.min(self.total_bytes));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_manifest_from_upload() {
        let file = UploadFile::from_bytes("week1.pdf", vec![0u8; 2048]);
        let target = UploadTarget::new("user-1", "subject-7");
        let stored = StoredObject::new("user-1/subject-7/1700000000000_week1.pdf");

        let manifest = UploadManifest::new(&file, &target, &stored);
        assert_eq!(manifest.container_id, "subject-7");
        assert_eq!(manifest.name, "week1.pdf");
        assert_eq!(manifest.path, stored.path);
        assert_eq!(manifest.size, 2048);
        assert_eq!(manifest.kind, FileKind::Pdf);
        assert_eq!(manifest.mime_type, "application/pdf");

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["containerId"], "subject-7");
        assert_eq!(json["mimeType"], "application/pdf");
        assert_eq!(json["kind"], "pdf");
    }

    #[test]
    fn test_target_from_config() {
        let config = UploaderConfig::new().owner_id("u").container_id("c");
        assert_eq!(UploadTarget::from_config(&config), UploadTarget::new("u", "c"));
    }

    #[test]
    fn test_transfer_progress_clamps_to_total() {
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let progress = TransferProgress::new(100, move |bytes| sink.store(bytes, Ordering::SeqCst));

        progress.report(40);
        assert_eq!(seen.load(Ordering::SeqCst), 40);
        progress.report(500);
        assert_eq!(seen.load(Ordering::SeqCst), 100);

        TransferProgress::noop(10).report(5);
    }
}
