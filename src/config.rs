//! Configuration for an upload session

use crate::error::{Result, UploadError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default per-file size limit (50 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Types accepted when no explicit list is configured
pub const DEFAULT_ACCEPTED_KINDS: &[&str] = &[
    "application/pdf",
    "image/*",
    "video/*",
    "audio/*",
    "text/*",
    ".doc",
    ".docx",
    ".ppt",
    ".pptx",
    ".xls",
    ".xlsx",
];

/// Configuration for an [`UploadOrchestrator`](crate::UploadOrchestrator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Largest file admitted, in bytes (default: 50 MiB)
    #[serde(rename = "max-file-size")]
    pub max_file_size: u64,

    /// Accepted MIME types, MIME wildcards (`image/*`) and extensions (`.pdf`).
    /// An empty list accepts everything.
    #[serde(rename = "accepted-kinds")]
    pub accepted_kinds: Vec<String>,

    /// Upper bound on concurrent executions (default: unbounded)
    #[serde(rename = "max-concurrent-uploads", skip_serializing_if = "Option::is_none")]
    pub max_concurrent_uploads: Option<usize>,

    /// Owner of the uploaded objects, usually the signed-in user
    #[serde(rename = "owner-id")]
    pub owner_id: String,

    /// Container the files are attached to, e.g. a subject
    #[serde(rename = "container-id")]
    pub container_id: String,

    /// Timeout applied to each collaborator call, in seconds (default: none)
    #[serde(rename = "call-timeout", skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_kinds: DEFAULT_ACCEPTED_KINDS
                .iter()
                .map(|kind| kind.to_string())
                .collect(),
            max_concurrent_uploads: None,
            owner_id: String::new(),
            container_id: String::new(),
            call_timeout_secs: None,
        }
    }
}

impl UploaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum file size in bytes
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Replace the accepted type list
    pub fn accepted_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Add one accepted type pattern
    pub fn accept<S: Into<String>>(mut self, kind: S) -> Self {
        self.accepted_kinds.push(kind.into());
        self
    }

    /// Bound the number of concurrent executions
    pub fn max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = Some(max);
        self
    }

    /// Set the owner of uploaded objects
    pub fn owner_id<S: Into<String>>(mut self, owner_id: S) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Set the container the files are attached to
    pub fn container_id<S: Into<String>>(mut self, container_id: S) -> Self {
        self.container_id = container_id.into();
        self
    }

    /// Set the per-call timeout in seconds
    pub fn call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = Some(secs);
        self
    }

    pub fn call_timeout_duration(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(UploadError::invalid_parameter(
                "max_file_size",
                "Maximum file size must be greater than 0",
            ));
        }

        if self.max_concurrent_uploads == Some(0) {
            return Err(UploadError::invalid_parameter(
                "max_concurrent_uploads",
                "Concurrency limit must be greater than 0",
            ));
        }

        if self.call_timeout_secs == Some(0) {
            return Err(UploadError::invalid_parameter(
                "call_timeout",
                "Timeout must be greater than 0",
            ));
        }

        if let Some(kind) = self.accepted_kinds.iter().find(|k| k.trim().is_empty()) {
            return Err(UploadError::config_error(format!(
                "Empty accepted kind pattern: {:?}",
                kind
            )));
        }

        Ok(())
    }

    /// Convert the configuration to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(UploadError::from)
    }

    /// Create a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(UploadError::from)
    }

    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
