//! Source files handed to the orchestrator
//!
//! An [`UploadFile`] is an opaque, cheaply clonable handle on the bytes of
//! one user-selected file together with the facts the validator and the
//! manifest need: name, size and MIME type.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the bytes of an [`UploadFile`] live
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

/// Coarse content category sent along with the manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Video,
    Audio,
    Document,
    Text,
    #[default]
    Other,
}

impl FileKind {
    /// Classify a MIME type
    pub fn from_mime(mime_type: &str) -> Self {
        let mime_type = mime_type.to_ascii_lowercase();
        let (top, sub) = mime_type.split_once('/').unwrap_or((mime_type.as_str(), ""));

        match top {
            "image" => FileKind::Image,
            "video" => FileKind::Video,
            "audio" => FileKind::Audio,
            "text" => FileKind::Text,
            "application" if sub == "pdf" => FileKind::Pdf,
            "application"
                if sub == "msword"
                    || sub == "rtf"
                    || sub.starts_with("vnd.ms-")
                    || sub.starts_with("vnd.openxmlformats-officedocument")
                    || sub.starts_with("vnd.oasis.opendocument") =>
            {
                FileKind::Document
            }
            _ => FileKind::Other,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Pdf => write!(f, "pdf"),
            FileKind::Image => write!(f, "image"),
            FileKind::Video => write!(f, "video"),
            FileKind::Audio => write!(f, "audio"),
            FileKind::Document => write!(f, "document"),
            FileKind::Text => write!(f, "text"),
            FileKind::Other => write!(f, "other"),
        }
    }
}

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    mime_type: String,
    source: FileSource,
}

impl UploadFile {
    /// Wrap in-memory bytes
    pub fn from_bytes<N, B>(name: N, bytes: B) -> Self
    where
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let name = name.into();
        let bytes: Arc<[u8]> = Arc::from(bytes.into());
        Self {
            mime_type: guess_mime_type(&name),
            size: bytes.len() as u64,
            name,
            source: FileSource::Memory(bytes),
        }
    }

    /// Reference a file on disk; only its metadata is read here
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(crate::error::UploadError::invalid_parameter(
                "path",
                format!("Not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            mime_type: guess_mime_type(&name),
            size: metadata.len(),
            name,
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Override the guessed MIME type
    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.mime_type)
    }

    /// Lowercased extension without the dot, if any
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Human-readable size
    pub fn display_size(&self) -> String {
        bytesize::ByteSize::b(self.size).to_string()
    }

    /// Load the whole content
    pub async fn read_all(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
        }
    }
}

fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}
