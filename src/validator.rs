//! Admission policy
//!
//! The validator is a pure check run once per file at admission time.
//! Size is checked before type.

use crate::config::UploaderConfig;
use crate::error::ValidationError;
use crate::file::UploadFile;
use std::fmt;
use std::str::FromStr;

/// One entry of the accepted-types list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptPattern {
    /// `*` or `*/*`
    Any,
    /// `image/*`
    MimePrefix(String),
    /// `application/pdf`
    Mime(String),
    /// `.pdf`, stored without the dot
    Extension(String),
}

impl AcceptPattern {
    pub fn matches(&self, file: &UploadFile) -> bool {
        match self {
            AcceptPattern::Any => true,
            AcceptPattern::MimePrefix(prefix) => file
                .mime_type()
                .to_ascii_lowercase()
                .split_once('/')
                .map(|(top, _)| top == prefix)
                .unwrap_or(false),
            AcceptPattern::Mime(mime) => file.mime_type().eq_ignore_ascii_case(mime),
            AcceptPattern::Extension(ext) => file.extension().as_deref() == Some(ext.as_str()),
        }
    }
}

impl FromStr for AcceptPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() {
            return Err("Empty pattern".to_string());
        }

        if s == "*" || s == "*/*" {
            return Ok(AcceptPattern::Any);
        }

        if let Some(ext) = s.strip_prefix('.') {
            if ext.is_empty() {
                return Err(format!("Missing extension in pattern {:?}", s));
            }
            return Ok(AcceptPattern::Extension(ext.to_string()));
        }

        match s.split_once('/') {
            Some((top, "*")) if !top.is_empty() => Ok(AcceptPattern::MimePrefix(top.to_string())),
            Some((top, sub)) if !top.is_empty() && !sub.is_empty() => Ok(AcceptPattern::Mime(s)),
            _ => Err(format!("Unrecognized accept pattern {:?}", s)),
        }
    }
}

impl fmt::Display for AcceptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceptPattern::Any => write!(f, "*"),
            AcceptPattern::MimePrefix(prefix) => write!(f, "{}/*", prefix),
            AcceptPattern::Mime(mime) => write!(f, "{}", mime),
            AcceptPattern::Extension(ext) => write!(f, ".{}", ext),
        }
    }
}

/// Size and type policy applied to every candidate file
#[derive(Debug, Clone)]
pub struct Validator {
    max_file_size: u64,
    accepted: Vec<AcceptPattern>,
}

impl Validator {
    /// Build a validator; an empty pattern list accepts every type
    pub fn new(max_file_size: u64, accepted: Vec<AcceptPattern>) -> Self {
        Self {
            max_file_size,
            accepted,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> crate::error::Result<Self> {
        let accepted = config
            .accepted_kinds
            .iter()
            .map(|kind| kind.parse::<AcceptPattern>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(crate::error::UploadError::config_error)?;

        Ok(Self::new(config.max_file_size, accepted))
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn accepted(&self) -> &[AcceptPattern] {
        &self.accepted
    }

    pub fn validate(&self, file: &UploadFile) -> Result<(), ValidationError> {
        if file.size() > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                name: file.name().to_string(),
                size: file.size(),
                max: self.max_file_size,
            });
        }

        if !self.accepted.is_empty() && !self.accepted.iter().any(|p| p.matches(file)) {
            return Err(ValidationError::UnsupportedType {
                name: file.name().to_string(),
                mime_type: file.mime_type().to_string(),
            });
        }

        Ok(())
    }
}
