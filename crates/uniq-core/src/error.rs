//! Error types for the uniqualization pipeline.
//!
//! Errors are organized by layer: configuration, pipeline stages (decode,
//! probe, transcode, filesystem) and admission control. Every pipeline error
//! classifies into an [`ErrorKind`] so callers can tell "retry later" apart
//! from "this file cannot be processed".

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::governor::JobClass;

/// Top-level error type for uniq operations.
#[derive(Error, Debug)]
pub enum UniqError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Admission control rejected the request
    #[error("Admission denied: {0}")]
    Admission(#[from] AdmissionDenied),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Media could not be read or decoded
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Stream properties could not be determined
    #[error("Probe failed for {path}: {message}")]
    Probe { path: PathBuf, message: String },

    /// A processing stage (transcoder, encoder) failed
    #[error("{stage} failed: {message}")]
    Engine { stage: String, message: String },

    /// A stage exceeded its wall-clock budget
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Metadata could not be read, written or stripped
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Filesystem failure
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported media format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } | Self::ImageTooLarge { .. } | Self::Metadata { .. } => {
                ErrorKind::Decode
            }
            Self::Probe { .. } => ErrorKind::Probe,
            Self::Engine { .. } | Self::Timeout { .. } => ErrorKind::Engine,
            Self::Io { .. } => ErrorKind::Io,
            Self::FileTooLarge { .. } | Self::UnsupportedFormat { .. } | Self::FileNotFound(_) => {
                ErrorKind::Input
            }
        }
    }
}

/// Admission control rejections. These mean "try again later", never
/// "the content is bad".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDenied {
    /// Caller exceeded the sliding-window request budget
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Caller is under a temporary flood ban
    #[error("Temporarily banned for flooding, retry in {retry_after_secs}s")]
    Banned { retry_after_secs: u64 },

    /// No slot became free in the pool within the admission timeout
    #[error("{class} pool saturated after waiting {waited_ms}ms")]
    PoolSaturated { class: JobClass, waited_ms: u64 },

    /// The pool has been shut down
    #[error("{0} pool is closed")]
    PoolClosed(JobClass),
}

impl AdmissionDenied {
    /// Seconds the caller should wait before retrying, if known.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } | Self::Banned { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            Self::PoolSaturated { .. } | Self::PoolClosed(_) => None,
        }
    }
}

/// Coarse failure classification reported per variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Probe,
    Engine,
    AdmissionDenied,
    Io,
    Input,
}

/// Failure of a single media job, either at admission or while running.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Admission(#[from] AdmissionDenied),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Admission(_) => ErrorKind::AdmissionDenied,
            Self::Pipeline(e) => e.kind(),
        }
    }
}

/// Truncate a diagnostic to at most `max_chars` characters, keeping the tail.
///
/// Transcoder diagnostics put the actual failure at the end, so the head is
/// what gets dropped. The cut always lands on a char boundary.
pub fn truncate_tail(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let skip = count - max_chars;
    let tail: String = text.chars().skip(skip).collect();
    format!("…{}", tail)
}

/// Convenience type alias for uniq results.
pub type Result<T> = std::result::Result<T, UniqError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_tail_short_text_unchanged() {
        assert_eq!(truncate_tail("  boom \n", 500), "boom");
    }

    #[test]
    fn test_truncate_tail_keeps_end() {
        let long = format!("{}Conversion failed!", "x".repeat(1000));
        let cut = truncate_tail(&long, 20);
        assert!(cut.ends_with("Conversion failed!"));
        assert_eq!(cut.chars().count(), 21);
    }

    #[test]
    fn test_truncate_tail_multibyte_boundary() {
        let text = "ошибка".repeat(200);
        let cut = truncate_tail(&text, 7);
        assert_eq!(cut.chars().count(), 8);
    }

    #[test]
    fn test_timeout_is_engine_failure() {
        let err = PipelineError::Timeout {
            stage: "transcode".into(),
            timeout_ms: 600_000,
        };
        assert_eq!(err.kind(), ErrorKind::Engine);
    }

    #[test]
    fn test_admission_classification() {
        let err: JobError = AdmissionDenied::RateLimited {
            retry_after_secs: 5,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::AdmissionDenied);
    }

    #[test]
    fn test_retry_after() {
        let denied = AdmissionDenied::Banned {
            retry_after_secs: 120,
        };
        assert_eq!(denied.retry_after_secs(), Some(120));
        assert_eq!(
            AdmissionDenied::PoolClosed(JobClass::Video).retry_after_secs(),
            None
        );
    }
}
