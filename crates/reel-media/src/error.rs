//! Error types for planning and encoding.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised while running the encoder.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Encoder produced no output at {0}")]
    EmptyOutput(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Captured stderr tail, when the encoder got far enough to produce one.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::FfmpegFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

/// Errors raised while planning a filter graph.
#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("image segment {segment} references image {index}, but only {available} media file(s) were supplied")]
    ImageIndexOutOfRange {
        segment: usize,
        index: usize,
        available: usize,
    },

    #[error("timeline has no visual segments")]
    NoVisualSegments,

    #[error("no narration source supplied")]
    MissingNarration,

    #[error("input file is missing or unreadable: {0}")]
    MissingInput(PathBuf),
}
