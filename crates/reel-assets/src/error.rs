//! Asset resolution error types.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::MediaError;
use thiserror::Error;

pub type AssetResult<T> = Result<T, AssetError>;

/// Longest upstream response body kept in an error.
pub const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("nothing to narrate: every text segment is empty")]
    NothingToSay,

    #[error("unknown music genre: {0}")]
    UnknownGenre(String),

    #[error("music genre {0} has no clips")]
    EmptyGenre(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("media file not found: {0}")]
    MediaMissing(PathBuf),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder error: {0}")]
    Media(#[from] MediaError),
}

impl AssetError {
    /// Upstream error with the body cut to a bounded length.
    pub fn upstream(status: u16, body: &str) -> Self {
        let mut end = body.len().min(MAX_ERROR_BODY);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        Self::Upstream {
            status,
            body: body[..end].to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AssetError::Network(_) | AssetError::Timeout(_) => true,
            AssetError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
