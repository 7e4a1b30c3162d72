//! Compile error taxonomy.

use reel_assets::AssetError;
use reel_media::{MediaError, PlanError};
use reel_models::DecodeError;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Discriminant reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    AssetNarration,
    AssetMusic,
    Plan,
    Encoder,
    Io,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::AssetNarration => "asset.narration",
            ErrorKind::AssetMusic => "asset.music",
            ErrorKind::Plan => "plan",
            ErrorKind::Encoder => "encoder",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Invalid timeline: {0}")]
    Decode(#[from] DecodeError),

    #[error("Narration failed: {0}")]
    Narration(AssetError),

    #[error("Music failed: {0}")]
    Music(AssetError),

    #[error("Plan failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Encoder failed: {0}")]
    Encoder(MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compile cancelled")]
    Cancelled,
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Decode(_) => ErrorKind::Decode,
            CompileError::Narration(_) => ErrorKind::AssetNarration,
            CompileError::Music(_) => ErrorKind::AssetMusic,
            CompileError::Plan(_) => ErrorKind::Plan,
            CompileError::Encoder(_) => ErrorKind::Encoder,
            CompileError::Io(_) => ErrorKind::Io,
            CompileError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Bounded encoder stderr, for encoder failures only.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CompileError::Encoder(e) => e.diagnostics(),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompileError::Narration(e) | CompileError::Music(e) => e.is_retryable(),
            CompileError::Encoder(MediaError::Timeout(_)) => true,
            _ => false,
        }
    }

    /// Map an encoder failure, keeping cancellation distinct.
    pub fn from_encoder(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => CompileError::Cancelled,
            other => CompileError::Encoder(other),
        }
    }

    /// Map a narration failure, keeping cancellation distinct.
    pub fn from_narration(err: AssetError) -> Self {
        match err {
            AssetError::Media(MediaError::Cancelled) => CompileError::Cancelled,
            other => CompileError::Narration(other),
        }
    }

    /// Map a music failure, keeping cancellation distinct.
    pub fn from_music(err: AssetError) -> Self {
        match err {
            AssetError::Media(MediaError::Cancelled) => CompileError::Cancelled,
            other => CompileError::Music(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            CompileError::from(PlanError::NoVisualSegments).kind().as_str(),
            "plan"
        );
        assert_eq!(
            CompileError::from_narration(AssetError::NothingToSay).kind().as_str(),
            "asset.narration"
        );
        assert_eq!(
            CompileError::from_music(AssetError::EmptyGenre("jazz".into())).kind().as_str(),
            "asset.music"
        );
        assert_eq!(CompileError::Cancelled.kind().to_string(), "cancelled");
    }

    #[test]
    fn test_encoder_cancel_maps_to_cancelled() {
        let err = CompileError::from_encoder(MediaError::Cancelled);
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let err = CompileError::from_music(AssetError::Media(MediaError::Cancelled));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_encoder_diagnostics() {
        let err = CompileError::from_encoder(MediaError::ffmpeg_failed(
            "exit 1",
            Some("Invalid filter".to_string()),
            Some(1),
        ));
        assert_eq!(err.kind(), ErrorKind::Encoder);
        assert_eq!(err.diagnostics(), Some("Invalid filter"));
        assert!(CompileError::Cancelled.diagnostics().is_none());
    }
}
