//! Output encoding profiles.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF for reels
pub const DEFAULT_CRF: u8 = 23;
/// Moves the moov atom to the front so players can start before the download ends
pub const FASTSTART_MOVFLAGS: &str = "+faststart";

/// Named encode profile selected per request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CodecProfile {
    /// Social reels (H.264 CRF 23, preset fast)
    #[default]
    Reels,
    /// Higher-quality export (H.264 CRF 18, preset medium, 192k audio)
    Pro,
}

impl CodecProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodecProfile::Reels => "reels",
            CodecProfile::Pro => "pro",
        }
    }

    /// Encoder settings for this profile.
    pub fn encoding(&self) -> EncodingConfig {
        match self {
            CodecProfile::Reels => EncodingConfig::default(),
            CodecProfile::Pro => EncodingConfig {
                crf: 18,
                preset: "medium".to_string(),
                audio_bitrate: Some("192k".to_string()),
                ..EncodingConfig::default()
            },
        }
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecProfileParseError(pub String);

impl fmt::Display for CodecProfileParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown codec profile: {}", self.0)
    }
}

impl std::error::Error for CodecProfileParseError {}

impl FromStr for CodecProfile {
    type Err = CodecProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "reels" | "reel" => Ok(CodecProfile::Reels),
            "pro" => Ok(CodecProfile::Pro),
            _ => Err(CodecProfileParseError(s.to_string())),
        }
    }
}

/// Video/audio encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    pub codec: String,
    pub pixel_format: String,
    pub preset: String,
    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,
    pub audio_codec: String,
    /// Audio bitrate; encoder default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movflags: Option<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: None,
            movflags: Some(FASTSTART_MOVFLAGS.to_string()),
        }
    }
}

impl EncodingConfig {
    /// Video codec arguments.
    pub fn video_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
        ]
    }

    /// Audio codec arguments, only meaningful when audio is mapped.
    pub fn audio_args(&self) -> Vec<String> {
        let mut args = vec!["-c:a".to_string(), self.audio_codec.clone()];
        if let Some(bitrate) = &self.audio_bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate.clone());
        }
        args
    }

    /// Container arguments.
    pub fn container_args(&self) -> Vec<String> {
        match &self.movflags {
            Some(flags) => vec!["-movflags".to_string(), flags.clone()],
            None => Vec::new(),
        }
    }
}
