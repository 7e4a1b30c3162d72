//! Narration synthesis.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reel_models::AssetHandle;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AssetError, AssetResult};
use crate::http::{ensure_success, stream_to_file, with_retry};

/// File name of the synthesised narration inside the request directory.
pub const NARRATION_FILE: &str = "narration.mp3";

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL_ID: &str = "eleven_monolingual_v1";

/// Text-to-speech collaborator.
#[async_trait]
pub trait VoiceOver: Send + Sync {
    /// Synthesise `segments` as one narration file under `dest_dir`.
    async fn generate_voice_over(
        &self,
        segments: &[String],
        dest_dir: &Path,
    ) -> AssetResult<AssetHandle>;
}

/// Join non-blank segments into a single utterance.
pub fn build_utterance(segments: &[String]) -> Option<String> {
    let parts: Vec<&str> = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// ElevenLabs client configuration.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl VoiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ELEVENLABS_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            voice_id: std::env::var("ELEVENLABS_VOICE_ID").unwrap_or(defaults.voice_id),
            model_id: std::env::var("ELEVENLABS_MODEL_ID").unwrap_or(defaults.model_id),
            stability: std::env::var("ELEVENLABS_STABILITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stability),
            similarity_boost: defaults.similarity_boost,
            timeout: Duration::from_secs(
                std::env::var("ELEVENLABS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("ELEVENLABS_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

/// ElevenLabs text-to-speech.
pub struct ElevenLabsVoice {
    http: Client,
    config: VoiceConfig,
}

impl ElevenLabsVoice {
    pub fn new(config: VoiceConfig) -> AssetResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AssetError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AssetResult<Self> {
        Self::new(VoiceConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

#[async_trait]
impl VoiceOver for ElevenLabsVoice {
    async fn generate_voice_over(
        &self,
        segments: &[String],
        dest_dir: &Path,
    ) -> AssetResult<AssetHandle> {
        let text = build_utterance(segments).ok_or(AssetError::NothingToSay)?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AssetError::NotConfigured("ELEVENLABS_API_KEY".to_string()))?;

        let url = format!(
            "{}/text-to-speech/{}",
            self.config.base_url, self.config.voice_id
        );
        let body = TtsRequest {
            text: &text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        debug!(chars = text.len(), "Requesting narration from {}", url);

        let response = with_retry(self.config.max_retries, || async {
            let response = self
                .http
                .post(&url)
                .header("xi-api-key", api_key)
                .header(reqwest::header::ACCEPT, "audio/mpeg")
                .json(&body)
                .send()
                .await?;
            ensure_success(response).await
        })
        .await?;

        let path = dest_dir.join(NARRATION_FILE);
        let bytes = stream_to_file(response, &path).await?;
        info!(bytes, "Narration written to {}", path.display());

        Ok(AssetHandle::owned(path, dest_dir))
    }
}
