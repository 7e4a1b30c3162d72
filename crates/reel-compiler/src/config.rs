//! Compiler configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::{OverlayTiming, PlanOptions};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Parent of per-request scratch directories; OS temp when unset
    pub scratch_dir: Option<PathBuf>,
    /// Deadline for each asset resolution
    pub asset_timeout: Duration,
    pub encoder_timeout_base_secs: u64,
    pub encoder_timeout_per_second: u64,
    pub overlay_timing: OverlayTiming,
    /// Explicit encoder binary; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            asset_timeout: Duration::from_secs(30),
            encoder_timeout_base_secs: 60,
            encoder_timeout_per_second: 10,
            overlay_timing: OverlayTiming::default(),
            ffmpeg_path: None,
        }
    }
}

impl CompilerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let overlay_timing = match std::env::var("OVERLAY_TIMING") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring OVERLAY_TIMING: {}", e);
                defaults.overlay_timing
            }),
            _ => defaults.overlay_timing,
        };

        Self {
            scratch_dir: env_path("SCRATCH_DIR"),
            asset_timeout: Duration::from_secs(env_u64(
                "ASSET_TIMEOUT_SECS",
                defaults.asset_timeout.as_secs(),
            )),
            encoder_timeout_base_secs: env_u64(
                "ENCODER_TIMEOUT_BASE_SECS",
                defaults.encoder_timeout_base_secs,
            ),
            encoder_timeout_per_second: env_u64(
                "ENCODER_TIMEOUT_PER_SECOND",
                defaults.encoder_timeout_per_second,
            ),
            overlay_timing,
            ffmpeg_path: env_path("FFMPEG_PATH"),
        }
    }

    /// Encoder deadline for a canvas of `duration` seconds.
    pub fn encoder_timeout_secs(&self, duration: f64) -> u64 {
        let scaled = (duration.max(0.0) * self.encoder_timeout_per_second as f64).ceil() as u64;
        self.encoder_timeout_base_secs.saturating_add(scaled)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            overlay_timing: self.overlay_timing,
            ..PlanOptions::default()
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
