//! Application state.

use std::sync::Arc;

use reel_assets::{AssetResult, CatalogueMusic, ElevenLabsVoice, TimelineGenerator};
use reel_compiler::{Compiler, CompilerConfig};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub compiler: Arc<Compiler>,
    /// Produces a timeline from a prompt when the caller sends none
    pub timeline: Option<Arc<TimelineGenerator>>,
}

impl AppState {
    /// Build the production collaborators from the environment.
    pub fn from_env(config: ApiConfig) -> AssetResult<Self> {
        let voice = ElevenLabsVoice::from_env()?;
        if !voice.is_configured() {
            warn!("ELEVENLABS_API_KEY not set; narration requests will fail");
        }

        let music = CatalogueMusic::from_env()?;
        let compiler_config = CompilerConfig::from_env();
        info!(
            overlay_timing = compiler_config.overlay_timing.as_str(),
            asset_timeout_secs = compiler_config.asset_timeout.as_secs(),
            "Compiler configured"
        );

        let generator = TimelineGenerator::from_env()?;
        let timeline = if generator.is_configured() {
            Some(Arc::new(generator))
        } else {
            info!("TIMELINE_GENERATOR_URL not set; requests must carry a schema");
            None
        };

        Ok(Self {
            config,
            compiler: Arc::new(Compiler::new(
                Arc::new(voice),
                Arc::new(music),
                compiler_config,
            )),
            timeline,
        })
    }

    /// Assemble state from prebuilt parts.
    pub fn new(config: ApiConfig, compiler: Compiler) -> Self {
        Self {
            config,
            compiler: Arc::new(compiler),
            timeline: None,
        }
    }

    pub fn with_timeline(mut self, generator: TimelineGenerator) -> Self {
        self.timeline = Some(Arc::new(generator));
        self
    }
}
