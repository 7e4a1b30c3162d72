//! Asset collaborators for reel compilation.
//!
//! This crate provides:
//! - `VoiceOver` and the ElevenLabs text-to-speech client
//! - `MusicGeneration` and the genre music catalogue
//! - Per-request narration/music resolution and media validation
//! - The upstream timeline generator client

pub mod error;
mod http;
pub mod music;
pub mod resolver;
pub mod timeline;
pub mod voice;

pub use error::{AssetError, AssetResult};
pub use music::{CatalogueMusic, MusicCatalogue, MusicConfig, MusicGeneration, SelectionPolicy};
pub use resolver::{
    resolve_music, resolve_narration, trim_music, validate_media, MUSIC_FILE, MUSIC_STEM_SECONDS,
};
pub use timeline::{TimelineGenerator, TimelineGeneratorConfig};
pub use voice::{build_utterance, ElevenLabsVoice, VoiceConfig, VoiceOver, NARRATION_FILE};
