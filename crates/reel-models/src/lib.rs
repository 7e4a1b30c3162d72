//! Shared data models for the reel compiler.
//!
//! This crate provides:
//! - The upstream timeline wire schema and its decoder
//! - The validated internal `TimelineDocument`
//! - Scoped asset handles
//! - Codec profiles for the output encode
//! - Compile progress events

pub mod asset;
pub mod decode;
pub mod encoding;
pub mod events;
pub mod schema;
pub mod timeline;

// Re-export common types
pub use asset::AssetHandle;
pub use decode::{decode, encode, DecodeError};
pub use encoding::{CodecProfile, CodecProfileParseError, EncodingConfig};
pub use events::{CompileEvent, CompileStage};
pub use schema::{schema_json, WireTimeline};
pub use timeline::{
    ImageSegment, Metadata, Music, Resolution, TextPosition, TextPositionParseError, TextSegment,
    TextStyle, TextTimeline, TimelineDocument, Transition,
};
