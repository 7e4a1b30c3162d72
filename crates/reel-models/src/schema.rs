//! Upstream timeline wire schema.
//!
//! Field names follow what the timeline generator emits (camelCase with a
//! few PascalCase containers). These types are only a serde surface; the
//! decoder validates them into [`crate::TimelineDocument`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireTimeline {
    pub metadata: WireMetadata,
    #[serde(default)]
    pub theme: Map<String, Value>,
    pub timeline: WireTimelineBody,
    #[serde(default)]
    pub music: WireMusic,
}

/// Frame rate as sent upstream: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum WireFps {
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireMetadata {
    pub resolution: Vec<i64>,
    #[serde(rename = "totalDuration", default)]
    pub total_duration: f64,
    #[serde(rename = "aspectRatio", default)]
    pub aspect_ratio: String,
    #[serde(default)]
    pub fps: Option<WireFps>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireTimelineBody {
    #[serde(rename = "totalDuration", default)]
    pub total_duration: f64,
    #[serde(rename = "ImageTimeline")]
    pub image_timeline: WireImageTimeline,
    #[serde(rename = "TextTimeline", default)]
    pub text_timeline: WireTextTimeline,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireImageTimeline {
    #[serde(rename = "ImageSegments")]
    pub image_segments: Vec<WireImageSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireImageSegment {
    #[serde(default)]
    pub ordering: i64,
    #[serde(rename = "imageIndex")]
    pub image_index: i64,
    #[serde(rename = "startTime")]
    pub start_time: f64,
    pub duration: f64,
    #[serde(rename = "Transition", default)]
    pub transition: WireTransition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WireTransition {
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub easing: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WireTextTimeline {
    #[serde(rename = "TextStyle", default)]
    pub text_style: WireTextStyle,
    #[serde(rename = "TextSegments", default)]
    pub text_segments: Vec<WireTextSegment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WireTextStyle {
    #[serde(rename = "fontFamily", default)]
    pub font_family: String,
    #[serde(rename = "textStyle", default)]
    pub text_style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WireTextSegment {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "startTime", default)]
    pub start_time: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(rename = "narrativeSource", default)]
    pub narrative_source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WireMusic {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub volume: f64,
}

/// JSON Schema of the accepted timeline document.
pub fn schema_json() -> Value {
    let schema = schemars::schema_for!(WireTimeline);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}
