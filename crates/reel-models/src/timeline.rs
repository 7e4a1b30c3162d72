//! Validated timeline model consumed by the planner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Relative tolerance when comparing the declared aspect ratio with the resolution.
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.01;

/// A decoded and validated timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineDocument {
    pub metadata: Metadata,
    pub image_timeline: Vec<ImageSegment>,
    pub text_timeline: TextTimeline,
    pub music: Music,
    /// Opaque theme block, carried through untouched.
    pub theme: serde_json::Map<String, serde_json::Value>,
}

impl TimelineDocument {
    /// Text segments with non-blank text, in timeline order.
    pub fn spoken_segments(&self) -> impl Iterator<Item = &TextSegment> {
        self.text_timeline
            .segments
            .iter()
            .filter(|s| !s.text.trim().is_empty())
    }

    /// Whether a narration track is expected.
    pub fn has_narration(&self) -> bool {
        self.spoken_segments().next().is_some()
    }

    /// Whether a music stem is requested.
    pub fn wants_music(&self) -> bool {
        self.music.enabled && !self.music.genre.trim().is_empty()
    }

    /// Output duration: `total_duration` when positive, else the sum of image durations.
    pub fn canvas_duration(&self) -> f64 {
        if self.metadata.total_duration > 0.0 {
            self.metadata.total_duration
        } else {
            self.image_timeline.iter().map(|s| s.duration).sum()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub resolution: Resolution,
    pub fps: u32,
    pub aspect_ratio: String,
    pub total_duration: f64,
}

impl Metadata {
    /// Parse `aspect_ratio` as `a:b` (or `a/b`).
    pub fn declared_aspect(&self) -> Option<f64> {
        let (a, b) = self
            .aspect_ratio
            .split_once(':')
            .or_else(|| self.aspect_ratio.split_once('/'))?;
        let a: f64 = a.trim().parse().ok()?;
        let b: f64 = b.trim().parse().ok()?;
        if a <= 0.0 || b <= 0.0 {
            return None;
        }
        Some(a / b)
    }

    /// False only when a parseable `aspect_ratio` disagrees with the resolution.
    pub fn aspect_ratio_consistent(&self) -> bool {
        match self.declared_aspect() {
            Some(declared) => {
                let actual = self.resolution.ratio();
                ((actual - declared) / declared).abs() <= ASPECT_RATIO_TOLERANCE
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub effect: String,
    pub easing: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSegment {
    pub ordering: i64,
    pub image_index: usize,
    pub start_time: f64,
    pub duration: f64,
    pub transition: Transition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub font_family: String,
    pub text_style: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextTimeline {
    pub style: TextStyle,
    pub segments: Vec<TextSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub text: String,
    pub start_time: f64,
    pub duration: f64,
    pub position: TextPosition,
    pub narrative_source: String,
}

/// Placement of a text overlay on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextPosition {
    #[default]
    Center,
    CenterLeft,
    CenterRight,
    CenterBottom,
}

impl TextPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextPosition::Center => "center",
            TextPosition::CenterLeft => "center-left",
            TextPosition::CenterRight => "center-right",
            TextPosition::CenterBottom => "center-bottom",
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPositionParseError(pub String);

impl fmt::Display for TextPositionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown text position: {}", self.0)
    }
}

impl std::error::Error for TextPositionParseError {}

impl FromStr for TextPosition {
    type Err = TextPositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "center" => Ok(TextPosition::Center),
            "center-left" => Ok(TextPosition::CenterLeft),
            "center-right" => Ok(TextPosition::CenterRight),
            "center-bottom" => Ok(TextPosition::CenterBottom),
            _ => Err(TextPositionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Music {
    pub enabled: bool,
    pub genre: String,
    pub volume: f64,
}
