//! Filter-graph building blocks.
//!
//! A graph is a list of [`FilterChain`]s rendered bottom-up into the single
//! `-filter_complex` string. Nothing outside this module formats filter syntax.

use std::fmt;

use reel_models::TextPosition;

/// Base video after concatenation.
pub const LABEL_BASE_VIDEO: &str = "basev";
/// Final video when no overlay was drawn.
pub const LABEL_VIDEO_OUT: &str = "vout";
/// Narration stem.
pub const LABEL_NARRATION: &str = "na";
/// Music stem.
pub const LABEL_MUSIC: &str = "ma";
/// Narration and music mixed.
pub const LABEL_MIX: &str = "mixa";

/// Overlay text style.
pub const TEXT_COLOR: &str = "white";
pub const TEXT_BORDER_WIDTH: u32 = 2;
pub const TEXT_BORDER_COLOR: &str = "black";
pub const TEXT_FONT_SIZE: u32 = 24;

/// Silence source for timelines without narration.
pub const SILENCE_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=48000";

/// Label of the K-th visual segment pipeline.
pub fn segment_label(k: usize) -> String {
    format!("seg{}", k)
}

/// Label after the K-th text overlay.
pub fn overlay_label(k: usize) -> String {
    format!("vtx{}", k)
}

/// Escape text for a `drawtext` `text=` option.
///
/// Only backslash, colon and single quote are touched, in that order.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// `(x, y)` drawtext expressions for a position.
pub fn position_xy(position: TextPosition) -> (&'static str, &'static str) {
    match position {
        TextPosition::Center => ("(w-tw)/2", "(h-th)/2"),
        TextPosition::CenterLeft => ("(w-tw)/4", "(h-th)/2"),
        TextPosition::CenterRight => ("3*(w-tw)/4", "(h-th)/2"),
        TextPosition::CenterBottom => ("(w-tw)/2", "h-th-20"),
    }
}

/// A pad reference inside a filter graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pad {
    /// Video stream of input N (`[N:v]`)
    Video(usize),
    /// Audio stream of input N (`[N:a]`)
    Audio(usize),
    /// Named intermediate label
    Label(String),
}

impl Pad {
    pub fn label(name: impl Into<String>) -> Self {
        Pad::Label(name.into())
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Video(i) => write!(f, "[{}:v]", i),
            Pad::Audio(i) => write!(f, "[{}:a]", i),
            Pad::Label(name) => write!(f, "[{}]", name),
        }
    }
}

/// A single filter with its option string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: &'static str,
    options: Option<String>,
}

impl Filter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            options: None,
        }
    }

    pub fn with(name: &'static str, options: impl Into<String>) -> Self {
        Self {
            name,
            options: Some(options.into()),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.options {
            Some(options) => write!(f, "{}={}", self.name, options),
            None => f.write_str(self.name),
        }
    }
}

/// `[in]...filter,filter,...[out]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub output: Pad,
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{}", pad)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", filter)?;
        }
        write!(f, "{}", self.output)
    }
}

/// Ordered set of chains forming one `-filter_complex` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    pub fn render(&self) -> String {
        self.chains
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Seconds as written into filter options.
pub fn secs(value: f64) -> String {
    format!("{:.3}", value)
}

/// Fit a still into the canvas, hold it for `duration` and reset timestamps.
pub fn still_segment_filters(width: u32, height: u32, fps: u32, duration: f64) -> Vec<Filter> {
    vec![
        Filter::with(
            "scale",
            format!("{}:{}:force_original_aspect_ratio=decrease", width, height),
        ),
        Filter::with("pad", format!("{}:{}:(ow-iw)/2:(oh-ih)/2", width, height)),
        Filter::with("format", "yuv420p"),
        Filter::with("fps", fps.to_string()),
        Filter::with(
            "tpad",
            format!("stop_mode=clone:stop_duration={}", secs(duration)),
        ),
        Filter::with("trim", format!("duration={}", secs(duration))),
        Filter::with("setpts", "PTS-STARTPTS"),
    ]
}

pub fn concat_filter(segments: usize) -> Filter {
    Filter::with("concat", format!("n={}:v=1:a=0", segments))
}

/// `drawtext` visible between `start` and `end` seconds.
///
/// Expansion is off so `%` in captions renders literally.
pub fn drawtext_filter(text: &str, x: &str, y: &str, start: f64, end: f64) -> Filter {
    Filter::with(
        "drawtext",
        format!(
            "text={}:expansion=none:fontcolor={}:borderw={}:bordercolor={}:fontsize={}:x={}:y={}:enable='between(t,{},{})'",
            escape_drawtext(text),
            TEXT_COLOR,
            TEXT_BORDER_WIDTH,
            TEXT_BORDER_COLOR,
            TEXT_FONT_SIZE,
            x,
            y,
            secs(start),
            secs(end),
        ),
    )
}

pub fn volume_filter(volume: f64) -> Filter {
    Filter::with("volume", format!("{:.2}", volume))
}

pub fn mix_filter() -> Filter {
    Filter::with("amix", "inputs=2:duration=longest:dropout_transition=2")
}
