//! Timeline decoder.
//!
//! `decode` is pure: bytes in, validated [`TimelineDocument`] out.

use serde_json::Value;
use thiserror::Error;

use crate::schema::{
    WireFps, WireImageSegment, WireImageTimeline, WireMetadata, WireMusic, WireTextSegment,
    WireTextStyle, WireTextTimeline, WireTimeline, WireTimelineBody, WireTransition,
};
use crate::timeline::{
    ImageSegment, Metadata, Music, Resolution, TextPosition, TextSegment, TextStyle, TextTimeline,
    TimelineDocument, Transition,
};

/// Key of the single-field envelope some upstreams wrap payloads in.
pub const ENVELOPE_KEY: &str = "output";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed timeline JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resolution must be [width, height] of positive integers, got {0:?}")]
    Resolution(Vec<i64>),

    #[error("metadata.fps is missing")]
    MissingFps,

    #[error("metadata.fps must be a positive integer, got {0}")]
    InvalidFps(String),

    #[error("total duration must be a finite non-negative number, got {0}")]
    TotalDuration(f64),

    #[error("image segment {index}: {reason}")]
    ImageSegment { index: usize, reason: String },

    #[error("text segment {index}: {reason}")]
    TextSegment { index: usize, reason: String },
}

impl DecodeError {
    fn image(index: usize, reason: impl Into<String>) -> Self {
        Self::ImageSegment {
            index,
            reason: reason.into(),
        }
    }

    fn text(index: usize, reason: impl Into<String>) -> Self {
        Self::TextSegment {
            index,
            reason: reason.into(),
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Decode timeline bytes, unwrapping an optional `{"output": ...}` envelope.
pub fn decode(bytes: &[u8]) -> DecodeResult<TimelineDocument> {
    let value: Value = serde_json::from_slice(bytes)?;
    let value = unwrap_envelope(value)?;
    let wire: WireTimeline = serde_json::from_value(value)?;
    validate(wire)
}

/// Re-serialise a document in the upstream wire shape.
pub fn encode(doc: &TimelineDocument) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&WireTimeline::from(doc))
}

fn unwrap_envelope(mut value: Value) -> DecodeResult<Value> {
    if let Value::Object(map) = &mut value {
        if map.len() == 1 {
            if let Some(inner) = map.remove(ENVELOPE_KEY) {
                return match inner {
                    // Workflow engines often hand back the payload as a JSON string
                    Value::String(text) => Ok(serde_json::from_str(&text)?),
                    other => Ok(other),
                };
            }
        }
    }
    Ok(value)
}

fn validate(wire: WireTimeline) -> DecodeResult<TimelineDocument> {
    let metadata = validate_metadata(&wire.metadata)?;

    let image_timeline = wire
        .timeline
        .image_timeline
        .image_segments
        .into_iter()
        .enumerate()
        .map(|(index, seg)| validate_image_segment(index, seg))
        .collect::<DecodeResult<Vec<_>>>()?;

    let text = wire.timeline.text_timeline;
    let segments = text
        .text_segments
        .into_iter()
        .enumerate()
        .map(|(index, seg)| validate_text_segment(index, seg))
        .collect::<DecodeResult<Vec<_>>>()?;

    Ok(TimelineDocument {
        metadata,
        image_timeline,
        text_timeline: TextTimeline {
            style: TextStyle {
                font_family: text.text_style.font_family,
                text_style: text.text_style.text_style,
            },
            segments,
        },
        music: Music {
            enabled: wire.music.enabled,
            genre: wire.music.genre,
            volume: wire.music.volume,
        },
        theme: wire.theme,
    })
}

fn validate_metadata(wire: &WireMetadata) -> DecodeResult<Metadata> {
    let resolution = match wire.resolution.as_slice() {
        [w, h] if *w > 0 && *h > 0 && *w <= u32::MAX as i64 && *h <= u32::MAX as i64 => {
            Resolution {
                width: *w as u32,
                height: *h as u32,
            }
        }
        _ => return Err(DecodeError::Resolution(wire.resolution.clone())),
    };

    let fps = parse_fps(wire.fps.as_ref())?;

    if !wire.total_duration.is_finite() || wire.total_duration < 0.0 {
        return Err(DecodeError::TotalDuration(wire.total_duration));
    }

    Ok(Metadata {
        resolution,
        fps,
        aspect_ratio: wire.aspect_ratio.clone(),
        total_duration: wire.total_duration,
    })
}

fn parse_fps(fps: Option<&WireFps>) -> DecodeResult<u32> {
    let parsed = match fps {
        None => return Err(DecodeError::MissingFps),
        Some(WireFps::Integer(n)) => u32::try_from(*n).ok(),
        Some(WireFps::Float(f)) if f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64 => {
            Some(*f as u32)
        }
        Some(WireFps::Float(_)) => None,
        Some(WireFps::Text(s)) => s.trim().parse::<u32>().ok(),
    };

    match parsed {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(DecodeError::InvalidFps(describe_fps(fps))),
    }
}

fn describe_fps(fps: Option<&WireFps>) -> String {
    match fps {
        Some(WireFps::Integer(n)) => n.to_string(),
        Some(WireFps::Float(f)) => f.to_string(),
        Some(WireFps::Text(s)) => format!("{s:?}"),
        None => "null".to_string(),
    }
}

fn validate_image_segment(index: usize, seg: WireImageSegment) -> DecodeResult<ImageSegment> {
    let image_index = usize::try_from(seg.image_index)
        .map_err(|_| DecodeError::image(index, format!("negative imageIndex {}", seg.image_index)))?;
    if !seg.start_time.is_finite() || seg.start_time < 0.0 {
        return Err(DecodeError::image(index, "startTime must be >= 0"));
    }
    if !seg.duration.is_finite() || seg.duration <= 0.0 {
        return Err(DecodeError::image(index, "duration must be > 0"));
    }

    Ok(ImageSegment {
        ordering: seg.ordering,
        image_index,
        start_time: seg.start_time,
        duration: seg.duration,
        transition: Transition {
            effect: seg.transition.effect,
            easing: seg.transition.easing,
        },
    })
}

fn validate_text_segment(index: usize, seg: WireTextSegment) -> DecodeResult<TextSegment> {
    if !seg.start_time.is_finite() || seg.start_time < 0.0 {
        return Err(DecodeError::text(index, "startTime must be >= 0"));
    }
    if !seg.duration.is_finite() || seg.duration <= 0.0 {
        return Err(DecodeError::text(index, "duration must be > 0"));
    }
    let position = match seg.position.as_deref() {
        None | Some("") => TextPosition::default(),
        Some(raw) => raw
            .parse()
            .map_err(|e: crate::TextPositionParseError| DecodeError::text(index, e.to_string()))?,
    };

    Ok(TextSegment {
        text: seg.text,
        start_time: seg.start_time,
        duration: seg.duration,
        position,
        narrative_source: seg.narrative_source,
    })
}

impl From<&TimelineDocument> for WireTimeline {
    fn from(doc: &TimelineDocument) -> Self {
        let meta = &doc.metadata;
        WireTimeline {
            metadata: WireMetadata {
                resolution: vec![meta.resolution.width as i64, meta.resolution.height as i64],
                total_duration: meta.total_duration,
                aspect_ratio: meta.aspect_ratio.clone(),
                fps: Some(WireFps::Integer(meta.fps as i64)),
            },
            theme: doc.theme.clone(),
            timeline: WireTimelineBody {
                total_duration: meta.total_duration,
                image_timeline: WireImageTimeline {
                    image_segments: doc
                        .image_timeline
                        .iter()
                        .map(|s| WireImageSegment {
                            ordering: s.ordering,
                            image_index: s.image_index as i64,
                            start_time: s.start_time,
                            duration: s.duration,
                            transition: WireTransition {
                                effect: s.transition.effect.clone(),
                                easing: s.transition.easing.clone(),
                            },
                        })
                        .collect(),
                },
                text_timeline: WireTextTimeline {
                    text_style: WireTextStyle {
                        font_family: doc.text_timeline.style.font_family.clone(),
                        text_style: doc.text_timeline.style.text_style.clone(),
                    },
                    text_segments: doc
                        .text_timeline
                        .segments
                        .iter()
                        .map(|s| WireTextSegment {
                            text: s.text.clone(),
                            start_time: s.start_time,
                            duration: s.duration,
                            position: Some(s.position.as_str().to_string()),
                            narrative_source: s.narrative_source.clone(),
                        })
                        .collect(),
                },
            },
            music: WireMusic {
                enabled: doc.music.enabled,
                genre: doc.music.genre.clone(),
                volume: doc.music.volume,
            },
        }
    }
}
