//! Filter-graph planner.
//!
//! Turns a validated timeline plus resolved inputs into a [`CompilationPlan`].
//! The plan is a typed IR; [`crate::assemble`] lowers it to an argument vector.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reel_models::{AssetHandle, TextPosition, TimelineDocument};

use crate::error::PlanError;

/// Which window a text overlay is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayTiming {
    /// Text at rank i is shown for the whole visual segment at rank i.
    #[default]
    VisualSegment,
    /// Text keeps its own start time and duration.
    TextSegment,
}

impl OverlayTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayTiming::VisualSegment => "visual",
            OverlayTiming::TextSegment => "text",
        }
    }
}

impl fmt::Display for OverlayTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visual" | "visual_segment" => Ok(OverlayTiming::VisualSegment),
            "text" | "text_segment" => Ok(OverlayTiming::TextSegment),
            other => Err(format!("unknown overlay timing: {}", other)),
        }
    }
}

/// Planner knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanOptions {
    pub overlay_timing: OverlayTiming,
    /// Narration gain; non-positive means unity.
    pub narration_volume: f64,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            overlay_timing: OverlayTiming::default(),
            narration_volume: 1.0,
        }
    }
}

/// Where the narration stem comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationSource {
    /// Synthesised voice-over file
    File(AssetHandle),
    /// Generated silence, for timelines with nothing to say
    Silence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisualSegment {
    pub input_index: usize,
    pub window_start: f64,
    pub window_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub text: String,
    pub position: TextPosition,
    pub x_expr: &'static str,
    pub y_expr: &'static str,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlan {
    pub narration: NarrationSource,
    pub narration_input_index: usize,
    pub music: Option<PathBuf>,
    pub music_input_index: Option<usize>,
    pub narration_volume: f64,
    pub music_volume: f64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationPlan {
    pub canvas: Canvas,
    /// Caller media in caller order; input index == position.
    pub media_inputs: Vec<PathBuf>,
    /// Concatenation order.
    pub visual_segments: Vec<VisualSegment>,
    pub overlays: Vec<Overlay>,
    pub audio: AudioPlan,
}

impl CompilationPlan {
    /// Number of encoder inputs the plan needs.
    pub fn input_count(&self) -> usize {
        self.media_inputs.len() + 1 + usize::from(self.audio.music_input_index.is_some())
    }
}

/// Clamp a gain into `[0, 1]`; NaN becomes silence.
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Check the timeline against the number of supplied media files.
///
/// Cheap and IO-free, so callers can run it before acquiring any assets.
pub fn validate_references(document: &TimelineDocument, media_count: usize) -> Result<(), PlanError> {
    let segments = &document.image_timeline;
    if segments.is_empty() {
        return Err(PlanError::NoVisualSegments);
    }
    for (segment, seg) in segments.iter().enumerate() {
        if seg.image_index >= media_count {
            return Err(PlanError::ImageIndexOutOfRange {
                segment,
                index: seg.image_index,
                available: media_count,
            });
        }
    }
    Ok(())
}

/// Build the compilation plan.
///
/// Fails before anything is spawned when an image index is out of range,
/// when there is nothing to show, when no narration source is given, or when
/// any referenced file is missing.
pub fn plan(
    document: &TimelineDocument,
    media_paths: &[PathBuf],
    narration: Option<NarrationSource>,
    music: Option<&AssetHandle>,
    options: &PlanOptions,
) -> Result<CompilationPlan, PlanError> {
    validate_references(document, media_paths.len())?;
    let segments = &document.image_timeline;
    let narration = narration.ok_or(PlanError::MissingNarration)?;

    for path in media_paths {
        ensure_readable(path)?;
    }
    if let NarrationSource::File(handle) = &narration {
        ensure_readable(handle.path())?;
    }
    if let Some(handle) = music {
        ensure_readable(handle.path())?;
    }

    let meta = &document.metadata;
    let canvas = Canvas {
        width: meta.resolution.width,
        height: meta.resolution.height,
        fps: meta.fps,
        duration: document.canvas_duration(),
    };

    // Stable sort keeps the original order for equal start times
    let mut sorted: Vec<_> = segments.iter().collect();
    sorted.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let visual_segments: Vec<VisualSegment> = sorted
        .iter()
        .map(|seg| VisualSegment {
            input_index: seg.image_index,
            window_start: seg.start_time,
            window_duration: seg.duration,
        })
        .collect();

    let overlays = document
        .text_timeline
        .segments
        .iter()
        .zip(visual_segments.iter())
        .filter(|(text, _)| !text.text.trim().is_empty())
        .map(|(text, visual)| {
            let (start, end) = match options.overlay_timing {
                OverlayTiming::VisualSegment => (
                    visual.window_start,
                    visual.window_start + visual.window_duration,
                ),
                OverlayTiming::TextSegment => (text.start_time, text.start_time + text.duration),
            };
            let (x_expr, y_expr) = crate::filters::position_xy(text.position);
            Overlay {
                text: text.text.clone(),
                position: text.position,
                x_expr,
                y_expr,
                start,
                end,
            }
        })
        .collect();

    let narration_input_index = media_paths.len();
    let music_path = music.map(|h| h.path().to_path_buf());
    let music_input_index = music_path.as_ref().map(|_| narration_input_index + 1);

    let narration_volume = if options.narration_volume > 0.0 {
        options.narration_volume
    } else {
        1.0
    };

    Ok(CompilationPlan {
        canvas,
        media_inputs: media_paths.to_vec(),
        visual_segments,
        overlays,
        audio: AudioPlan {
            narration,
            narration_input_index,
            music: music_path,
            music_input_index,
            narration_volume,
            music_volume: clamp01(document.music.volume),
            total_duration: canvas.duration,
        },
    })
}

fn ensure_readable(path: &Path) -> Result<(), PlanError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(PlanError::MissingInput(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{
        ImageSegment, Metadata, Music, Resolution, TextSegment, TextTimeline, Transition,
    };
    use tempfile::TempDir;

    fn image(index: usize, start: f64, duration: f64) -> ImageSegment {
        ImageSegment {
            ordering: 0,
            image_index: index,
            start_time: start,
            duration,
            transition: Transition::default(),
        }
    }

    fn text(body: &str, start: f64, duration: f64) -> TextSegment {
        TextSegment {
            text: body.to_string(),
            start_time: start,
            duration,
            position: TextPosition::CenterBottom,
            narrative_source: String::new(),
        }
    }

    fn document(images: Vec<ImageSegment>, texts: Vec<TextSegment>) -> TimelineDocument {
        TimelineDocument {
            metadata: Metadata {
                resolution: Resolution {
                    width: 1080,
                    height: 1920,
                },
                fps: 30,
                aspect_ratio: "9:16".to_string(),
                total_duration: 0.0,
            },
            image_timeline: images,
            text_timeline: TextTimeline {
                segments: texts,
                ..Default::default()
            },
            music: Music::default(),
            theme: Default::default(),
        }
    }

    fn media(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, b"img").unwrap();
                path
            })
            .collect()
    }

    fn narration(dir: &TempDir) -> NarrationSource {
        let path = dir.path().join("narration.mp3");
        std::fs::write(&path, b"mp3").unwrap();
        NarrationSource::File(AssetHandle::owned(path, dir.path()))
    }

    #[test]
    fn test_sorts_by_start_time_stably() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg", "b.jpg", "c.jpg"]);
        let doc = document(
            vec![image(2, 4.0, 2.0), image(0, 0.0, 2.0), image(1, 2.0, 2.0), image(0, 2.0, 1.0)],
            vec![],
        );

        let plan = plan(&doc, &paths, Some(narration(&dir)), None, &PlanOptions::default()).unwrap();
        let order: Vec<_> = plan
            .visual_segments
            .iter()
            .map(|s| (s.input_index, s.window_duration))
            .collect();
        assert_eq!(order, vec![(0, 2.0), (1, 2.0), (0, 1.0), (2, 2.0)]);
        assert_eq!(plan.canvas.duration, 7.0);
    }

    #[test]
    fn test_out_of_range_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg", "b.jpg"]);
        let doc = document(vec![image(0, 0.0, 3.0), image(5, 3.0, 3.0)], vec![]);

        let err = plan(&doc, &paths, Some(narration(&dir)), None, &PlanOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::ImageIndexOutOfRange {
                segment: 1,
                index: 5,
                available: 2
            }
        );
    }

    #[test]
    fn test_empty_visuals_and_missing_narration() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg"]);

        let empty = document(vec![], vec![]);
        assert_eq!(
            plan(&empty, &paths, Some(narration(&dir)), None, &PlanOptions::default()),
            Err(PlanError::NoVisualSegments)
        );

        let doc = document(vec![image(0, 0.0, 3.0)], vec![]);
        assert_eq!(
            plan(&doc, &paths, None, None, &PlanOptions::default()),
            Err(PlanError::MissingNarration)
        );
    }

    #[test]
    fn test_missing_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");
        let doc = document(vec![image(0, 0.0, 3.0)], vec![]);

        let err = plan(
            &doc,
            &[missing.clone()],
            Some(NarrationSource::Silence),
            None,
            &PlanOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err, PlanError::MissingInput(missing));
    }

    #[test]
    fn test_overlay_pairing_modes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg", "b.jpg"]);
        let doc = document(
            vec![image(0, 0.0, 3.0), image(1, 3.0, 3.0)],
            vec![text("one", 0.5, 1.0), text("  ", 2.0, 1.0), text("three", 6.0, 1.0)],
        );

        let visual = plan(&doc, &paths, Some(narration(&dir)), None, &PlanOptions::default())
            .unwrap();
        // Blank text consumes its rank; the third text has no visual partner
        assert_eq!(visual.overlays.len(), 1);
        assert_eq!((visual.overlays[0].start, visual.overlays[0].end), (0.0, 3.0));

        let options = PlanOptions {
            overlay_timing: OverlayTiming::TextSegment,
            ..Default::default()
        };
        let own = plan(&doc, &paths, Some(narration(&dir)), None, &options).unwrap();
        assert_eq!((own.overlays[0].start, own.overlays[0].end), (0.5, 1.5));
    }

    #[test]
    fn test_audio_indices_and_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg", "b.jpg"]);
        let music_path = dir.path().join("music.mp3");
        std::fs::write(&music_path, b"mp3").unwrap();
        let music = AssetHandle::owned(&music_path, dir.path());

        let mut doc = document(vec![image(0, 0.0, 3.0)], vec![]);
        doc.music = Music {
            enabled: true,
            genre: "upbeat".to_string(),
            volume: 1.7,
        };
        let options = PlanOptions {
            narration_volume: -1.0,
            ..Default::default()
        };

        let plan = plan(&doc, &paths, Some(narration(&dir)), Some(&music), &options).unwrap();
        assert_eq!(plan.audio.narration_input_index, 2);
        assert_eq!(plan.audio.music_input_index, Some(3));
        assert_eq!(plan.audio.music_volume, 1.0);
        assert_eq!(plan.audio.narration_volume, 1.0);
        assert_eq!(plan.input_count(), 4);
    }

    #[test]
    fn test_total_duration_wins_when_set() {
        let dir = tempfile::tempdir().unwrap();
        let paths = media(&dir, &["a.jpg"]);
        let mut doc = document(vec![image(0, 0.0, 3.0)], vec![]);
        doc.metadata.total_duration = 10.0;

        let plan = plan(&doc, &paths, Some(NarrationSource::Silence), None, &PlanOptions::default())
            .unwrap();
        assert_eq!(plan.canvas.duration, 10.0);
        assert_eq!(plan.audio.total_duration, 10.0);
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(0.3), 0.3);
        assert_eq!(clamp01(2.0), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
    }
}
