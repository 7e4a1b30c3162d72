//! Command assembler: lowers a [`CompilationPlan`] to one ffmpeg invocation.
//!
//! Input order is fixed: caller media `0..n`, narration at `n`, music at
//! `n + 1` when present.

use std::path::Path;

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegInput};
use crate::filters::{
    concat_filter, drawtext_filter, mix_filter, overlay_label, secs, segment_label,
    still_segment_filters, volume_filter, Filter, FilterChain, FilterGraph, Pad, LABEL_BASE_VIDEO,
    LABEL_MIX, LABEL_MUSIC, LABEL_NARRATION, LABEL_VIDEO_OUT, SILENCE_SOURCE,
};
use crate::plan::{CompilationPlan, NarrationSource};

/// Final encoder argument list.
pub type ArgumentVector = Vec<String>;

/// Filter graph plus the labels to map into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedGraph {
    pub graph: FilterGraph,
    pub video_label: String,
    pub audio_label: String,
}

/// Build the filter graph for a plan.
pub fn build_graph(plan: &CompilationPlan) -> RenderedGraph {
    let canvas = &plan.canvas;
    let mut graph = FilterGraph::default();

    for (k, seg) in plan.visual_segments.iter().enumerate() {
        graph.push(FilterChain {
            inputs: vec![Pad::Video(seg.input_index)],
            filters: still_segment_filters(
                canvas.width,
                canvas.height,
                canvas.fps,
                seg.window_duration,
            ),
            output: Pad::label(segment_label(k)),
        });
    }

    graph.push(FilterChain {
        inputs: (0..plan.visual_segments.len())
            .map(|k| Pad::label(segment_label(k)))
            .collect(),
        filters: vec![concat_filter(plan.visual_segments.len())],
        output: Pad::label(LABEL_BASE_VIDEO),
    });

    let mut video_label = LABEL_BASE_VIDEO.to_string();
    for (k, overlay) in plan.overlays.iter().enumerate() {
        let next = overlay_label(k);
        graph.push(FilterChain {
            inputs: vec![Pad::label(video_label)],
            filters: vec![drawtext_filter(
                &overlay.text,
                overlay.x_expr,
                overlay.y_expr,
                overlay.start,
                overlay.end,
            )],
            output: Pad::label(next.clone()),
        });
        video_label = next;
    }
    if plan.overlays.is_empty() {
        graph.push(FilterChain {
            inputs: vec![Pad::label(LABEL_BASE_VIDEO)],
            filters: vec![Filter::new("copy")],
            output: Pad::label(LABEL_VIDEO_OUT),
        });
        video_label = LABEL_VIDEO_OUT.to_string();
    }

    let audio = &plan.audio;
    let duration = secs(audio.total_duration);
    graph.push(FilterChain {
        inputs: vec![Pad::Audio(audio.narration_input_index)],
        filters: vec![
            volume_filter(audio.narration_volume),
            Filter::new("apad"),
            Filter::with("atrim", format!("0:{}", duration)),
            Filter::with("asetpts", "PTS-STARTPTS"),
        ],
        output: Pad::label(LABEL_NARRATION),
    });

    let audio_label = match audio.music_input_index {
        Some(music_index) => {
            graph.push(FilterChain {
                inputs: vec![Pad::Audio(music_index)],
                filters: vec![
                    volume_filter(audio.music_volume),
                    Filter::with("atrim", format!("0:{}", duration)),
                    Filter::with("asetpts", "PTS-STARTPTS"),
                ],
                output: Pad::label(LABEL_MUSIC),
            });
            graph.push(FilterChain {
                inputs: vec![Pad::label(LABEL_NARRATION), Pad::label(LABEL_MUSIC)],
                filters: vec![mix_filter()],
                output: Pad::label(LABEL_MIX),
            });
            LABEL_MIX
        }
        None => LABEL_NARRATION,
    };

    RenderedGraph {
        graph,
        video_label,
        audio_label: audio_label.to_string(),
    }
}

/// Lower a plan into a single ffmpeg command writing `output`.
pub fn assemble(
    plan: &CompilationPlan,
    output: impl AsRef<Path>,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(output);

    for path in &plan.media_inputs {
        cmd = cmd.input(FfmpegInput::file(path));
    }

    cmd = cmd.input(match &plan.audio.narration {
        NarrationSource::File(handle) => FfmpegInput::file(handle.path()),
        NarrationSource::Silence => {
            FfmpegInput::lavfi(SILENCE_SOURCE).duration(plan.audio.total_duration)
        }
    });

    if let Some(music) = &plan.audio.music {
        cmd = cmd.input(FfmpegInput::file(music));
    }

    let rendered = build_graph(plan);
    let canvas = &plan.canvas;

    cmd.filter_complex(rendered.graph.render())
        .map(format!("[{}]", rendered.video_label))
        .map(format!("[{}]", rendered.audio_label))
        .output_arg("-r")
        .output_arg(canvas.fps.to_string())
        .output_arg("-s")
        .output_arg(format!("{}x{}", canvas.width, canvas.height))
        .output_args(encoding.video_args())
        .output_args(encoding.audio_args())
        .output_args(encoding.container_args())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan, PlanOptions};
    use reel_models::{decode, AssetHandle, CodecProfile};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HAPPY_PATH: &str = r#"{
        "metadata": {"resolution": [1080, 1920], "fps": "30", "totalDuration": 6},
        "timeline": {
            "ImageTimeline": {"ImageSegments": [{"imageIndex": 0, "startTime": 0, "duration": 6}]},
            "TextTimeline": {"TextSegments": [
                {"text": "Hello", "startTime": 0, "duration": 6, "position": "center-bottom"}
            ]}
        },
        "music": {"enabled": false}
    }"#;

    const TWO_SEGMENTS: &str = r#"{
        "metadata": {"resolution": [1080, 1920], "fps": 30, "totalDuration": 6},
        "timeline": {
            "ImageTimeline": {"ImageSegments": [
                {"imageIndex": 1, "startTime": 3, "duration": 3},
                {"imageIndex": 0, "startTime": 0, "duration": 3}
            ]},
            "TextTimeline": {"TextSegments": [
                {"text": "a:b'c\\d", "startTime": 0, "duration": 3, "position": "center"}
            ]}
        },
        "music": {"enabled": true, "genre": "upbeat", "volume": 0.3}
    }"#;

    struct Fixture {
        dir: TempDir,
        media: Vec<PathBuf>,
    }

    impl Fixture {
        fn new(count: usize) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let media = (0..count)
                .map(|i| {
                    let path = dir.path().join(format!("img{i}.jpg"));
                    std::fs::write(&path, b"img").unwrap();
                    path
                })
                .collect();
            Self { dir, media }
        }

        fn asset(&self, name: &str) -> AssetHandle {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"audio").unwrap();
            AssetHandle::owned(path, self.dir.path())
        }

        fn args(&self, json: &str, with_music: bool) -> Vec<String> {
            let doc = decode(json.as_bytes()).unwrap();
            let narration = NarrationSource::File(self.asset("narration.mp3"));
            let music = with_music.then(|| self.asset("music.mp3"));
            let plan = plan(
                &doc,
                &self.media,
                Some(narration),
                music.as_ref(),
                &PlanOptions::default(),
            )
            .unwrap();
            assemble(&plan, self.dir.path().join("out.mp4"), &CodecProfile::Reels.encoding())
                .build_args()
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
        let pos = args.iter().position(|a| a == flag).unwrap();
        &args[pos + 1]
    }

    fn input_sources(args: &[String]) -> Vec<&str> {
        args.windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_happy_path_graph() {
        let fx = Fixture::new(1);
        let args = fx.args(HAPPY_PATH, false);

        assert_eq!(
            value_after(&args, "-filter_complex"),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,pad=1080:1920:(ow-iw)/2:(oh-ih)/2,\
             format=yuv420p,fps=30,tpad=stop_mode=clone:stop_duration=6.000,trim=duration=6.000,\
             setpts=PTS-STARTPTS[seg0];\
             [seg0]concat=n=1:v=1:a=0[basev];\
             [basev]drawtext=text=Hello:expansion=none:fontcolor=white:borderw=2:bordercolor=black:fontsize=24:\
             x=(w-tw)/2:y=h-th-20:enable='between(t,0.000,6.000)'[vtx0];\
             [1:a]volume=1.00,apad,atrim=0:6.000,asetpts=PTS-STARTPTS[na]"
        );

        let tail: Vec<&str> = args
            .iter()
            .skip_while(|a| *a != "-map")
            .map(String::as_str)
            .collect();
        let out = fx.dir.path().join("out.mp4");
        assert_eq!(
            tail,
            vec![
                "-map", "[vtx0]", "-map", "[na]", "-r", "30", "-s", "1080x1920", "-c:v", "libx264",
                "-pix_fmt", "yuv420p", "-preset", "fast", "-crf", "23", "-c:a", "aac",
                "-movflags", "+faststart", out.to_str().unwrap(),
            ]
        );
        assert_eq!(&args[..5], &["-y", "-v", "error", "-progress", "pipe:2"]);
    }

    #[test]
    fn test_two_segment_concat_with_music() {
        let fx = Fixture::new(2);
        let args = fx.args(TWO_SEGMENTS, true);
        let graph = value_after(&args, "-filter_complex");

        assert!(graph.starts_with("[0:v]scale="));
        assert!(graph.contains("[1:v]scale="));
        // Sorted by start time: image 0 first even though listed second
        let first = graph.find("[0:v]").unwrap();
        let second = graph.find("[1:v]").unwrap();
        assert!(first < second);
        assert!(graph.contains("[seg0][seg1]concat=n=2:v=1:a=0[basev]"));
        assert!(graph.contains("[2:a]volume=1.00,apad,atrim=0:6.000,asetpts=PTS-STARTPTS[na]"));
        assert!(graph.contains("[3:a]volume=0.30,atrim=0:6.000,asetpts=PTS-STARTPTS[ma]"));
        assert!(graph.ends_with("[na][ma]amix=inputs=2:duration=longest:dropout_transition=2[mixa]"));
        assert_eq!(
            args.iter().filter(|a| *a == "-map").count(),
            2,
            "one video and one audio map"
        );
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[mixa]"));

        let sources = input_sources(&args);
        assert_eq!(sources.len(), 4);
        assert!(sources[2].ends_with("narration.mp3"));
        assert!(sources[3].ends_with("music.mp3"));
    }

    #[test]
    fn test_escaping_in_overlay() {
        let fx = Fixture::new(2);
        let args = fx.args(TWO_SEGMENTS, true);
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.contains(r"drawtext=text=a\:b\'c\\d:"));
        assert!(graph.contains("x=(w-tw)/2:y=(h-th)/2"));
    }

    #[test]
    fn test_audio_input_count() {
        let fx = Fixture::new(2);
        let without = fx.args(TWO_SEGMENTS, false);
        assert_eq!(input_sources(&without).len(), 3);
        let with = fx.args(TWO_SEGMENTS, true);
        assert_eq!(input_sources(&with).len(), 4);
    }

    #[test]
    fn test_no_overlays_copies_base_video() {
        let fx = Fixture::new(1);
        let json = HAPPY_PATH.replace(r#""text": "Hello""#, r#""text": """#);
        let args = fx.args(&json, false);
        let graph = value_after(&args, "-filter_complex");
        assert!(graph.contains("[basev]copy[vout]"));
        assert!(!graph.contains("drawtext"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vout]"));
    }

    #[test]
    fn test_silence_narration_input() {
        let fx = Fixture::new(1);
        let doc = decode(HAPPY_PATH.as_bytes()).unwrap();
        let plan = plan(
            &doc,
            &fx.media,
            Some(NarrationSource::Silence),
            None,
            &PlanOptions::default(),
        )
        .unwrap();
        let args = assemble(&plan, fx.dir.path().join("out.mp4"), &CodecProfile::Reels.encoding())
            .build_args();

        let pos = args.iter().position(|a| a == SILENCE_SOURCE).unwrap();
        assert_eq!(&args[pos - 5..pos], &["-f", "lavfi", "-t", "6.000", "-i"]);
        assert!(value_after(&args, "-filter_complex").contains("[1:a]volume=1.00,apad"));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let fx = Fixture::new(2);
        assert_eq!(fx.args(TWO_SEGMENTS, true), fx.args(TWO_SEGMENTS, true));
    }

    #[test]
    fn test_pro_profile_output_options() {
        let fx = Fixture::new(1);
        let doc = decode(HAPPY_PATH.as_bytes()).unwrap();
        let plan = plan(
            &doc,
            &fx.media,
            Some(NarrationSource::Silence),
            None,
            &PlanOptions::default(),
        )
        .unwrap();
        let args = assemble(&plan, fx.dir.path().join("out.mp4"), &CodecProfile::Pro.encoding())
            .build_args();
        assert_eq!(value_after(&args, "-crf"), "18");
        assert_eq!(value_after(&args, "-preset"), "medium");
        assert_eq!(value_after(&args, "-b:a"), "192k");
    }
}
