//! Asset resolution for one compile request.
//!
//! Every file created here lands in the caller-supplied request directory;
//! the caller owns that directory and removes it.

use std::path::{Path, PathBuf};

use reel_media::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use reel_models::{AssetHandle, Music, TextSegment};
use tracing::{debug, info};

use crate::error::{AssetError, AssetResult};
use crate::music::MusicGeneration;
use crate::voice::VoiceOver;

/// Fixed length of the background music stem.
pub const MUSIC_STEM_SECONDS: f64 = 30.0;
/// File name of the trimmed music stem inside the request directory.
pub const MUSIC_FILE: &str = "music.mp3";

/// Synthesise narration for the spoken text segments.
///
/// Returns `None` without calling the voice provider when no segment has text.
pub async fn resolve_narration(
    voice: &dyn VoiceOver,
    segments: &[TextSegment],
    dest_dir: &Path,
) -> AssetResult<Option<AssetHandle>> {
    let spoken: Vec<String> = segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| s.text.clone())
        .collect();

    if spoken.is_empty() {
        debug!("No spoken text; skipping narration");
        return Ok(None);
    }

    let handle = voice.generate_voice_over(&spoken, dest_dir).await?;
    info!(segments = spoken.len(), "Narration resolved: {}", handle.basename());
    Ok(Some(handle))
}

/// Pick, fetch and trim a music clip.
///
/// Returns `None` when music is disabled or has no genre.
pub async fn resolve_music(
    music: &dyn MusicGeneration,
    settings: &Music,
    dest_dir: &Path,
    runner: &FfmpegRunner,
) -> AssetResult<Option<AssetHandle>> {
    if !settings.enabled || settings.genre.trim().is_empty() {
        return Ok(None);
    }

    let source = music.generate_music(&settings.genre, dest_dir).await?;
    let trimmed = trim_music(runner, source.path(), dest_dir).await?;

    // Downloaded originals are no longer needed once the stem exists
    if source.owning_dir().is_some() && source.path() != trimmed.path() {
        let _ = tokio::fs::remove_file(source.path()).await;
    }

    info!(genre = %settings.genre, "Music resolved: {}", trimmed.basename());
    Ok(Some(trimmed))
}

/// Re-encode the first [`MUSIC_STEM_SECONDS`] of `source` into `dest_dir`.
pub async fn trim_music(
    runner: &FfmpegRunner,
    source: &Path,
    dest_dir: &Path,
) -> AssetResult<AssetHandle> {
    let output = dest_dir.join(MUSIC_FILE);
    let cmd = music_trim_command(source, &output);
    runner.run_to_file(&cmd, |_| {}).await?;
    Ok(AssetHandle::owned(output, dest_dir))
}

/// `ffmpeg -i source -vn -t 30 -c:a libmp3lame -b:a 192k output`
pub fn music_trim_command(source: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(FfmpegInput::file(source))
        .no_video()
        .duration(MUSIC_STEM_SECONDS)
        .audio_codec("libmp3lame")
        .audio_bitrate("192k")
}

/// Check every media path exists, failing on the first missing one.
pub async fn validate_media(paths: &[PathBuf]) -> AssetResult<()> {
    for path in paths {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(AssetError::MediaMissing(path.clone())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reel_models::TextPosition;
    use std::sync::Mutex;

    struct RecordingVoice {
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl VoiceOver for RecordingVoice {
        async fn generate_voice_over(
            &self,
            segments: &[String],
            dest_dir: &Path,
        ) -> AssetResult<AssetHandle> {
            self.calls.lock().unwrap().push(segments.to_vec());
            let path = dest_dir.join("narration.mp3");
            std::fs::write(&path, b"mp3")?;
            Ok(AssetHandle::owned(path, dest_dir))
        }
    }

    struct PanickingMusic;

    #[async_trait]
    impl MusicGeneration for PanickingMusic {
        async fn generate_music(&self, _genre: &str, _dest_dir: &Path) -> AssetResult<AssetHandle> {
            panic!("music must not be requested");
        }
    }

    fn text(body: &str) -> TextSegment {
        TextSegment {
            text: body.to_string(),
            start_time: 0.0,
            duration: 1.0,
            position: TextPosition::Center,
            narrative_source: String::new(),
        }
    }

    #[tokio::test]
    async fn test_narration_joins_spoken_segments_in_order() {
        let voice = RecordingVoice {
            calls: Mutex::new(Vec::new()),
        };
        let dir = tempfile::tempdir().unwrap();

        let handle = resolve_narration(&voice, &[text("One"), text(" "), text("Two")], dir.path())
            .await
            .unwrap();

        assert!(handle.is_some());
        assert_eq!(
            *voice.calls.lock().unwrap(),
            vec![vec!["One".to_string(), "Two".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_narration_skipped_without_text() {
        let voice = RecordingVoice {
            calls: Mutex::new(Vec::new()),
        };
        let dir = tempfile::tempdir().unwrap();

        let handle = resolve_narration(&voice, &[text(""), text("  ")], dir.path())
            .await
            .unwrap();
        assert!(handle.is_none());
        assert!(voice.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_music_disabled_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let disabled = Music {
            enabled: false,
            genre: "upbeat".to_string(),
            volume: 0.3,
        };
        let no_genre = Music {
            enabled: true,
            genre: String::new(),
            volume: 0.3,
        };
        let runner = FfmpegRunner::new();

        for settings in [disabled, no_genre] {
            let handle = resolve_music(&PanickingMusic, &settings, dir.path(), &runner)
                .await
                .unwrap();
            assert!(handle.is_none());
        }
    }

    #[test]
    fn test_music_trim_command() {
        let args = music_trim_command(Path::new("in.mp3"), Path::new("/tmp/r/music.mp3"))
            .build_args();
        let tail: Vec<&str> = args.iter().skip(5).map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "-i", "in.mp3", "-vn", "-t", "30.000", "-c:a", "libmp3lame", "-b:a", "192k",
                "/tmp/r/music.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_validate_media_fails_on_first_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        std::fs::write(&present, b"img").unwrap();
        let missing = dir.path().join("b.jpg");
        let also_missing = dir.path().join("c.jpg");

        assert!(validate_media(&[present.clone()]).await.is_ok());
        match validate_media(&[present, missing.clone(), also_missing]).await {
            Err(AssetError::MediaMissing(path)) => assert_eq!(path, missing),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_trim_music_with_fake_encoder() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("ffmpeg");
        std::fs::write(
            &program,
            "#!/bin/sh\nfor last; do :; done\necho trimmed > \"$last\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = dir.path().join("source.mp3");
        std::fs::write(&source, b"long clip").unwrap();

        let runner = FfmpegRunner::new().with_program(&program);
        let handle = trim_music(&runner, &source, dir.path()).await.unwrap();
        assert_eq!(handle.basename(), MUSIC_FILE);
        assert_eq!(std::fs::read_to_string(handle.path()).unwrap(), "trimmed\n");
    }
}
