//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Maximum stderr lines kept for diagnostics.
pub const STDERR_TAIL_LINES: usize = 64;
/// Maximum stderr bytes kept for diagnostics.
pub const STDERR_TAIL_BYTES: usize = 8 * 1024;
/// How long to wait for stderr to close once the process is gone.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
/// How long the encoder gets to exit after SIGTERM before it is killed.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// One `-i` input with its input options.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub args: Vec<String>,
    pub source: String,
}

impl FfmpegInput {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Generated source through the `lavfi` virtual device.
    pub fn lavfi(graph: impl Into<String>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: graph.into(),
        }
    }

    /// Limit how much of this input is read.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.args.push("-t".to_string());
        self.args.push(format!("{:.3}", seconds));
        self
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a command writing to `output` with no inputs yet.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Append an input; inputs are indexed in insertion order.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Drop video streams.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Bounded tail of encoder diagnostics.
#[derive(Debug, Default)]
pub struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    pub fn push(&mut self, line: &str) {
        let line = if line.len() > STDERR_TAIL_BYTES {
            let mut cut = STDERR_TAIL_BYTES;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            &line[..cut]
        } else {
            line
        };

        self.bytes += line.len();
        self.lines.push_back(line.to_string());

        while self.lines.len() > STDERR_TAIL_LINES || self.bytes > STDERR_TAIL_BYTES {
            match self.lines.pop_front() {
                Some(dropped) => self.bytes -= dropped.len(),
                None => break,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Explicit binary; resolved from PATH when unset
    program: Option<PathBuf>,
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific encoder binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run a command and open its output for streaming.
    ///
    /// Fails when the encoder exits cleanly but leaves an empty or missing file.
    pub async fn run_to_file<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<tokio::fs::File>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        self.run_with_progress(cmd, progress_callback).await?;

        let output = cmd.output_path();
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(tokio::fs::File::open(output).await?),
            _ => Err(MediaError::EmptyOutput(output.to_path_buf())),
        }
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => check_ffmpeg()?,
        };

        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines drive the callback, everything else is diagnostics
        let stderr_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail = StderrTail::default();

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current_progress) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    tail.push(&line);
                }
            }
            tail
        });

        let result = self.wait_for_completion(&mut child).await;

        let tail = match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, stderr_handle).await {
            Ok(Ok(tail)) => tail,
            _ => StderrTail::default(),
        };

        let status = result?;
        if status.success() {
            Ok(())
        } else {
            let message = match status.code() {
                Some(code) => format!("FFmpeg exited with status {}", code),
                None => "FFmpeg terminated by signal".to_string(),
            };
            Err(MediaError::ffmpeg_failed(
                message,
                (!tail.is_empty()).then(|| tail.into_string()),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let deadline = async {
            match self.timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        let cancelled = async {
            match self.cancel_rx.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // Sender gone; nobody can cancel any more
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = deadline => WaitOutcome::TimedOut,
            _ = cancelled => WaitOutcome::Cancelled,
        };

        match outcome {
            WaitOutcome::Exited(status) => Ok(status?),
            WaitOutcome::TimedOut => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, stopping process", secs);
                terminate(child).await;
                Err(MediaError::Timeout(secs))
            }
            WaitOutcome::Cancelled => {
                info!("FFmpeg cancelled, stopping process");
                terminate(child).await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

/// Ask the encoder to stop with SIGTERM, killing it if it is still
/// running after [`TERMINATE_GRACE`].
async fn terminate(child: &mut Child) {
    if send_sigterm(child) {
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(Ok(_)) => return,
            _ => debug!("FFmpeg ignored SIGTERM, killing process"),
        }
    }
    let _ = child.kill().await;
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Resolve the encoder binary, honouring an explicit override.
pub fn resolve_ffmpeg(program: Option<&Path>) -> MediaResult<PathBuf> {
    match program {
        Some(path) => which::which(path).map_err(|_| MediaError::FfmpegNotFound),
        None => check_ffmpeg(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::file("a.jpg"))
            .input(FfmpegInput::lavfi("anullsrc").duration(6.0))
            .map("[vout]")
            .audio_codec("aac");

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-progress", "pipe:2", "-i", "a.jpg", "-f", "lavfi", "-t",
                "6.000", "-i", "anullsrc", "-map", "[vout]", "-c:a", "aac", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        let mut tail = StderrTail::default();
        for i in 0..200 {
            tail.push(&format!("line {i}"));
        }
        let text = tail.into_string();
        assert_eq!(text.lines().count(), STDERR_TAIL_LINES);
        assert!(text.ends_with("line 199"));

        let mut tail = StderrTail::default();
        tail.push(&"x".repeat(STDERR_TAIL_BYTES * 2));
        tail.push("last");
        assert!(tail.into_string().len() <= STDERR_TAIL_BYTES);
    }

    #[cfg(unix)]
    mod runner {
        use super::super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::{Arc, Mutex};

        fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("ffmpeg");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_run_success_writes_output_and_reports_progress() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(
                dir.path(),
                "echo out_time_us=1000000 >&2\necho progress=continue >&2\n\
                 echo progress=end >&2\nfor last; do :; done\necho data > \"$last\"",
            );
            let output = dir.path().join("out.mp4");
            let cmd = FfmpegCommand::new(&output).input(FfmpegInput::file("a.jpg"));

            let seen = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            let file = FfmpegRunner::new()
                .with_program(&program)
                .run_to_file(&cmd, move |p| sink.lock().unwrap().push(p))
                .await;

            assert!(file.is_ok());
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 2);
            assert!(seen[1].is_complete);
            assert_eq!(seen[0].out_time_ms, 1000);
        }

        #[tokio::test]
        async fn test_run_failure_carries_stderr_tail() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "echo 'No such filter: bogus' >&2\nexit 1");
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));

            let err = FfmpegRunner::new()
                .with_program(&program)
                .run_with_progress(&cmd, |_| {})
                .await
                .unwrap_err();

            match err {
                MediaError::FfmpegFailed {
                    stderr, exit_code, ..
                } => {
                    assert_eq!(exit_code, Some(1));
                    assert_eq!(stderr.as_deref(), Some("No such filter: bogus"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_run_empty_output_is_error() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "exit 0");
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));

            let err = FfmpegRunner::new()
                .with_program(&program)
                .run_to_file(&cmd, |_| {})
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::EmptyOutput(_)));
        }

        #[tokio::test]
        async fn test_run_cancel_kills_process() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "exec sleep 30");
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));
            let (tx, rx) = watch::channel(false);

            let runner = FfmpegRunner::new().with_program(&program).with_cancel(rx);
            let started = std::time::Instant::now();
            let handle = tokio::spawn(async move { runner.run_with_progress(&cmd, |_| {}).await });

            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();

            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, MediaError::Cancelled));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_cancel_sends_sigterm_before_kill() {
            let dir = tempfile::tempdir().unwrap();
            let marker = dir.path().join("terminated");
            let program = fake_ffmpeg(
                dir.path(),
                &format!(
                    "trap 'echo term > {}; exit 255' TERM\nsleep 30 >/dev/null 2>&1 &\nwait",
                    marker.display()
                ),
            );
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));
            let (tx, rx) = watch::channel(false);

            let runner = FfmpegRunner::new().with_program(&program).with_cancel(rx);
            let handle = tokio::spawn(async move { runner.run_with_progress(&cmd, |_| {}).await });

            tokio::time::sleep(Duration::from_millis(200)).await;
            let started = std::time::Instant::now();
            tx.send(true).unwrap();

            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, MediaError::Cancelled));
            assert!(started.elapsed() < TERMINATE_GRACE);
            assert_eq!(std::fs::read_to_string(&marker).unwrap(), "term\n");
        }

        #[tokio::test]
        async fn test_run_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_ffmpeg(dir.path(), "exec sleep 30");
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));

            let err = FfmpegRunner::new()
                .with_program(&program)
                .with_timeout(1)
                .run_with_progress(&cmd, |_| {})
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::Timeout(1)));
        }

        #[tokio::test]
        async fn test_already_cancelled_never_spawns() {
            let dir = tempfile::tempdir().unwrap();
            let marker = dir.path().join("spawned");
            let program = fake_ffmpeg(dir.path(), &format!("touch {}", marker.display()));
            let cmd = FfmpegCommand::new(dir.path().join("out.mp4"));
            let (_tx, rx) = watch::channel(true);

            let err = FfmpegRunner::new()
                .with_program(&program)
                .with_cancel(rx)
                .run_with_progress(&cmd, |_| {})
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::Cancelled));
            assert!(!marker.exists());
        }
    }
}
