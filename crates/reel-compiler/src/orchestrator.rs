//! The compile pipeline.
//!
//! decode → scratch dir → narration ∥ music → plan → assemble → encode → stream.
//! The scratch directory is the only place files are written; every error
//! path drops it, and the success path hands it to the returned
//! [`OutputStream`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reel_assets::{
    resolve_music, resolve_narration, validate_media, AssetError, MusicGeneration, VoiceOver,
};
use reel_media::{
    assemble, plan, resolve_ffmpeg, validate_references, FfmpegRunner, MediaResult,
    NarrationSource, PlanError,
};
use reel_models::{decode, CodecProfile, CompileEvent, TimelineDocument};
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::logging::RequestLogger;
use crate::scratch::ScratchDir;
use crate::sink::{EventSink, LoggingSink};
use crate::stream::OutputStream;

/// File name of the encoded output inside the scratch directory.
pub const OUTPUT_FILE: &str = "output.mp4";

/// Per-request options.
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub profile: CodecProfile,
    /// Flips to `true` when the caller gives up on the request
    pub cancel: Option<watch::Receiver<bool>>,
    pub sink: Option<Arc<dyn EventSink>>,
    /// Caller-supplied id; a UUID is generated when absent
    pub request_id: Option<String>,
}

impl CompileOptions {
    pub fn with_profile(mut self, profile: CodecProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl std::fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOptions")
            .field("profile", &self.profile)
            .field("cancellable", &self.cancel.is_some())
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Compiles timelines into MP4 streams.
#[derive(Clone)]
pub struct Compiler {
    voice: Arc<dyn VoiceOver>,
    music: Arc<dyn MusicGeneration>,
    config: CompilerConfig,
}

struct RequestContext {
    request_id: String,
    logger: RequestLogger,
    sink: Arc<dyn EventSink>,
    cancel: Option<watch::Receiver<bool>>,
    profile: CodecProfile,
}

impl RequestContext {
    fn emit(&self, event: CompileEvent) {
        self.sink.emit(event);
    }

    fn runner(&self, program: &Option<PathBuf>) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(program) = program {
            runner = runner.with_program(program);
        }
        if let Some(cancel) = &self.cancel {
            runner = runner.with_cancel(cancel.clone());
        }
        runner
    }
}

impl Compiler {
    pub fn new(
        voice: Arc<dyn VoiceOver>,
        music: Arc<dyn MusicGeneration>,
        config: CompilerConfig,
    ) -> Self {
        Self {
            voice,
            music,
            config,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Check that the encoder binary can be located.
    pub fn check_encoder(&self) -> MediaResult<PathBuf> {
        resolve_ffmpeg(self.config.ffmpeg_path.as_deref())
    }

    /// Compile `schema` against `media_paths` into a readable MP4 stream.
    ///
    /// `media_paths` must stay valid until the returned stream is released;
    /// attach their owner with [`OutputStream::hold`] to tie the lifetimes.
    pub async fn compile(
        &self,
        schema: &[u8],
        media_paths: &[PathBuf],
        options: CompileOptions,
    ) -> CompileResult<OutputStream> {
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let operation = format!("compile_{}", options.profile);
        let ctx = RequestContext {
            logger: RequestLogger::new(&request_id, &operation),
            request_id,
            sink: options.sink.clone().unwrap_or_else(|| Arc::new(LoggingSink)),
            cancel: options.cancel.clone(),
            profile: options.profile,
        };

        let started = Instant::now();
        let span = ctx.logger.create_span();
        let result = self
            .compile_inner(&ctx, schema, media_paths)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(stream) => {
                ctx.logger
                    .log_completion(&format!("{} bytes ready to stream", stream.len()));
                "success"
            }
            Err(e) => {
                ctx.logger.log_error(e.kind().as_str(), &e.to_string());
                ctx.emit(CompileEvent::Failed {
                    request_id: ctx.request_id.clone(),
                    kind: e.kind().as_str().to_string(),
                    message: e.to_string(),
                });
                e.kind().as_str()
            }
        };

        metrics::counter!("reel_compile_total", "outcome" => outcome).increment(1);
        metrics::histogram!("reel_compile_duration_seconds", "profile" => ctx.profile.as_str())
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn compile_inner(
        &self,
        ctx: &RequestContext,
        schema: &[u8],
        media_paths: &[PathBuf],
    ) -> CompileResult<OutputStream> {
        ctx.logger
            .log_start(&format!("{} media file(s)", media_paths.len()));
        check_cancelled(ctx)?;

        let document = decode(schema)?;
        if !document.metadata.aspect_ratio_consistent() {
            ctx.logger.log_warning(&format!(
                "aspect ratio {} disagrees with resolution {}; using resolution",
                document.metadata.aspect_ratio, document.metadata.resolution
            ));
        }
        ctx.emit(CompileEvent::Decoded {
            request_id: ctx.request_id.clone(),
            segments: document.image_timeline.len(),
            duration: document.canvas_duration(),
        });

        // Reject bad references before paying for any asset
        validate_references(&document, media_paths.len())?;
        validate_media(media_paths).await.map_err(|e| match e {
            AssetError::MediaMissing(path) => CompileError::from(PlanError::MissingInput(path)),
            other => CompileError::Io(std::io::Error::other(other.to_string())),
        })?;

        let scratch = ScratchDir::create(self.config.scratch_dir.as_deref(), &ctx.request_id)?;

        let (narration, music) = self.resolve_assets(ctx, &document, &scratch).await?;
        ctx.emit(CompileEvent::AssetsResolved {
            request_id: ctx.request_id.clone(),
            narration: narration.is_some(),
            music: music.is_some(),
        });

        let narration = match narration {
            Some(handle) => NarrationSource::File(handle),
            None => NarrationSource::Silence,
        };
        let plan = plan(
            &document,
            media_paths,
            Some(narration),
            music.as_ref(),
            &self.config.plan_options(),
        )?;
        ctx.emit(CompileEvent::Planned {
            request_id: ctx.request_id.clone(),
            inputs: plan.input_count(),
        });

        let output = scratch.path().join(OUTPUT_FILE);
        let command = assemble(&plan, &output, &ctx.profile.encoding());

        let timeout_secs = self.config.encoder_timeout_secs(plan.canvas.duration);
        ctx.logger.log_progress(&format!(
            "encoding {} input(s), {:.3}s canvas, {}s deadline",
            plan.input_count(),
            plan.canvas.duration,
            timeout_secs
        ));

        let runner = ctx
            .runner(&self.config.ffmpeg_path)
            .with_timeout(timeout_secs);
        let file = runner
            .run_to_file(
                &command,
                progress_reporter(ctx, (plan.canvas.duration * 1000.0) as i64),
            )
            .await
            .map_err(CompileError::from_encoder)?;

        let len = file.metadata().await?.len();
        ctx.emit(CompileEvent::Completed {
            request_id: ctx.request_id.clone(),
            bytes: len,
        });

        Ok(OutputStream::new(file, scratch, len, ctx.request_id.clone()))
    }

    /// Resolve narration and music concurrently, each under the asset deadline.
    async fn resolve_assets(
        &self,
        ctx: &RequestContext,
        document: &TimelineDocument,
        scratch: &ScratchDir,
    ) -> CompileResult<(
        Option<reel_models::AssetHandle>,
        Option<reel_models::AssetHandle>,
    )> {
        let deadline = self.config.asset_timeout;
        let trim_runner = ctx.runner(&self.config.ffmpeg_path);

        let narration = async {
            tokio::time::timeout(
                deadline,
                resolve_narration(
                    self.voice.as_ref(),
                    &document.text_timeline.segments,
                    scratch.path(),
                ),
            )
            .await
            .unwrap_or(Err(AssetError::Timeout(deadline)))
            .map_err(CompileError::from_narration)
        };
        let music = async {
            tokio::time::timeout(
                deadline,
                resolve_music(
                    self.music.as_ref(),
                    &document.music,
                    scratch.path(),
                    &trim_runner,
                ),
            )
            .await
            .unwrap_or(Err(AssetError::Timeout(deadline)))
            .map_err(CompileError::from_music)
        };

        let both = async { tokio::join!(narration, music) };
        let (narration, music) = match ctx.cancel.clone() {
            Some(cancel) => tokio::select! {
                settled = both => settled,
                _ = wait_for_cancel(cancel) => return Err(CompileError::Cancelled),
            },
            None => both.await,
        };

        Ok((narration?, music?))
    }
}

fn check_cancelled(ctx: &RequestContext) -> CompileResult<()> {
    match &ctx.cancel {
        Some(rx) if *rx.borrow() => Err(CompileError::Cancelled),
        _ => Ok(()),
    }
}

/// Resolves once the flag is set; never resolves if the sender goes away.
async fn wait_for_cancel(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Forward whole-percent encoder progress to the sink.
fn progress_reporter(
    ctx: &RequestContext,
    total_ms: i64,
) -> impl Fn(reel_media::FfmpegProgress) + Send + 'static {
    let sink = Arc::clone(&ctx.sink);
    let request_id = ctx.request_id.clone();
    let last = AtomicU8::new(u8::MAX);

    move |progress| {
        let percent = progress.percentage(total_ms).clamp(0.0, 100.0) as u8;
        if last.swap(percent, Ordering::Relaxed) != percent {
            sink.emit(CompileEvent::Encoding {
                request_id: request_id.clone(),
                percent,
            });
        }
    }
}
