#![deny(unreachable_patterns)]
//! FFmpeg planning and execution for reel compilation.
//!
//! This crate provides:
//! - The filter-graph planner producing a typed `CompilationPlan`
//! - The command assembler lowering a plan to one ffmpeg argument vector
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - A runner with cancellation, timeouts and bounded stderr diagnostics

pub mod assemble;
pub mod command;
pub mod error;
pub mod filters;
pub mod plan;
pub mod progress;

pub use assemble::{assemble, build_graph, ArgumentVector, RenderedGraph};
pub use command::{
    check_ffmpeg, resolve_ffmpeg, FfmpegCommand, FfmpegInput, FfmpegRunner, StderrTail,
};
pub use error::{MediaError, MediaResult, PlanError};
pub use filters::{escape_drawtext, position_xy};
pub use plan::{
    clamp01, plan, AudioPlan, Canvas, CompilationPlan, NarrationSource, Overlay, OverlayTiming,
    PlanOptions, VisualSegment, validate_references,
};
pub use progress::FfmpegProgress;
