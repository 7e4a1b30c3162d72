//! Composition compiler orchestrator.
//!
//! Ties the decoder, asset resolvers, planner, assembler and encoder runner
//! together for one request, and owns every file the request creates.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod scratch;
pub mod sink;
pub mod stream;

pub use config::CompilerConfig;
pub use error::{CompileError, CompileResult, ErrorKind};
pub use logging::RequestLogger;
pub use orchestrator::{CompileOptions, Compiler};
pub use scratch::ScratchDir;
pub use sink::{ChannelSink, EventSink, LoggingSink};
pub use stream::OutputStream;
