//! Axum HTTP API server for reel compilation.
//!
//! This crate provides:
//! - Multipart compile endpoint streaming `video/mp4`
//! - Optional API-key authentication, rate limiting and security headers
//! - Prometheus metrics and health probes

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
