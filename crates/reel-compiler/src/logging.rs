//! Structured request logging utilities.

use tracing::{error, info, warn, Span};

/// Logger carrying the request id and operation on every line.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    request_id: String,
    operation: String,
}

impl RequestLogger {
    /// Create a new logger for a specific request and operation.
    ///
    /// # Arguments
    /// * `request_id` - The unique identifier for the request
    /// * `operation` - The type of operation (e.g., "compile", "compile_pro")
    pub fn new(request_id: &str, operation: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            "Compile started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            "Compile progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            "Compile warning: {}", message
        );
    }

    /// Log a failure with its taxonomy kind.
    pub fn log_error(&self, kind: &str, message: &str) {
        error!(
            request_id = %self.request_id,
            operation = %self.operation,
            kind = %kind,
            "Compile failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            operation = %self.operation,
            "Compile completed: {}", message
        );
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this request.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "compile",
            request_id = %self.request_id,
            operation = %self.operation
        )
    }
}
