//! Compile event sinks.

use reel_models::CompileEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives compile progress events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CompileEvent);
}

/// Writes events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl EventSink for LoggingSink {
    fn emit(&self, event: CompileEvent) {
        match &event {
            CompileEvent::Encoding { request_id, percent } => {
                debug!(request_id = %request_id, percent = *percent, "Encoding");
            }
            CompileEvent::Failed {
                request_id,
                kind,
                message,
            } => {
                warn!(request_id = %request_id, kind = %kind, "Compile failed: {}", message);
            }
            other => {
                info!(
                    request_id = %other.request_id(),
                    stage = other.stage().as_str(),
                    "Compile stage reached"
                );
            }
        }
    }
}

/// Forwards events over a bounded channel; drops them when the receiver lags.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<CompileEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<CompileEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink and its receiver with room for `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CompileEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CompileEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("Dropping compile event: {}", e);
        }
    }
}
