//! Compile progress events.
//!
//! Emitted by the orchestrator to whatever sink the caller provides
//! (server-sent events, logs, tests).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompileStage {
    Decoded,
    AssetsResolved,
    Planned,
    Encoding,
    Completed,
    Failed,
}

impl CompileStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompileStage::Decoded => "decoded",
            CompileStage::AssetsResolved => "assets_resolved",
            CompileStage::Planned => "planned",
            CompileStage::Encoding => "encoding",
            CompileStage::Completed => "completed",
            CompileStage::Failed => "failed",
        }
    }
}

/// Progress event for one compile request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CompileEvent {
    /// Timeline parsed and validated
    Decoded {
        #[serde(rename = "requestId")]
        request_id: String,
        segments: usize,
        duration: f64,
    },

    /// Narration and music settled
    AssetsResolved {
        #[serde(rename = "requestId")]
        request_id: String,
        narration: bool,
        music: bool,
    },

    /// Filter graph planned
    Planned {
        #[serde(rename = "requestId")]
        request_id: String,
        inputs: usize,
    },

    /// Encoder progress (0-100)
    Encoding {
        #[serde(rename = "requestId")]
        request_id: String,
        percent: u8,
    },

    /// Output ready to stream
    Completed {
        #[serde(rename = "requestId")]
        request_id: String,
        bytes: u64,
    },

    Failed {
        #[serde(rename = "requestId")]
        request_id: String,
        kind: String,
        message: String,
    },
}

impl CompileEvent {
    pub fn stage(&self) -> CompileStage {
        match self {
            CompileEvent::Decoded { .. } => CompileStage::Decoded,
            CompileEvent::AssetsResolved { .. } => CompileStage::AssetsResolved,
            CompileEvent::Planned { .. } => CompileStage::Planned,
            CompileEvent::Encoding { .. } => CompileStage::Encoding,
            CompileEvent::Completed { .. } => CompileStage::Completed,
            CompileEvent::Failed { .. } => CompileStage::Failed,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            CompileEvent::Decoded { request_id, .. }
            | CompileEvent::AssetsResolved { request_id, .. }
            | CompileEvent::Planned { request_id, .. }
            | CompileEvent::Encoding { request_id, .. }
            | CompileEvent::Completed { request_id, .. }
            | CompileEvent::Failed { request_id, .. } => request_id,
        }
    }
}
