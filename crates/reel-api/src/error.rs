//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reel_assets::AssetError;
use reel_compiler::{CompileError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Non-standard "client closed request".
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Timeline generation failed: {0}")]
    Timeline(AssetError),

    #[error("{0}")]
    Compile(#[from] CompileError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Taxonomy string reported as `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "auth",
            ApiError::BadRequest(_) => "request",
            ApiError::Timeline(_) => "asset.timeline",
            ApiError::Compile(e) => e.kind().as_str(),
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeline(_) => StatusCode::BAD_GATEWAY,
            ApiError::Compile(e) => match e.kind() {
                ErrorKind::Decode | ErrorKind::Plan => StatusCode::BAD_REQUEST,
                ErrorKind::AssetNarration | ErrorKind::AssetMusic => StatusCode::BAD_GATEWAY,
                ErrorKind::Encoder | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::Compile(e) => e.diagnostics().map(str::to_string),
            _ => None,
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::BadRequest(format!("invalid multipart body: {}", err.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let error = match &self {
            ApiError::Internal(_) => {
                if std::env::var("APP_ENV").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            status: "error",
            kind: self.kind(),
            error,
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}
