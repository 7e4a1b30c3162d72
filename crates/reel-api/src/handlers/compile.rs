//! Compile endpoint.
//!
//! Accepts the media files and timeline as multipart, runs the compiler and
//! streams the MP4 back without buffering it.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Extension;
use futures_util::Stream;
use reel_compiler::{CompileOptions, OutputStream};
use reel_models::CodecProfile;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Read size when streaming the encoded output.
const STREAM_CHUNK: usize = 64 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct CompileQuery {
    #[serde(default)]
    pub profile: Option<String>,
}

/// Parsed multipart upload. Media files live in `dir`.
struct CompileUpload {
    dir: TempDir,
    images: Vec<PathBuf>,
    schema: Option<Vec<u8>>,
    prompt: Option<String>,
    bytes: u64,
}

/// Flags the compile as cancelled when the handler future is dropped.
struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

/// `POST /api/compile?profile=reels|pro`
pub async fn compile(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<CompileQuery>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let profile = query
        .profile
        .as_deref()
        .unwrap_or_default()
        .parse::<CodecProfile>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    run_compile(state, request_id, profile, multipart).await
}

/// `POST /api/compile/pro`
pub async fn compile_pro(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    multipart: Multipart,
) -> ApiResult<Response> {
    run_compile(state, request_id, CodecProfile::Pro, multipart).await
}

async fn run_compile(
    state: AppState,
    request_id: Option<Extension<RequestId>>,
    profile: CodecProfile,
    multipart: Multipart,
) -> ApiResult<Response> {
    let request_id = request_id
        .map(|Extension(RequestId(id))| id)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let upload = read_upload(multipart).await?;
    metrics::record_upload(upload.bytes);
    if upload.images.is_empty() {
        return Err(ApiError::bad_request("at least one image is required"));
    }

    let schema = match (upload.schema, upload.prompt.as_deref()) {
        (Some(schema), _) => schema,
        (None, Some(prompt)) => match &state.timeline {
            Some(generator) => {
                let generated = generator.generate(prompt, &upload.images).await;
                metrics::record_timeline_generated(if generated.is_ok() { "success" } else { "error" });
                generated.map_err(ApiError::Timeline)?
            }
            None => {
                return Err(ApiError::bad_request(
                    "no schema supplied and no timeline generator is configured",
                ))
            }
        },
        (None, None) => return Err(ApiError::bad_request("missing schema field")),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let _cancel = CancelOnDrop(cancel_tx);

    info!(
        request_id = %request_id,
        profile = %profile,
        images = upload.images.len(),
        "Compiling reel"
    );

    let mut output = state
        .compiler
        .compile(
            &schema,
            &upload.images,
            CompileOptions::default()
                .with_profile(profile)
                .with_cancel(cancel_rx)
                .with_request_id(request_id),
        )
        .await?;

    // Uploads must outlive the stream that reads the output
    output.hold(upload.dir);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, output.len())
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"reel.mp4\"",
        )
        .body(Body::from_stream(body_stream(output)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Save `image` parts to a temp dir in arrival order; collect text fields.
async fn read_upload(mut multipart: Multipart) -> ApiResult<CompileUpload> {
    let dir = tempfile::Builder::new()
        .prefix("reel-upload-")
        .tempdir()
        .map_err(|e| ApiError::internal(format!("failed to create upload dir: {}", e)))?;

    let mut upload = CompileUpload {
        images: Vec::new(),
        schema: None,
        prompt: None,
        bytes: 0,
        dir,
    };

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "images" => {
                let file_name = upload_file_name(upload.images.len(), field.file_name());
                let path = upload.dir.path().join(file_name);
                upload.bytes += save_field(&mut field, &path).await?;
                upload.images.push(path);
            }
            "schema" => upload.schema = Some(field.bytes().await?.to_vec()),
            "prompt" => upload.prompt = Some(field.text().await?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(upload)
}

async fn save_field(
    field: &mut axum::extract::multipart::Field<'_>,
    path: &Path,
) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("failed to store upload: {}", e)))?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("failed to store upload: {}", e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("failed to store upload: {}", e)))?;
    Ok(written)
}

/// `000-photo.jpg`; the index keeps caller order and avoids collisions.
fn upload_file_name(index: usize, original: Option<&str>) -> String {
    let cleaned: String = original
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        format!("{:03}-image", index)
    } else {
        format!("{:03}-{}", index, cleaned)
    }
}

/// Chunked reader over the output; dropping it releases the scratch dir.
fn body_stream(output: OutputStream) -> impl Stream<Item = io::Result<Bytes>> {
    futures_util::stream::unfold(Some(output), |state| async move {
        let mut output = state?;
        let mut buf = vec![0u8; STREAM_CHUNK];
        match output.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(output)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name(0, Some("beach.jpg")), "000-beach.jpg");
        assert_eq!(upload_file_name(12, Some("../../etc/passwd")), "012-passwd");
        assert_eq!(upload_file_name(3, Some("my photo (1).png")), "003-my_photo__1_.png");
        assert_eq!(upload_file_name(1, Some(".hidden")), "001-hidden");
        assert_eq!(upload_file_name(2, None), "002-image");
    }
}
