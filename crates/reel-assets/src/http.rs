//! Shared HTTP helpers for asset collaborators.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::{AssetError, AssetResult};

/// Execute with retry logic.
pub(crate) async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> AssetResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AssetResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                warn!(
                    "Asset request failed (attempt {}), retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fail on non-2xx, keeping a bounded slice of the body.
pub(crate) async fn ensure_success(response: reqwest::Response) -> AssetResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AssetError::upstream(status.as_u16(), &body))
}

/// Stream a response body into `dest`; returns bytes written.
pub(crate) async fn stream_to_file(response: reqwest::Response, dest: &Path) -> AssetResult<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        return Err(AssetError::InvalidResponse("empty response body".to_string()));
    }
    Ok(written)
}
