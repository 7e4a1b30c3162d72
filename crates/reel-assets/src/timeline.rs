//! Upstream timeline generator client.
//!
//! Posts a prompt plus the uploaded images to the workflow engine and hands
//! back the raw JSON bytes for the decoder.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{AssetError, AssetResult};
use crate::http::ensure_success;

#[derive(Debug, Clone)]
pub struct TimelineGeneratorConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for TimelineGeneratorConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TimelineGeneratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("TIMELINE_GENERATOR_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            api_key: std::env::var("TIMELINE_GENERATOR_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("TIMELINE_GENERATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

pub struct TimelineGenerator {
    http: Client,
    config: TimelineGeneratorConfig,
}

impl TimelineGenerator {
    pub fn new(config: TimelineGeneratorConfig) -> AssetResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AssetError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AssetResult<Self> {
        Self::new(TimelineGeneratorConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.url.is_some()
    }

    /// Ask the generator for a timeline describing `images`.
    pub async fn generate(&self, prompt: &str, images: &[PathBuf]) -> AssetResult<Vec<u8>> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or_else(|| AssetError::NotConfigured("TIMELINE_GENERATOR_URL".to_string()))?;

        let mut form = Form::new().text("prompt", prompt.to_string());
        for path in images {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|_| AssetError::MediaMissing(path.clone()))?;
            form = form
                .text("image_name", name.clone())
                .part("image", Part::bytes(bytes).file_name(name));
        }

        debug!(images = images.len(), "Requesting timeline from {}", url);

        let mut request = self.http.post(url).multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = ensure_success(request.send().await?).await?;

        let body = response.bytes().await?;
        serde_json::from_slice::<serde_json::Value>(&body)
            .map_err(|e| AssetError::InvalidResponse(format!("timeline is not JSON: {e}")))?;

        info!(bytes = body.len(), "Timeline generated");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> TimelineGenerator {
        TimelineGenerator::new(TimelineGeneratorConfig {
            url: Some(format!("{}/webhook", server.uri())),
            api_key: Some("secret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_posts_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"output": "{}"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        std::fs::write(&image, b"img").unwrap();

        let body = generator(&server)
            .generate("a sunny beach house", &[image])
            .await
            .unwrap();
        assert_eq!(body, br#"{"output": "{}"}"#);

        let requests = server.received_requests().await.unwrap();
        let sent = String::from_utf8_lossy(&requests[0].body);
        assert!(sent.contains("a sunny beach house"));
        assert!(sent.contains(r#"name="image"; filename="a.jpg""#));
    }

    #[tokio::test]
    async fn test_generate_rejects_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = generator(&server).generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, AssetError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let generator = TimelineGenerator::new(TimelineGeneratorConfig::default()).unwrap();
        assert!(!generator.is_configured());
        let err = generator.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, AssetError::NotConfigured(_)));
    }
}
