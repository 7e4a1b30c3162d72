//! API configuration.

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per client IP
    pub rate_limit_rps: u32,
    /// Max request body size (uploads included)
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Shared secret for `/api`; ignored in development
    pub api_key: Option<String>,
    pub metrics_enabled: bool,
    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP`; only behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 5,
            max_body_size: 100 * 1024 * 1024, // 100MB
            environment: "development".to_string(),
            api_key: None,
            metrics_enabled: true,
            trust_proxy_headers: false,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024),
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            api_key: std::env::var("API_KEY").ok().filter(|s| !s.is_empty()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            trust_proxy_headers: std::env::var("TRUST_PROXY_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "development"
    }

    /// The key `/api` requests must present, if any.
    pub fn required_api_key(&self) -> Option<&str> {
        if self.is_development() {
            return None;
        }
        self.api_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_bypassed_in_development() {
        let config = ApiConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(config.required_api_key().is_none());

        let config = ApiConfig {
            environment: "production".to_string(),
            ..config
        };
        assert!(config.is_production());
        assert_eq!(config.required_api_key(), Some("secret"));
    }
}
