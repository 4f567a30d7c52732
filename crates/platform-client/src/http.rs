//! HTTP transport built on reqwest
//!
//! Converts [`PlatformCall`]s into HTTP requests against a platform base URL
//! and maps non-2xx responses into [`PlatformError`]s.

use crate::transport::{
    HttpMethod, PlatformCall, PlatformError, PlatformResponse, PlatformTransport,
};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Response as ReqwestResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base API URL (e.g., "https://api.twitter.com")
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Bearer token sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
    /// Headers included in every request
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("Shield-Actions/{}", env!("CARGO_PKG_VERSION")),
            bearer_token: None,
            default_headers: HashMap::new(),
        }
    }
}

impl HttpTransportConfig {
    /// Create a new config with a base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the bearer token
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a default header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

/// Error body most platforms return
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// Transport
// =============================================================================

/// reqwest-backed [`PlatformTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: HttpTransportConfig) -> crate::Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PlatformError::new(0, "ClientBuildError", e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Get the transport configuration
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn parse_response(&self, response: ReqwestResponse) -> crate::Result<PlatformResponse> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(key.to_string(), value_str.to_string());
            }
        }

        let retry_after = headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();

            let mut error = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) if parsed.error.is_some() || parsed.message.is_some() => {
                    PlatformError::new(
                        status,
                        parsed.error.unwrap_or_else(|| "Unknown".to_string()),
                        parsed.message.unwrap_or_default(),
                    )
                }
                _ => PlatformError::new(status, "Unknown", format!("HTTP {}: {}", status, body)),
            };
            if let Some(delay) = retry_after {
                error = error.with_retry_after(delay);
            }
            return Err(error);
        }

        let body = response
            .text()
            .await
            .map_err(|e| {
                PlatformError::new(0, "ParseError", format!("Failed to read response: {}", e))
            })?;

        let data = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| {
                PlatformError::new(0, "ParseError", format!("Failed to parse JSON: {}", e))
            })?
        };

        Ok(PlatformResponse {
            status,
            headers,
            data,
        })
    }
}

#[async_trait]
impl PlatformTransport for HttpTransport {
    async fn send(&self, call: PlatformCall) -> crate::Result<PlatformResponse> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), call.endpoint);

        let mut req = match call.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Patch => self.client.patch(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };

        if !call.params.is_empty() {
            req = req.query(&call.params);
        }

        if let Some(token) = &self.config.bearer_token {
            req = req.bearer_auth(token);
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        for (key, value) in &call.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &call.body {
            req = req.json(body);
        }

        tracing::debug!(method = call.method.as_str(), url = %url, "Sending platform call");

        let response = req
            .send()
            .await
            .map_err(|e| PlatformError::network(format!("Request failed: {}", e)))?;

        self.parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("Shield-Actions/"));
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = HttpTransportConfig::new("https://discord.com/api/v10")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("ShieldBot/1.0")
            .with_bearer_token("token")
            .with_header("X-Audit-Log-Reason", "shield");

        assert_eq!(config.base_url, "https://discord.com/api/v10");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "ShieldBot/1.0");
        assert_eq!(config.bearer_token.as_deref(), Some("token"));
        assert_eq!(
            config.default_headers.get("X-Audit-Log-Reason"),
            Some(&"shield".to_string())
        );
    }

    #[test]
    fn test_transport_new() {
        let transport =
            HttpTransport::new(HttpTransportConfig::new("https://api.twitch.tv")).unwrap();
        assert_eq!(transport.base_url(), "https://api.twitch.tv");
    }
}
