//! Transport abstraction shared by all platform connectors
//!
//! A connector never talks to the network directly. It builds a
//! [`PlatformCall`] and hands it to a [`PlatformTransport`], which either
//! performs a real HTTP request or simulates one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Types
// =============================================================================

/// Error returned by a platform call
///
/// Carries the HTTP status (0 for failures that never reached the platform),
/// a short error code, a human-readable message and, for throttled calls, the
/// delay the platform asked us to wait.
///
/// # Examples
/// ```
/// use platform_client::PlatformError;
///
/// let error = PlatformError::new(429, "TooManyRequests", "Slow down");
/// assert!(error.is_rate_limited());
/// assert!(error.is_network_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    status: u16,
    code: String,
    message: String,
    retry_after: Option<Duration>,
}

impl PlatformError {
    /// Create a new platform error
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create an error for a request that never produced a response
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, "NetworkError", message)
    }

    /// Create a rate limit error with an optional retry-after hint
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(429, "RateLimited", message)
        }
    }

    /// Attach a retry-after hint
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Delay requested by the platform before the next call, if any
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Check if the platform throttled the call
    pub fn is_rate_limited(&self) -> bool {
        self.status == 429 || self.code == "RateLimited"
    }

    /// Check if the caller lacks permission for the call
    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// Check if this is a transient failure worth retrying
    ///
    /// Statuses: 0 (no response), 408, 425, 429, 500, 502, 503, 504, 522, 524
    pub fn is_network_error(&self) -> bool {
        matches!(
            self.status,
            0 | 408 | 425 | 429 | 500 | 502 | 503 | 504 | 522 | 524
        )
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "platform error {}: {} - {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for PlatformError {}

// =============================================================================
// Request Types
// =============================================================================

/// HTTP method for platform calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// PATCH request
    Patch,
    /// DELETE request
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A single call against a platform API
///
/// The endpoint is relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformCall {
    /// HTTP method
    pub method: HttpMethod,
    /// Endpoint path (e.g. "/2/tweets/123/hidden")
    pub endpoint: String,
    /// Query parameters
    pub params: HashMap<String, String>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
}

impl PlatformCall {
    /// Create a new call
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params: HashMap::new(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Create a GET call
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    /// Create a POST call
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    /// Create a PUT call
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, endpoint)
    }

    /// Create a PATCH call
    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, endpoint)
    }

    /// Create a DELETE call
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Successful response from a platform call
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Parsed JSON body (`Null` for empty bodies)
    pub data: serde_json::Value,
}

impl PlatformResponse {
    /// Create a new response
    pub fn new(status: u16, data: serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            data,
        }
    }

    /// Create a 204 response with no body
    pub fn no_content() -> Self {
        Self::new(204, serde_json::Value::Null)
    }

    /// Get a header value
    pub fn header(&self, key: &str) -> Option<&String> {
        self.headers.get(key)
    }

    /// Check if the response is successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Sends platform calls
///
/// Implementations must be safe to share between concurrent moderation
/// actions.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// Send a call and return the parsed response
    async fn send(&self, call: PlatformCall) -> crate::Result<PlatformResponse>;
}
