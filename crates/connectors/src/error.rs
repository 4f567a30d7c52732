//! Connector error types

use crate::model::ValidationError;
use platform_client::PlatformError;
use std::time::Duration;

/// Error returned by a platform connector
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The request lacks a field the action needs
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The connector is missing credentials or is otherwise misconfigured
    #[error("{platform} connector is not configured: {message}")]
    Configuration {
        /// Platform id
        platform: String,
        /// What is wrong
        message: String,
    },

    /// The platform rejected or never answered a call
    #[error("{platform} call failed: {source}")]
    PlatformCall {
        /// Platform id
        platform: String,
        /// Underlying transport error
        #[source]
        source: PlatformError,
        /// Whether the platform throttled the call
        rate_limited: bool,
    },

    /// A platform response could not be interpreted
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Create a configuration error
    pub fn configuration(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            platform: platform.into(),
            message: message.into(),
        }
    }

    /// Wrap a transport error, treating only HTTP 429 as throttling
    pub fn platform_call(platform: impl Into<String>, source: PlatformError) -> Self {
        let rate_limited = source.is_rate_limited();
        Self::classified(platform, source, rate_limited)
    }

    /// Wrap a transport error the connector has already classified
    pub fn classified(
        platform: impl Into<String>,
        source: PlatformError,
        rate_limited: bool,
    ) -> Self {
        Self::PlatformCall {
            platform: platform.into(),
            source,
            rate_limited,
        }
    }

    /// How long the platform asked callers to back off, if it said
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::PlatformCall { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Whether the platform refused the call for lack of permission
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::PlatformCall { source, .. } if source.is_forbidden())
    }

    /// Whether the platform throttled the call
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::PlatformCall { rate_limited: true, .. })
    }
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
