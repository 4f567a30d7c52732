//! Executor error types

use connectors::{ActionKind, ConnectorError, ValidationError};
use std::time::Duration;

/// Error returned by [`ActionExecutor::execute`](crate::ActionExecutor::execute)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    /// The request is malformed
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// No connector is registered for the platform
    #[error("No connector registered for platform '{platform}'")]
    UnknownPlatform {
        /// Requested platform id
        platform: String,
    },

    /// The connector is missing credentials
    #[error("{platform} connector is not configured: {message}")]
    Configuration {
        /// Platform id
        platform: String,
        /// What is wrong
        message: String,
    },

    /// The platform's circuit breaker is rejecting calls
    #[error("Circuit breaker open for {platform}, retry in {}ms", retry_in.as_millis())]
    CircuitOpen {
        /// Platform id
        platform: String,
        /// Time until a probe is allowed
        retry_in: Duration,
    },

    /// Every attempt failed
    #[error("{action} on {platform} failed after {attempts} attempt(s): {message}")]
    PlatformCall {
        /// Platform id
        platform: String,
        /// Action attempted
        action: ActionKind,
        /// Attempts made
        attempts: u32,
        /// Last failure
        message: String,
        /// Whether the last failure was a rate limit
        rate_limited: bool,
    },
}

impl ExecutorError {
    /// Convert a connector error that should not be retried
    ///
    /// Returns `None` for errors the retry loop handles.
    pub(crate) fn from_terminal(error: &ConnectorError) -> Option<Self> {
        match error {
            ConnectorError::Validation(v) => Some(Self::Validation(v.clone())),
            ConnectorError::Configuration { platform, message } => Some(Self::Configuration {
                platform: platform.clone(),
                message: message.clone(),
            }),
            _ => None,
        }
    }

    /// Platform the error relates to, when known
    pub fn platform(&self) -> Option<&str> {
        match self {
            Self::Validation(_) => None,
            Self::UnknownPlatform { platform }
            | Self::Configuration { platform, .. }
            | Self::CircuitOpen { platform, .. }
            | Self::PlatformCall { platform, .. } => Some(platform),
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownPlatform { .. } => "unknown_platform",
            Self::Configuration { .. } => "configuration",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::PlatformCall { .. } => "platform_call",
        }
    }
}

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, ExecutorError>;
