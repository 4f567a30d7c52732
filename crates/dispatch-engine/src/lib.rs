//! Resilient dispatch of moderation actions
//!
//! [`ActionExecutor`] is the single entry point. It resolves a platform
//! connector, substitutes or escalates actions the platform cannot perform,
//! runs the connector call behind a per-platform circuit breaker and a
//! jittered retry loop, and reports every outcome to an [`AuditRecorder`] and
//! to process-wide [`ExecutorMetrics`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod metrics;
pub mod retry;

pub use audit::{
    ActionStatus, AuditDetails, AuditError, AuditEvent, AuditRecorder, InMemoryAuditRecorder,
    NoopAuditRecorder, TracingAuditRecorder,
};
pub use circuit_breaker::{
    BreakerPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState,
};
pub use config::{ConfigError, ExecutorConfig};
pub use error::{ExecutorError, Result};
pub use executor::ActionExecutor;
pub use fallback::{FallbackDecision, FallbackResolver};
pub use metrics::{ActionCounters, ExecutorMetrics, MetricsSnapshot, Tally};
pub use retry::{Attempt, RetryConfig, RetryError};

/// Name recorded as the processor of every audit event
pub const PROCESSED_BY: &str = "shield_action_executor";

/// Version recorded in audit metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
