//! The action executor
//!
//! Single entry point for moderation actions. For each request it:
//!
//! 1. validates the identifying fields;
//! 2. resolves the platform connector;
//! 3. runs a supported action behind the circuit breaker and retry loop, or
//!    hands an unsupported one to the fallback resolver;
//! 4. audits and counts the result, whatever it was.

use crate::audit::{AuditEvent, AuditRecorder, TracingAuditRecorder};
use crate::circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerStatus};
use crate::config::ExecutorConfig;
use crate::error::{ExecutorError, Result};
use crate::fallback::{FallbackDecision, FallbackResolver};
use crate::metrics::{ExecutorMetrics, MetricsSnapshot, Tally};
use crate::retry::{Attempt, RetryConfig, RetryError};
use connectors::{
    ActionKind, ConnectorError, ConnectorRegistry, ModerationOutcome, ModerationRequest,
    PlatformCapabilities, PlatformConnector,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How a successful run should be counted and audited
struct Resolution {
    outcome: ModerationOutcome,
    tally: Tally,
    escalated_after_fallback_failure: bool,
}

impl Resolution {
    fn new(outcome: ModerationOutcome, tally: Tally) -> Self {
        Self {
            outcome,
            tally,
            escalated_after_fallback_failure: false,
        }
    }
}

/// Executes moderation actions against registered platforms
///
/// Share one executor behind an `Arc`; breaker state and metrics live in it
/// for the life of the process.
pub struct ActionExecutor {
    registry: ConnectorRegistry,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    resolver: FallbackResolver,
    audit: Arc<dyn AuditRecorder>,
    metrics: ExecutorMetrics,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("platforms", &self.registry.platforms())
            .field("circuit_breaker", self.breaker.config())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ActionExecutor {
    /// Create an executor that logs audit events through tracing
    pub fn new(registry: ConnectorRegistry, config: ExecutorConfig) -> Self {
        info!(
            platforms = ?registry.platforms(),
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_retries = config.retry.max_retries,
            "Action executor initialized"
        );

        Self {
            registry,
            breaker: CircuitBreaker::new(config.circuit_breaker),
            retry: config.retry,
            resolver: FallbackResolver::new(),
            audit: Arc::new(TracingAuditRecorder),
            metrics: ExecutorMetrics::new(),
        }
    }

    /// Send audit events to `recorder`
    pub fn with_audit_recorder(mut self, recorder: Arc<dyn AuditRecorder>) -> Self {
        self.audit = recorder;
        self
    }

    /// Execute one moderation action
    ///
    /// Unsupported actions are never errors: they run as a substitute or come
    /// back escalated for manual review.
    pub async fn execute(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let started = Instant::now();

        if let Err(invalid) = request.validate() {
            let platform = if request.platform.trim().is_empty() {
                "unknown"
            } else {
                request.platform.as_str()
            };
            self.metrics.record(platform, request.action, Tally::failed());
            warn!(
                organization = %request.organization_id,
                platform = %platform,
                action = %request.action,
                error = %invalid,
                "Rejected invalid Shield action"
            );
            return Err(invalid.into());
        }

        let Some(connector) = self.registry.get(&request.platform) else {
            let err = ExecutorError::UnknownPlatform {
                platform: request.platform.clone(),
            };
            return Err(self.fail(request, err, started).await);
        };

        let capabilities = connector.capabilities();
        let resolved = if capabilities.supports(request.action) {
            self.run_resilient(connector.as_ref(), request.action, request)
                .await
                .map(|outcome| Resolution::new(outcome, Tally::executed()))
        } else {
            Ok(self
                .handle_unsupported(connector.as_ref(), request, &capabilities)
                .await)
        };

        match resolved {
            Ok(resolution) => Ok(self.finish(request, resolution, started).await),
            Err(err) => Err(self.fail(request, err, started).await),
        }
    }

    async fn finish(
        &self,
        request: &ModerationRequest,
        resolution: Resolution,
        started: Instant,
    ) -> ModerationOutcome {
        let elapsed = started.elapsed();
        let outcome = resolution.outcome.with_execution_time(elapsed);

        self.metrics
            .record(&request.platform, request.action, resolution.tally);
        self.record_audit(AuditEvent::from_outcome(
            request,
            &outcome,
            elapsed,
            resolution.escalated_after_fallback_failure,
        ))
        .await;

        info!(
            organization = %request.organization_id,
            platform = %request.platform,
            action = %request.action,
            action_taken = %outcome.action,
            fallback = outcome.fallback.map(|f| f.as_str()),
            manual_review = outcome.requires_manual_review(),
            processing_time_ms = elapsed.as_millis() as u64,
            "Shield action completed"
        );

        outcome
    }

    async fn fail(
        &self,
        request: &ModerationRequest,
        err: ExecutorError,
        started: Instant,
    ) -> ExecutorError {
        let elapsed = started.elapsed();

        self.metrics
            .record(&request.platform, request.action, Tally::failed());
        self.record_audit(AuditEvent::from_error(request, &err, elapsed))
            .await;

        error!(
            organization = %request.organization_id,
            platform = %request.platform,
            action = %request.action,
            author = %request.external_author_id,
            error = %err,
            processing_time_ms = elapsed.as_millis() as u64,
            "Shield action execution failed"
        );

        err
    }

    async fn record_audit(&self, event: AuditEvent) {
        let organization = event.organization_id.clone();
        let platform = event.platform.clone();
        let action = event.action_taken.clone();

        if let Err(err) = self.audit.record(event).await {
            error!(
                organization = %organization,
                platform = %platform,
                action = %action,
                error = %err,
                "Failed to record Shield action"
            );
        }
    }

    /// Run `action` through the circuit breaker and retry loop
    ///
    /// The breaker is consulted once. Every failed attempt is recorded
    /// against it; a half-open probe gets a single attempt.
    async fn run_resilient(
        &self,
        connector: &dyn PlatformConnector,
        action: ActionKind,
        request: &ModerationRequest,
    ) -> Result<ModerationOutcome> {
        let platform = connector.platform();

        let permit = self.breaker.try_acquire(platform).inspect_err(|_| {
            warn!(
                platform = %platform,
                action = %action,
                "Circuit breaker is open, rejecting action"
            );
        })?;

        let max_attempts = if permit.is_probe() {
            1
        } else {
            self.retry.max_attempts()
        };

        let permit = &permit;
        let result = self
            .retry
            .run(max_attempts, move |attempt| async move {
                self.attempt(connector, action, request, permit, attempt).await
            })
            .await;

        match result {
            Ok((outcome, attempts)) => {
                if attempts > 1 {
                    debug!(
                        platform = %platform,
                        action = %action,
                        attempts,
                        "Action succeeded after retry"
                    );
                }
                Ok(outcome)
            }
            Err(RetryError {
                error,
                attempts,
                exhausted,
            }) => {
                if exhausted {
                    warn!(platform = %platform, action = %action, attempts, "Retries exhausted");
                }
                Err(error)
            }
        }
    }

    async fn attempt(
        &self,
        connector: &dyn PlatformConnector,
        action: ActionKind,
        request: &ModerationRequest,
        permit: &BreakerPermit,
        attempt: u32,
    ) -> Attempt<ModerationOutcome, ExecutorError> {
        let platform = connector.platform();

        if !connector.is_ready() {
            if let Err(err) = connector.initialize().await {
                return self.classify_error(connector, permit, action, attempt, err);
            }
        }

        match connector.perform(action, request).await {
            Ok(outcome) if outcome.success() => {
                permit.record_success();
                Attempt::Success(outcome)
            }
            Ok(outcome) => {
                let message = outcome
                    .error()
                    .unwrap_or("Platform did not confirm the action")
                    .to_string();
                self.record_attempt_failure(permit, action, attempt, &message);
                Attempt::Retryable(ExecutorError::PlatformCall {
                    platform: platform.to_string(),
                    action,
                    attempts: attempt,
                    message,
                    rate_limited: false,
                })
            }
            Err(err) => self.classify_error(connector, permit, action, attempt, err),
        }
    }

    /// Throttled attempts count against the breaker like any other failure
    /// and back off at least as long as the platform asked
    fn classify_error(
        &self,
        connector: &dyn PlatformConnector,
        permit: &BreakerPermit,
        action: ActionKind,
        attempt: u32,
        err: ConnectorError,
    ) -> Attempt<ModerationOutcome, ExecutorError> {
        if let Some(terminal) = ExecutorError::from_terminal(&err) {
            return Attempt::Fatal(terminal);
        }

        let rate_limited = match &err {
            ConnectorError::PlatformCall { source, .. } => connector.is_rate_limit_error(source),
            _ => false,
        };
        let message = err.to_string();
        self.record_attempt_failure(permit, action, attempt, &message);

        let error = ExecutorError::PlatformCall {
            platform: permit.platform().to_string(),
            action,
            attempts: attempt,
            message,
            rate_limited,
        };
        if rate_limited {
            Attempt::Throttled(error, err.retry_after())
        } else {
            Attempt::Retryable(error)
        }
    }

    fn record_attempt_failure(
        &self,
        permit: &BreakerPermit,
        action: ActionKind,
        attempt: u32,
        message: &str,
    ) {
        warn!(
            platform = %permit.platform(),
            action = %action,
            attempt,
            max_retries = self.retry.max_retries,
            error = %message,
            "Shield action attempt failed"
        );
        if permit.record_failure() {
            self.metrics.record_circuit_trip(permit.platform());
        }
    }

    async fn handle_unsupported(
        &self,
        connector: &dyn PlatformConnector,
        request: &ModerationRequest,
        capabilities: &PlatformCapabilities,
    ) -> Resolution {
        let action = request.action;
        let platform = connector.platform();

        let substitute = match self.resolver.resolve(action, capabilities) {
            FallbackDecision::Substitute(substitute) => substitute,
            FallbackDecision::Escalate => {
                info!(platform = %platform, action = %action, "Action requires manual review");
                return Resolution::new(self.escalate(connector, action), Tally::manual_review());
            }
        };

        info!(
            platform = %platform,
            original_action = %action,
            fallback_action = %substitute,
            "Executing fallback action"
        );

        match self.run_resilient(connector, substitute, request).await {
            Ok(outcome) => Resolution::new(outcome.as_fallback_for(action), Tally::fallback()),
            Err(err) => {
                warn!(
                    platform = %platform,
                    original_action = %action,
                    fallback_action = %substitute,
                    error = %err,
                    "Fallback action failed, escalating to manual review"
                );
                let outcome = self
                    .escalate(connector, action)
                    .with_detail("fallbackAction", substitute.as_str())
                    .with_detail("fallbackError", err.to_string());
                Resolution {
                    outcome,
                    tally: Tally {
                        fallback: true,
                        ..Tally::manual_review()
                    },
                    escalated_after_fallback_failure: true,
                }
            }
        }
    }

    fn escalate(&self, connector: &dyn PlatformConnector, action: ActionKind) -> ModerationOutcome {
        ModerationOutcome::escalated(
            connector.platform(),
            action,
            connector.manual_instructions(action),
        )
        .as_manual_review_for(action)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Copy of the process-wide metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Breaker status of every registered platform
    pub fn circuit_breaker_status(&self) -> BTreeMap<String, CircuitBreakerStatus> {
        self.registry
            .platforms()
            .into_iter()
            .map(|platform| {
                let status = self.breaker.status(&platform);
                (platform, status)
            })
            .collect()
    }

    /// Force a platform's breaker closed
    pub fn reset_circuit_breaker(&self, platform: &str) {
        self.breaker.reset(platform);
    }

    /// Capabilities of every registered platform
    pub fn capabilities(&self) -> BTreeMap<String, PlatformCapabilities> {
        self.registry.capabilities()
    }

    /// Registered platform ids
    pub fn supported_platforms(&self) -> Vec<String> {
        self.registry.platforms()
    }
}
