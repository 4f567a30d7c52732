//! Audit trail for moderation actions
//!
//! Every finished action produces one [`AuditEvent`]. The original content
//! text is personal data, so an event keeps it only when the action targeted
//! the content itself (a hide) or when a request explicitly flagged as a
//! content violation was escalated. User-level actions and plain escalations
//! never store it.

use crate::error::ExecutorError;
use crate::{PROCESSED_BY, VERSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use connectors::{ActionKind, ModerationOutcome, ModerationRequest};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// Reason recorded when the request carried none
pub const DEFAULT_ACTION_REASON: &str = "Shield action executed by action executor";

/// Name of the component writing audit events
pub const EXECUTOR_NAME: &str = "ActionExecutor";

// ============================================================================
// Errors
// ============================================================================

/// Error returned by an audit backend
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The backend rejected or could not store the event
    #[error("Audit backend error: {0}")]
    Backend(String),

    /// The event could not be encoded
    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Event
// ============================================================================

/// Final status of an audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The platform performed the action
    Executed,
    /// The action failed or was rejected
    Failed,
    /// The action was handed to manual review
    Escalated,
}

/// What happened, in detail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    /// Action the caller asked for
    pub original_action: ActionKind,
    /// Whether a substitute or manual review replaced it
    pub fallback_used: bool,
    /// Whether a human must finish it
    pub requires_manual_review: bool,
    /// Whether a substitute was tried, failed, and the action was escalated
    pub escalated_after_fallback_failure: bool,
    /// Whether the action taken targeted content rather than a user
    pub content_based: bool,
    /// Whether the retention rule was applied
    pub gdpr_compliant: bool,
    /// Connector-reported details
    pub platform_details: serde_json::Map<String, serde_json::Value>,
    /// Time spent on the action
    pub execution_time_ms: u64,
    /// Failure description, for failed actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GDPR retention summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprCompliance {
    /// Whether the event stores the original text
    pub pii_stored: bool,
    /// Legal basis for processing
    pub reason: String,
}

/// Who wrote the event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    /// Writing component
    pub executor: String,
    /// Crate version
    pub version: String,
    /// When the event was built
    pub timestamp: DateTime<Utc>,
    /// Retention summary
    pub gdpr_compliance: GdprCompliance,
}

/// One audited moderation action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Organization the action ran for
    pub organization_id: String,
    /// User who triggered it
    pub user_id: Option<String>,
    /// Platform id
    pub platform: String,
    /// Connected platform account
    pub account_ref: Option<String>,
    /// Offending content id
    pub external_content_id: String,
    /// Author id
    pub external_author_id: String,
    /// Author username
    pub external_author_username: Option<String>,
    /// Original content, kept only when retention allows
    pub original_text: Option<String>,
    /// Action actually taken: a canonical action or `manual_review`
    pub action_taken: String,
    /// Why the action was taken
    pub action_reason: String,
    /// Final status
    pub action_status: ActionStatus,
    /// Details
    pub action_details: AuditDetails,
    /// Always `shield_action_executor`
    pub processed_by: String,
    /// Time from request to audit
    pub processing_time_ms: u64,
    /// Writer metadata
    pub metadata: AuditMetadata,
}

impl AuditEvent {
    /// Build the event for a finished outcome
    pub fn from_outcome(
        request: &ModerationRequest,
        outcome: &ModerationOutcome,
        processing_time: Duration,
        escalated_after_fallback_failure: bool,
    ) -> Self {
        let status = if outcome.requires_manual_review() {
            ActionStatus::Escalated
        } else if outcome.success() {
            ActionStatus::Executed
        } else {
            ActionStatus::Failed
        };

        let action_taken = match outcome.fallback {
            Some(fallback) => fallback.to_string(),
            None if status == ActionStatus::Escalated => "manual_review".to_string(),
            None => outcome.action.to_string(),
        };

        let execution_time = if outcome.execution_time.is_zero() {
            processing_time
        } else {
            outcome.execution_time
        };

        let details = AuditDetails {
            original_action: outcome.original_action.unwrap_or(request.action),
            fallback_used: outcome.fallback.is_some(),
            requires_manual_review: outcome.requires_manual_review(),
            escalated_after_fallback_failure,
            content_based: false,
            gdpr_compliant: true,
            platform_details: outcome.details.clone(),
            execution_time_ms: millis(execution_time),
            error: outcome.error().map(str::to_string),
        };

        Self::build(request, action_taken, status, details, processing_time)
    }

    /// Build the event for an action that ended in an error
    pub fn from_error(
        request: &ModerationRequest,
        error: &ExecutorError,
        processing_time: Duration,
    ) -> Self {
        let mut platform_details = serde_json::Map::new();
        platform_details.insert("platform".to_string(), request.platform.clone().into());
        platform_details.insert("errorKind".to_string(), error.kind().into());

        let details = AuditDetails {
            original_action: request.action,
            fallback_used: false,
            requires_manual_review: false,
            escalated_after_fallback_failure: false,
            content_based: false,
            gdpr_compliant: true,
            platform_details,
            execution_time_ms: millis(processing_time),
            error: Some(error.to_string()),
        };

        Self::build(
            request,
            request.action.to_string(),
            ActionStatus::Failed,
            details,
            processing_time,
        )
    }

    fn build(
        request: &ModerationRequest,
        action_taken: String,
        status: ActionStatus,
        mut details: AuditDetails,
        processing_time: Duration,
    ) -> Self {
        let content_based = action_taken
            .parse::<ActionKind>()
            .is_ok_and(|action| action.is_content_based());
        let retain_text = content_based
            || (status == ActionStatus::Escalated && request.content_violation);
        let original_text = if retain_text {
            request.original_text.clone()
        } else {
            None
        };
        details.content_based = content_based;

        let action_reason = if request.reason.trim().is_empty() {
            DEFAULT_ACTION_REASON.to_string()
        } else {
            request.reason.clone()
        };

        Self {
            organization_id: request.organization_id.clone(),
            user_id: request.user_id.clone(),
            platform: request.platform.clone(),
            account_ref: request.account_ref.clone(),
            external_content_id: request.external_content_id.clone(),
            external_author_id: request.external_author_id.clone(),
            external_author_username: request.external_author_username.clone(),
            metadata: AuditMetadata {
                executor: EXECUTOR_NAME.to_string(),
                version: VERSION.to_string(),
                timestamp: Utc::now(),
                gdpr_compliance: GdprCompliance {
                    pii_stored: original_text.is_some(),
                    reason: "content_moderation".to_string(),
                },
            },
            original_text,
            action_taken,
            action_reason,
            action_status: status,
            action_details: details,
            processed_by: PROCESSED_BY.to_string(),
            processing_time_ms: millis(processing_time),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Recorders
// ============================================================================

/// Destination for audit events
///
/// Failures are reported to the caller, which logs them; they never change
/// the outcome of the audited action.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    /// Store one event
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Keeps events in memory for inspection
#[derive(Debug, Default)]
pub struct InMemoryAuditRecorder {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Most recent event
    pub fn last(&self) -> Option<AuditEvent> {
        self.events.lock().last().cloned()
    }

    /// Number of events recorded
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop all events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditRecorder {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Writes each event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditRecorder;

#[async_trait]
impl AuditRecorder for TracingAuditRecorder {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let details = serde_json::to_string(&event.action_details)?;
        tracing::info!(
            target: "shield_audit",
            organization = %event.organization_id,
            platform = %event.platform,
            content_id = %event.external_content_id,
            author_id = %event.external_author_id,
            action_taken = %event.action_taken,
            status = ?event.action_status,
            pii_stored = event.metadata.gdpr_compliance.pii_stored,
            processing_time_ms = event.processing_time_ms,
            details = %details,
            "Shield action audited"
        );
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditRecorder;

#[async_trait]
impl AuditRecorder for NoopAuditRecorder {
    async fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}
