//! Canonical moderation request and outcome types
//!
//! Every platform speaks the same four actions. A [`ModerationRequest`]
//! describes one action Shield wants taken; a [`ModerationOutcome`] describes
//! what actually happened, which may be a different action (fallback) or a
//! hand-off to a human (manual review).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Validation
// ============================================================================

/// A request is missing a field, or a field has an unusable value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    /// A required field is absent or empty
    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("Required field '{}' is missing", field),
            field,
        }
    }

    /// A field is present but invalid
    pub fn invalid(field: impl Into<String>, detail: impl fmt::Display) -> Self {
        let field = field.into();
        Self {
            message: format!("Invalid value for '{}': {}", field, detail),
            field,
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        &self.field
    }
}

// ============================================================================
// Actions
// ============================================================================

/// The four canonical moderation actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Hide, delete or hold a piece of content
    #[serde(alias = "hideComment")]
    HideContent,
    /// Report the author to the platform
    ReportUser,
    /// Block or ban the author
    BlockUser,
    /// Lift a previous block or ban
    UnblockUser,
}

impl ActionKind {
    /// All actions, in canonical order
    pub const ALL: [ActionKind; 4] = [
        ActionKind::HideContent,
        ActionKind::ReportUser,
        ActionKind::BlockUser,
        ActionKind::UnblockUser,
    ];

    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HideContent => "hideContent",
            Self::ReportUser => "reportUser",
            Self::BlockUser => "blockUser",
            Self::UnblockUser => "unblockUser",
        }
    }

    /// Whether the action targets a piece of content rather than a user
    pub fn is_content_based(&self) -> bool {
        matches!(self, Self::HideContent)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(ValidationError::missing("action")),
            "hideContent" | "hideComment" => Ok(Self::HideContent),
            "reportUser" => Ok(Self::ReportUser),
            "blockUser" => Ok(Self::BlockUser),
            "unblockUser" => Ok(Self::UnblockUser),
            other => Err(ValidationError::invalid(
                "action",
                format!(
                    "{}. Valid actions: hideContent, reportUser, blockUser, unblockUser",
                    other
                ),
            )),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// One moderation action Shield wants executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    /// Target platform id (e.g. "twitter")
    pub platform: String,
    /// Organization on whose behalf the action runs
    pub organization_id: String,
    /// Platform id of the offending content
    #[serde(default)]
    pub external_content_id: String,
    /// Platform id of the content's author
    #[serde(default)]
    pub external_author_id: String,
    /// Author's username, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_author_username: Option<String>,
    /// User who triggered the action, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The organization's connected account on the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_ref: Option<String>,
    /// Requested action
    pub action: ActionKind,
    /// Why Shield decided to act
    #[serde(default)]
    pub reason: String,
    /// Text of the offending content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    /// Marks the request as a content violation, so an escalation keeps the text
    #[serde(default)]
    pub content_violation: bool,
    /// Platform-specific extras (channelId, guildId, broadcasterId, ...)
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ModerationRequest {
    /// Create a request for an action on a platform
    pub fn new(
        platform: impl Into<String>,
        organization_id: impl Into<String>,
        action: ActionKind,
    ) -> Self {
        Self {
            platform: platform.into(),
            organization_id: organization_id.into(),
            external_content_id: String::new(),
            external_author_id: String::new(),
            external_author_username: None,
            user_id: None,
            account_ref: None,
            action,
            reason: String::new(),
            original_text: None,
            content_violation: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the offending content id
    pub fn with_content(mut self, content_id: impl Into<String>) -> Self {
        self.external_content_id = content_id.into();
        self
    }

    /// Set the author id and username
    pub fn with_author(mut self, author_id: impl Into<String>, username: Option<String>) -> Self {
        self.external_author_id = author_id.into();
        self.external_author_username = username;
        self
    }

    /// Set the requesting user
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the connected account reference
    pub fn with_account_ref(mut self, account_ref: impl Into<String>) -> Self {
        self.account_ref = Some(account_ref.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the original content text
    pub fn with_original_text(mut self, text: impl Into<String>) -> Self {
        self.original_text = Some(text.into());
        self
    }

    /// Flag the request as a content violation
    pub fn flag_content_violation(mut self) -> Self {
        self.content_violation = true;
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the fields every request needs regardless of platform
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("organizationId", &self.organization_id),
            ("platform", &self.platform),
            ("externalContentId", &self.external_content_id),
            ("externalAuthorId", &self.external_author_id),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::missing(field));
            }
        }
        Ok(())
    }

    /// The content id, or a validation error
    pub fn require_content_id(&self) -> Result<&str, ValidationError> {
        non_empty("externalContentId", &self.external_content_id)
    }

    /// The author id, or a validation error
    pub fn require_author_id(&self) -> Result<&str, ValidationError> {
        non_empty("externalAuthorId", &self.external_author_id)
    }

    /// A string metadata value, if present
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// A string metadata value, or a validation error naming the key
    pub fn require_metadata(&self, key: &str) -> Result<&str, ValidationError> {
        self.metadata_str(key).ok_or_else(|| ValidationError::missing(key))
    }

    /// A numeric metadata value, if present
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64())
    }
}

fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::missing(field))
    } else {
        Ok(value)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// How an action ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Disposition {
    /// The platform performed the action
    Executed,
    /// No automated path; a human must finish the action
    Escalated {
        /// What the operator should do
        instructions: String,
    },
    /// The platform refused or did not confirm the action
    Failed {
        /// Description of the failure
        error: String,
    },
}

/// Fallback applied to an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedFallback {
    /// A substitute action was executed
    Action(ActionKind),
    /// The action was handed to manual review
    ManualReview,
}

impl AppliedFallback {
    /// Wire name of the fallback
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action(action) => action.as_str(),
            Self::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for AppliedFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AppliedFallback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Result of one moderation action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOutcome {
    /// Platform the action ran against
    pub platform: String,
    /// Action actually attempted (may differ from the one requested)
    pub action: ActionKind,
    /// How the action ended
    pub disposition: Disposition,
    /// Structured, platform-specific details; always contains `platform`
    pub details: serde_json::Map<String, serde_json::Value>,
    /// Fallback applied, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<AppliedFallback>,
    /// Requested action, echoed when a fallback occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_action: Option<ActionKind>,
    /// Wall time spent producing the outcome
    #[serde(rename = "executionTimeMs", serialize_with = "serialize_millis")]
    pub execution_time: Duration,
    /// When the outcome was produced
    pub completed_at: DateTime<Utc>,
}

impl ModerationOutcome {
    fn with_disposition(platform: &str, action: ActionKind, disposition: Disposition) -> Self {
        let mut details = serde_json::Map::new();
        details.insert("platform".to_string(), platform.into());
        Self {
            platform: platform.to_string(),
            action,
            disposition,
            details,
            fallback: None,
            original_action: None,
            execution_time: Duration::ZERO,
            completed_at: Utc::now(),
        }
    }

    /// The platform performed the action
    pub fn executed(platform: &str, action: ActionKind) -> Self {
        Self::with_disposition(platform, action, Disposition::Executed)
    }

    /// The platform refused or did not confirm the action
    pub fn failed(platform: &str, action: ActionKind, error: impl Into<String>) -> Self {
        Self::with_disposition(platform, action, Disposition::Failed { error: error.into() })
    }

    /// The action needs a human
    pub fn escalated(platform: &str, action: ActionKind, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        Self::with_disposition(
            platform,
            action,
            Disposition::Escalated {
                instructions: instructions.clone(),
            },
        )
        .with_detail("originalAction", action.as_str())
        .with_detail("reason", "Action not supported by platform API")
        .with_detail("manualInstructions", instructions)
    }

    /// Add a detail entry
    pub fn with_detail(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Record the platform's own name for what was done (e.g. "ban_user")
    pub fn with_platform_action(self, name: &str) -> Self {
        self.with_detail("platformAction", name)
    }

    /// Set the execution time
    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = elapsed;
        self
    }

    /// Mark this outcome as a fallback executed in place of `original`
    pub fn as_fallback_for(mut self, original: ActionKind) -> Self {
        self.fallback = Some(AppliedFallback::Action(self.action));
        self.original_action = Some(original);
        self
    }

    /// Mark this escalation as the manual-review fallback for `original`
    pub fn as_manual_review_for(mut self, original: ActionKind) -> Self {
        self.fallback = Some(AppliedFallback::ManualReview);
        self.original_action = Some(original);
        self
    }

    /// Executed or escalated
    pub fn success(&self) -> bool {
        !matches!(self.disposition, Disposition::Failed { .. })
    }

    /// A human must finish the action
    pub fn requires_manual_review(&self) -> bool {
        matches!(self.disposition, Disposition::Escalated { .. })
    }

    /// Failure description, for failed outcomes
    pub fn error(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Operator instructions, for escalated outcomes
    pub fn instructions(&self) -> Option<&str> {
        match &self.disposition {
            Disposition::Escalated { instructions } => Some(instructions),
            _ => None,
        }
    }

    /// Platform-specific action name, when the connector reported one
    pub fn platform_action(&self) -> Option<&str> {
        self.details.get("platformAction").and_then(|v| v.as_str())
    }
}
