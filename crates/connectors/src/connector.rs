//! The platform connector contract
//!
//! A [`PlatformConnector`] translates the four canonical actions into calls
//! against one platform. [`ConnectorCore`] carries the plumbing every
//! connector shares: credential checks, the transport, and rate-limit
//! classification of transport errors.
//!
//! Connectors make exactly one platform call per action attempt. Throttled
//! calls surface as rate-limited errors carrying the platform's retry-after
//! hint; the caller decides whether and when to try again.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, Result};
use crate::model::{ActionKind, ModerationOutcome, ModerationRequest};
use async_trait::async_trait;
use platform_client::{PlatformCall, PlatformError, PlatformResponse, PlatformTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Instructions used when a platform has nothing more specific
pub const DEFAULT_MANUAL_INSTRUCTIONS: &str = "Manual action required through platform interface";

/// Executes moderation actions against one platform
///
/// Unsupported actions are not errors: they return an escalated outcome
/// carrying [`manual_instructions`](PlatformConnector::manual_instructions).
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Platform id (e.g. "twitter")
    fn platform(&self) -> &str;

    /// Check credentials and mark the connector ready; idempotent
    async fn initialize(&self) -> Result<()>;

    /// Whether `initialize()` has succeeded
    fn is_ready(&self) -> bool;

    /// What this platform supports natively
    fn capabilities(&self) -> PlatformCapabilities;

    /// Hide, delete or hold a piece of content
    async fn hide_content(&self, request: &ModerationRequest) -> Result<ModerationOutcome>;

    /// Report the author to the platform
    async fn report_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome>;

    /// Block or ban the author
    async fn block_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome>;

    /// Lift a block or ban
    async fn unblock_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome>;

    /// How an operator completes `action` by hand
    fn manual_instructions(&self, _action: ActionKind) -> String {
        DEFAULT_MANUAL_INSTRUCTIONS.to_string()
    }

    /// Whether a platform error means the call was throttled
    ///
    /// Connectors whose platform signals throttling in its own way override
    /// this together with [`ConnectorCore::with_rate_limit_classifier`].
    fn is_rate_limit_error(&self, error: &PlatformError) -> bool {
        error.is_rate_limited()
    }

    /// Dispatch `action` to the matching method
    async fn perform(
        &self,
        action: ActionKind,
        request: &ModerationRequest,
    ) -> Result<ModerationOutcome> {
        match action {
            ActionKind::HideContent => self.hide_content(request).await,
            ActionKind::ReportUser => self.report_user(request).await,
            ActionKind::BlockUser => self.block_user(request).await,
            ActionKind::UnblockUser => self.unblock_user(request).await,
        }
    }
}

/// Decides whether a transport error means the platform throttled the call
pub type RateLimitClassifier = fn(&PlatformError) -> bool;

/// Shared connector plumbing
pub struct ConnectorCore {
    platform: String,
    transport: Arc<dyn PlatformTransport>,
    config: ConnectorConfig,
    required_credentials: &'static [&'static str],
    rate_limit_classifier: RateLimitClassifier,
    initialized: AtomicBool,
}

impl std::fmt::Debug for ConnectorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorCore")
            .field("platform", &self.platform)
            .field("skip_validation", &self.config.skip_validation)
            .field("initialized", &self.is_ready())
            .finish()
    }
}

impl ConnectorCore {
    /// Create the core for a platform
    pub fn new(
        platform: impl Into<String>,
        transport: Arc<dyn PlatformTransport>,
        config: ConnectorConfig,
        required_credentials: &'static [&'static str],
    ) -> Self {
        Self {
            platform: platform.into(),
            transport,
            config,
            required_credentials,
            rate_limit_classifier: PlatformError::is_rate_limited,
            initialized: AtomicBool::new(false),
        }
    }

    /// Replace the default 429 check with a platform-specific one
    pub fn with_rate_limit_classifier(mut self, classifier: RateLimitClassifier) -> Self {
        self.rate_limit_classifier = classifier;
        self
    }

    /// Whether `error` means the platform throttled the call
    pub fn is_rate_limit_error(&self, error: &PlatformError) -> bool {
        (self.rate_limit_classifier)(error)
    }

    /// Platform id
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Connector configuration
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Credentials this platform needs
    pub fn required_credentials(&self) -> &'static [&'static str] {
        self.required_credentials
    }

    /// Check credentials unless validation is skipped
    pub fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        if !self.config.skip_validation {
            if let Some(missing) = self
                .required_credentials
                .iter()
                .find(|key| self.config.credential(key).is_none())
            {
                return Err(ConnectorError::configuration(
                    &self.platform,
                    format!("missing credential '{}'", missing),
                ));
            }
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            platform = %self.platform,
            skip_validation = self.config.skip_validation,
            "Connector initialized"
        );
        Ok(())
    }

    /// Whether the connector has been initialized
    pub fn is_ready(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Send a single call
    ///
    /// Transport errors are wrapped with the connector's rate-limit
    /// classification; the platform's retry-after hint stays on the source.
    pub async fn send(&self, call: PlatformCall) -> Result<PlatformResponse> {
        self.initialize()?;

        match self.transport.send(call).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let rate_limited = self.is_rate_limit_error(&error);
                if rate_limited {
                    tracing::warn!(
                        platform = %self.platform,
                        retry_after_ms = error.retry_after().map(|d| d.as_millis() as u64),
                        "Platform throttled the call"
                    );
                }
                Err(ConnectorError::classified(&self.platform, error, rate_limited))
            }
        }
    }

    /// Escalated outcome for an action this platform cannot perform
    pub fn escalate(&self, action: ActionKind, instructions: String) -> ModerationOutcome {
        tracing::info!(
            platform = %self.platform,
            action = %action,
            "Action not supported, manual review required"
        );
        ModerationOutcome::escalated(&self.platform, action, instructions)
    }
}
