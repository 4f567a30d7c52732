//! YouTube connector
//!
//! The Data API only lets a channel owner change a comment's moderation
//! status. Everything user-level goes through YouTube Studio by hand.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::connector::{ConnectorCore, PlatformConnector, DEFAULT_MANUAL_INSTRUCTIONS};
use crate::error::{ConnectorError, Result};
use crate::model::{ActionKind, ModerationOutcome, ModerationRequest};
use crate::YOUTUBE;
use async_trait::async_trait;
use platform_client::{
    HttpTransport, HttpTransportConfig, PlatformCall, PlatformError, PlatformTransport,
};
use std::sync::Arc;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

const REQUIRED_CREDENTIALS: &[&str] = &["access_token"];

/// Status applied to hidden comments
const HELD_FOR_REVIEW: &str = "heldForReview";

/// Error reasons Google returns with a 403 when a caller is throttled
const THROTTLE_REASONS: &[&str] = &["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"];

/// YouTube reports exhausted quota as 403 rather than 429
fn is_quota_error(error: &PlatformError) -> bool {
    if error.is_rate_limited() {
        return true;
    }
    error.status() == 403
        && THROTTLE_REASONS
            .iter()
            .any(|reason| error.code() == *reason || error.message().contains(reason))
}

/// YouTube Data API v3 connector
#[derive(Debug)]
pub struct YouTubeConnector {
    core: ConnectorCore,
}

impl YouTubeConnector {
    /// Create a connector over any transport
    pub fn new(transport: Arc<dyn PlatformTransport>, config: ConnectorConfig) -> Self {
        Self {
            core: ConnectorCore::new(YOUTUBE, transport, config, REQUIRED_CREDENTIALS)
                .with_rate_limit_classifier(is_quota_error),
        }
    }

    /// Create a connector that talks HTTP
    pub fn http(config: ConnectorConfig) -> Result<Self> {
        let mut http = HttpTransportConfig::new(config.base_url_or(DEFAULT_BASE_URL));
        if let Some(token) = config.credential("access_token") {
            http = http.with_bearer_token(token);
        }
        let transport =
            HttpTransport::new(http).map_err(|e| ConnectorError::platform_call(YOUTUBE, e))?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Create an HTTP connector from `YOUTUBE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::http(ConnectorConfig::from_env(YOUTUBE, REQUIRED_CREDENTIALS))
    }

    fn unsupported(&self, action: ActionKind) -> ModerationOutcome {
        self.core.escalate(action, self.manual_instructions(action))
    }
}

#[async_trait]
impl PlatformConnector for YouTubeConnector {
    fn platform(&self) -> &str {
        YOUTUBE
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize()
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::new(YOUTUBE)
            .with_support(ActionKind::HideContent)
            .with_rate_limit(ActionKind::HideContent, "10000 quota units per day")
            .with_scope("https://www.googleapis.com/auth/youtube.force-ssl")
            .with_fallback(ActionKind::ReportUser, None)
            .with_fallback(ActionKind::BlockUser, None)
            .with_fallback(ActionKind::UnblockUser, None)
    }

    async fn hide_content(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let comment_id = request.require_content_id()?;

        let call = PlatformCall::post("/youtube/v3/comments/setModerationStatus")
            .param("id", comment_id)
            .param("moderationStatus", HELD_FOR_REVIEW);
        self.core.send(call).await?;

        Ok(ModerationOutcome::executed(YOUTUBE, ActionKind::HideContent)
            .with_platform_action("set_moderation_status")
            .with_detail("commentId", comment_id)
            .with_detail("moderationStatus", HELD_FOR_REVIEW))
    }

    async fn report_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self.unsupported(ActionKind::ReportUser))
    }

    async fn block_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self.unsupported(ActionKind::BlockUser))
    }

    async fn unblock_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self.unsupported(ActionKind::UnblockUser))
    }

    fn manual_instructions(&self, action: ActionKind) -> String {
        match action {
            ActionKind::ReportUser => "Use YouTube Studio to report this user manually",
            ActionKind::BlockUser => "Block user through YouTube Studio interface",
            ActionKind::UnblockUser => "Unblock user through YouTube Studio interface",
            ActionKind::HideContent => DEFAULT_MANUAL_INSTRUCTIONS,
        }
        .to_string()
    }

    fn is_rate_limit_error(&self, error: &PlatformError) -> bool {
        self.core.is_rate_limit_error(error)
    }
}
