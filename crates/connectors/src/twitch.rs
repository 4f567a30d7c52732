//! Twitch connector
//!
//! Bans and unbans chatters through Helix. Chat messages are ephemeral, so
//! there is no hide action; a refused ban degrades to a timeout.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::connector::{ConnectorCore, PlatformConnector, DEFAULT_MANUAL_INSTRUCTIONS};
use crate::error::{ConnectorError, Result};
use crate::model::{ActionKind, ModerationOutcome, ModerationRequest};
use crate::TWITCH;
use async_trait::async_trait;
use platform_client::{HttpTransport, HttpTransportConfig, PlatformCall, PlatformTransport};
use serde_json::json;
use std::sync::Arc;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv";

/// Timeout applied when a ban is refused
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Longest timeout Helix accepts (two weeks)
pub const MAX_TIMEOUT_SECONDS: u64 = 1_209_600;

const REQUIRED_CREDENTIALS: &[&str] = &["access_token", "client_id"];

const BANS_ENDPOINT: &str = "/helix/moderation/bans";

/// Twitch Helix connector
#[derive(Debug)]
pub struct TwitchConnector {
    core: ConnectorCore,
}

struct Channel<'a> {
    broadcaster_id: &'a str,
    moderator_id: &'a str,
}

impl TwitchConnector {
    /// Create a connector over any transport
    pub fn new(transport: Arc<dyn PlatformTransport>, config: ConnectorConfig) -> Self {
        Self {
            core: ConnectorCore::new(TWITCH, transport, config, REQUIRED_CREDENTIALS),
        }
    }

    /// Create a connector that talks HTTP
    pub fn http(config: ConnectorConfig) -> Result<Self> {
        let mut http = HttpTransportConfig::new(config.base_url_or(DEFAULT_BASE_URL));
        if let Some(token) = config.credential("access_token") {
            http = http.with_bearer_token(token);
        }
        if let Some(client_id) = config.credential("client_id") {
            http = http.with_header("Client-Id", client_id);
        }
        let transport =
            HttpTransport::new(http).map_err(|e| ConnectorError::platform_call(TWITCH, e))?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Create an HTTP connector from `TWITCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::http(ConnectorConfig::from_env(TWITCH, REQUIRED_CREDENTIALS))
    }

    fn channel(request: &ModerationRequest) -> Result<Channel<'_>> {
        let broadcaster_id = request.require_metadata("broadcasterId")?;
        let moderator_id = request.metadata_str("moderatorId").unwrap_or(broadcaster_id);
        Ok(Channel {
            broadcaster_id,
            moderator_id,
        })
    }

    fn ban_call(channel: &Channel<'_>, body: serde_json::Value) -> PlatformCall {
        PlatformCall::post(BANS_ENDPOINT)
            .param("broadcaster_id", channel.broadcaster_id)
            .param("moderator_id", channel.moderator_id)
            .json(json!({ "data": body }))
    }
}

#[async_trait]
impl PlatformConnector for TwitchConnector {
    fn platform(&self) -> &str {
        TWITCH
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize()
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::new(TWITCH)
            .with_support(ActionKind::BlockUser)
            .with_support(ActionKind::UnblockUser)
            .with_rate_limit(ActionKind::BlockUser, "800 points per minute")
            .with_rate_limit(ActionKind::UnblockUser, "800 points per minute")
            .with_scope("moderator:manage:banned_users")
            .with_fallback(ActionKind::HideContent, None)
            .with_fallback(ActionKind::ReportUser, None)
    }

    async fn hide_content(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self
            .core
            .escalate(ActionKind::HideContent, self.manual_instructions(ActionKind::HideContent)))
    }

    async fn report_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self
            .core
            .escalate(ActionKind::ReportUser, self.manual_instructions(ActionKind::ReportUser)))
    }

    async fn block_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;
        let channel = Self::channel(request)?;

        let ban = Self::ban_call(&channel, json!({ "user_id": user_id, "reason": request.reason }));

        match self.core.send(ban).await {
            Ok(_) => Ok(ModerationOutcome::executed(TWITCH, ActionKind::BlockUser)
                .with_platform_action("ban_user")
                .with_detail("broadcasterId", channel.broadcaster_id)
                .with_detail("userId", user_id)),
            Err(err) if err.is_forbidden() => {
                let seconds = request
                    .metadata_u64("timeoutSeconds")
                    .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
                    .clamp(1, MAX_TIMEOUT_SECONDS);
                tracing::warn!(
                    platform = TWITCH,
                    broadcaster_id = %channel.broadcaster_id,
                    error = %err,
                    "Ban refused, falling back to timeout"
                );

                let timeout = Self::ban_call(
                    &channel,
                    json!({ "user_id": user_id, "reason": request.reason, "duration": seconds }),
                );
                self.core.send(timeout).await?;

                Ok(ModerationOutcome::executed(TWITCH, ActionKind::BlockUser)
                    .with_platform_action("timeout_user")
                    .with_detail("broadcasterId", channel.broadcaster_id)
                    .with_detail("userId", user_id)
                    .with_detail("timeoutSeconds", seconds))
            }
            Err(err) => Err(err),
        }
    }

    async fn unblock_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;
        let channel = Self::channel(request)?;

        let call = PlatformCall::delete(BANS_ENDPOINT)
            .param("broadcaster_id", channel.broadcaster_id)
            .param("moderator_id", channel.moderator_id)
            .param("user_id", user_id);
        self.core.send(call).await?;

        Ok(ModerationOutcome::executed(TWITCH, ActionKind::UnblockUser)
            .with_platform_action("unban_user")
            .with_detail("broadcasterId", channel.broadcaster_id)
            .with_detail("userId", user_id))
    }

    fn manual_instructions(&self, action: ActionKind) -> String {
        match action {
            ActionKind::ReportUser => "Report user through Twitch moderation interface",
            ActionKind::HideContent => "Delete message through Twitch chat moderation",
            _ => DEFAULT_MANUAL_INSTRUCTIONS,
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::{HttpMethod, PlatformError, SimulatedTransport, SimulationConfig};

    fn connector() -> (TwitchConnector, Arc<SimulatedTransport>) {
        let transport = Arc::new(SimulatedTransport::new(TWITCH, SimulationConfig::instant()));
        let connector = TwitchConnector::new(transport.clone(), ConnectorConfig::unvalidated());
        (connector, transport)
    }

    fn request(action: ActionKind) -> ModerationRequest {
        ModerationRequest::new(TWITCH, "org-1", action)
            .with_content("chat-msg-1")
            .with_author("viewer-9", Some("chatter".to_string()))
            .with_reason("Harassment")
            .with_metadata("broadcasterId", "streamer-1")
    }

    #[test]
    fn test_capabilities() {
        let (connector, _) = connector();
        let caps = connector.capabilities();
        assert!(!caps.supports(ActionKind::HideContent));
        assert!(caps.supports(ActionKind::BlockUser));
        assert_eq!(caps.explicit_fallback(ActionKind::HideContent), Some(None));
        assert_eq!(caps.explicit_fallback(ActionKind::ReportUser), Some(None));
    }

    #[tokio::test]
    async fn test_ban_defaults_moderator_to_broadcaster() {
        let (connector, transport) = connector();
        let outcome = connector.block_user(&request(ActionKind::BlockUser)).await.unwrap();

        assert_eq!(outcome.platform_action(), Some("ban_user"));
        let call = &transport.calls()[0];
        assert_eq!(call.method, HttpMethod::Post);
        assert_eq!(call.endpoint, BANS_ENDPOINT);
        assert_eq!(call.params.get("broadcaster_id").map(String::as_str), Some("streamer-1"));
        assert_eq!(call.params.get("moderator_id").map(String::as_str), Some("streamer-1"));
        let body = call.body.as_ref().unwrap();
        assert_eq!(body["data"]["user_id"], "viewer-9");
        assert_eq!(body["data"]["reason"], "Harassment");
        assert!(body["data"].get("duration").is_none());
    }

    #[tokio::test]
    async fn test_explicit_moderator_id() {
        let (connector, transport) = connector();
        let req = request(ActionKind::BlockUser).with_metadata("moderatorId", "mod-7");
        connector.block_user(&req).await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.params.get("moderator_id").map(String::as_str), Some("mod-7"));
    }

    #[tokio::test]
    async fn test_forbidden_ban_falls_back_to_timeout() {
        let (connector, transport) = connector();
        transport.fail_next_with(PlatformError::new(403, "Forbidden", "missing scope"), 1);

        let outcome = connector.block_user(&request(ActionKind::BlockUser)).await.unwrap();
        assert_eq!(outcome.platform_action(), Some("timeout_user"));

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].body.as_ref().unwrap()["data"]["duration"],
            DEFAULT_TIMEOUT_SECONDS
        );
    }

    #[tokio::test]
    async fn test_timeout_duration_stays_within_helix_range() {
        let (connector, transport) = connector();
        transport.fail_next_with(PlatformError::new(403, "Forbidden", "missing scope"), 2);

        let huge = request(ActionKind::BlockUser).with_metadata("timeoutSeconds", u64::MAX);
        let outcome = connector.block_user(&huge).await.unwrap();
        assert_eq!(outcome.details["timeoutSeconds"], MAX_TIMEOUT_SECONDS);

        let zero = request(ActionKind::BlockUser).with_metadata("timeoutSeconds", 0);
        let outcome = connector.block_user(&zero).await.unwrap();
        assert_eq!(outcome.details["timeoutSeconds"], 1);

        let calls = transport.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[1].body.as_ref().unwrap()["data"]["duration"], MAX_TIMEOUT_SECONDS);
        assert_eq!(calls[3].body.as_ref().unwrap()["data"]["duration"], 1);
    }

    #[tokio::test]
    async fn test_ban_requires_broadcaster_id() {
        let (connector, transport) = connector();
        let mut req = request(ActionKind::BlockUser);
        req.metadata.clear();

        let err = connector.block_user(&req).await.unwrap_err();
        assert!(err.to_string().contains("broadcasterId"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unban() {
        let (connector, transport) = connector();
        connector
            .unblock_user(&request(ActionKind::UnblockUser))
            .await
            .unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.method, HttpMethod::Delete);
        assert_eq!(call.params.get("user_id").map(String::as_str), Some("viewer-9"));
    }

    #[tokio::test]
    async fn test_hide_escalates_to_chat_moderation() {
        let (connector, _) = connector();
        let outcome = connector
            .hide_content(&request(ActionKind::HideContent))
            .await
            .unwrap();
        assert!(outcome.requires_manual_review());
        assert_eq!(
            outcome.instructions(),
            Some("Delete message through Twitch chat moderation")
        );
    }

    #[tokio::test]
    async fn test_http_requires_client_id() {
        let config = ConnectorConfig::new().with_credential("access_token", "token");
        let connector = TwitchConnector::http(config).unwrap();
        let err = connector.initialize().await.unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }
}
