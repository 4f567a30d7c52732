//! Twitter connector
//!
//! Hides replies and blocks/unblocks users through the v2 API. Twitter has no
//! report endpoint; reports fall back to a block.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::connector::{ConnectorCore, PlatformConnector, DEFAULT_MANUAL_INSTRUCTIONS};
use crate::error::Result;
use crate::model::{ActionKind, ModerationOutcome, ModerationRequest};
use crate::TWITTER;
use async_trait::async_trait;
use platform_client::{HttpTransport, HttpTransportConfig, PlatformCall, PlatformTransport};
use serde_json::json;
use std::sync::Arc;
use urlencoding::encode;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

const REQUIRED_CREDENTIALS: &[&str] = &["bearer_token"];

/// Twitter v2 connector
#[derive(Debug)]
pub struct TwitterConnector {
    core: ConnectorCore,
}

impl TwitterConnector {
    /// Create a connector over any transport
    pub fn new(transport: Arc<dyn PlatformTransport>, config: ConnectorConfig) -> Self {
        Self {
            core: ConnectorCore::new(TWITTER, transport, config, REQUIRED_CREDENTIALS),
        }
    }

    /// Create a connector that talks HTTP
    pub fn http(config: ConnectorConfig) -> Result<Self> {
        let mut http = HttpTransportConfig::new(config.base_url_or(DEFAULT_BASE_URL));
        if let Some(token) = config.credential("bearer_token") {
            http = http.with_bearer_token(token);
        }
        let transport = HttpTransport::new(http)
            .map_err(|e| crate::ConnectorError::platform_call(TWITTER, e))?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Create an HTTP connector from `TWITTER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::http(ConnectorConfig::from_env(TWITTER, REQUIRED_CREDENTIALS))
    }
}

#[async_trait]
impl PlatformConnector for TwitterConnector {
    fn platform(&self) -> &str {
        TWITTER
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize()
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::new(TWITTER)
            .with_support(ActionKind::HideContent)
            .with_support(ActionKind::BlockUser)
            .with_support(ActionKind::UnblockUser)
            .with_rate_limit(ActionKind::HideContent, "50 requests per 15 minutes")
            .with_rate_limit(ActionKind::BlockUser, "50 requests per 15 minutes")
            .with_rate_limit(ActionKind::UnblockUser, "50 requests per 15 minutes")
            .with_scope("tweet.moderate.write")
            .with_scope("block.write")
            .with_fallback(ActionKind::ReportUser, Some(ActionKind::BlockUser))
    }

    async fn hide_content(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let tweet_id = request.require_content_id()?;

        let call = PlatformCall::put(format!("/2/tweets/{}/hidden", encode(tweet_id)))
            .json(json!({ "hidden": true }));
        let response = self.core.send(call).await?;

        // Twitter answers 200 with hidden=false when it declines to hide
        let hidden = response.data["data"]["hidden"].as_bool().unwrap_or(true);
        let outcome = if hidden {
            ModerationOutcome::executed(TWITTER, ActionKind::HideContent)
        } else {
            ModerationOutcome::failed(
                TWITTER,
                ActionKind::HideContent,
                "Twitter did not confirm the reply was hidden",
            )
        };

        Ok(outcome
            .with_platform_action("hide_reply")
            .with_detail("tweetId", tweet_id))
    }

    async fn report_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self
            .core
            .escalate(ActionKind::ReportUser, self.manual_instructions(ActionKind::ReportUser)))
    }

    async fn block_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;

        let call = PlatformCall::post("/2/users/me/blocking")
            .json(json!({ "target_user_id": user_id }));
        let response = self.core.send(call).await?;

        let blocking = response.data["data"]["blocking"].as_bool().unwrap_or(true);
        let outcome = if blocking {
            ModerationOutcome::executed(TWITTER, ActionKind::BlockUser)
        } else {
            ModerationOutcome::failed(
                TWITTER,
                ActionKind::BlockUser,
                "Twitter did not confirm the block",
            )
        };

        Ok(outcome
            .with_platform_action("block_user")
            .with_detail("userId", user_id))
    }

    async fn unblock_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;

        self.core
            .send(PlatformCall::delete(format!("/2/users/me/blocking/{}", encode(user_id))))
            .await?;

        Ok(ModerationOutcome::executed(TWITTER, ActionKind::UnblockUser)
            .with_platform_action("unblock_user")
            .with_detail("userId", user_id))
    }

    fn manual_instructions(&self, action: ActionKind) -> String {
        match action {
            ActionKind::ReportUser => {
                "Visit https://help.twitter.com/forms/report to report this user manually"
            }
            ActionKind::HideContent => "Use Twitter web interface to hide the reply manually",
            _ => DEFAULT_MANUAL_INSTRUCTIONS,
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_client::{HttpMethod, SimulatedTransport, SimulationConfig};

    fn connector() -> (TwitterConnector, Arc<SimulatedTransport>) {
        let transport = Arc::new(SimulatedTransport::new(TWITTER, SimulationConfig::instant()));
        let connector = TwitterConnector::new(transport.clone(), ConnectorConfig::unvalidated());
        (connector, transport)
    }

    fn request(action: ActionKind) -> ModerationRequest {
        ModerationRequest::new(TWITTER, "org-1", action)
            .with_content("1500")
            .with_author("42", Some("troll".to_string()))
    }

    #[test]
    fn test_capabilities() {
        let (connector, _) = connector();
        let caps = connector.capabilities();
        assert!(caps.supports(ActionKind::HideContent));
        assert!(!caps.supports(ActionKind::ReportUser));
        assert!(caps.supports(ActionKind::BlockUser));
        assert!(caps.supports(ActionKind::UnblockUser));
        assert_eq!(
            caps.explicit_fallback(ActionKind::ReportUser),
            Some(Some(ActionKind::BlockUser))
        );
    }

    #[tokio::test]
    async fn test_hide_reply() {
        let (connector, transport) = connector();
        let outcome = connector
            .hide_content(&request(ActionKind::HideContent))
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.platform_action(), Some("hide_reply"));

        let call = &transport.calls()[0];
        assert_eq!(call.method, HttpMethod::Put);
        assert_eq!(call.endpoint, "/2/tweets/1500/hidden");
        assert_eq!(call.body, Some(json!({ "hidden": true })));
    }

    #[tokio::test]
    async fn test_hide_not_confirmed_is_soft_failure() {
        let (connector, transport) = connector();
        transport.respond_with("/hidden", json!({ "data": { "hidden": false } }));

        let outcome = connector
            .hide_content(&request(ActionKind::HideContent))
            .await
            .unwrap();
        assert!(!outcome.success());
        assert!(outcome.error().unwrap().contains("did not confirm"));
    }

    #[tokio::test]
    async fn test_block_and_unblock() {
        let (connector, transport) = connector();

        let blocked = connector.block_user(&request(ActionKind::BlockUser)).await.unwrap();
        assert!(blocked.success());
        assert_eq!(blocked.platform_action(), Some("block_user"));

        let unblocked = connector
            .unblock_user(&request(ActionKind::UnblockUser))
            .await
            .unwrap();
        assert!(unblocked.success());

        let calls = transport.calls();
        assert_eq!(calls[0].endpoint, "/2/users/me/blocking");
        assert_eq!(calls[0].body, Some(json!({ "target_user_id": "42" })));
        assert_eq!(calls[1].method, HttpMethod::Delete);
        assert_eq!(calls[1].endpoint, "/2/users/me/blocking/42");
    }

    #[tokio::test]
    async fn test_report_escalates_with_form_link() {
        let (connector, transport) = connector();
        let outcome = connector
            .report_user(&request(ActionKind::ReportUser))
            .await
            .unwrap();

        assert!(outcome.requires_manual_review());
        assert!(outcome.instructions().unwrap().contains("help.twitter.com/forms/report"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_author_is_validation_error() {
        let (connector, transport) = connector();
        let request = ModerationRequest::new(TWITTER, "org-1", ActionKind::BlockUser);

        let err = connector.block_user(&request).await.unwrap_err();
        assert!(matches!(err, crate::ConnectorError::Validation(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_http_requires_bearer_token() {
        let connector = TwitterConnector::http(ConnectorConfig::new()).unwrap();
        let err = connector.initialize().await.unwrap_err();
        assert!(err.to_string().contains("bearer_token"));
    }
}
