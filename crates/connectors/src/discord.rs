//! Discord connector
//!
//! Deletes messages and bans/unbans guild members through the bot API. When
//! the bot lacks the ban permission it times the member out instead.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::connector::{ConnectorCore, PlatformConnector, DEFAULT_MANUAL_INSTRUCTIONS};
use crate::error::{ConnectorError, Result};
use crate::model::{ActionKind, ModerationOutcome, ModerationRequest, ValidationError};
use crate::DISCORD;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use platform_client::{HttpTransport, HttpTransportConfig, PlatformCall, PlatformTransport};
use serde_json::json;
use std::sync::Arc;
use urlencoding::encode;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";

/// Timeout applied when a ban is refused
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 600;

/// Longest timeout Discord accepts (28 days)
pub const MAX_TIMEOUT_SECONDS: u64 = 28 * 24 * 60 * 60;

const REQUIRED_CREDENTIALS: &[&str] = &["bot_token"];

const AUDIT_LOG_REASON_HEADER: &str = "X-Audit-Log-Reason";
const MAX_AUDIT_LOG_REASON: usize = 512;

/// Discord bot connector
#[derive(Debug)]
pub struct DiscordConnector {
    core: ConnectorCore,
}

impl DiscordConnector {
    /// Create a connector over any transport
    pub fn new(transport: Arc<dyn PlatformTransport>, config: ConnectorConfig) -> Self {
        Self {
            core: ConnectorCore::new(DISCORD, transport, config, REQUIRED_CREDENTIALS),
        }
    }

    /// Create a connector that talks HTTP
    pub fn http(config: ConnectorConfig) -> Result<Self> {
        let mut http = HttpTransportConfig::new(config.base_url_or(DEFAULT_BASE_URL));
        if let Some(token) = config.credential("bot_token") {
            http = http.with_header("Authorization", format!("Bot {}", token));
        }
        let transport =
            HttpTransport::new(http).map_err(|e| ConnectorError::platform_call(DISCORD, e))?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Create an HTTP connector from `DISCORD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::http(ConnectorConfig::from_env(DISCORD, REQUIRED_CREDENTIALS))
    }

    fn with_reason(call: PlatformCall, request: &ModerationRequest) -> PlatformCall {
        let reason = audit_log_reason(&request.reason);
        if reason.is_empty() {
            call
        } else {
            call.header(AUDIT_LOG_REASON_HEADER, reason)
        }
    }

    async fn timeout_member(
        &self,
        request: &ModerationRequest,
        guild_id: &str,
        user_id: &str,
    ) -> Result<ModerationOutcome> {
        let requested = request
            .metadata_u64("timeoutSeconds")
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        let seconds = requested.min(MAX_TIMEOUT_SECONDS);
        if seconds < requested {
            tracing::debug!(
                platform = DISCORD,
                requested,
                applied = seconds,
                "Timeout capped at Discord maximum"
            );
        }
        let until = timeout_until(Utc::now(), seconds)?;

        let endpoint = format!("/guilds/{}/members/{}", encode(guild_id), encode(user_id));
        let call = PlatformCall::patch(endpoint)
            .json(json!({ "communication_disabled_until": until }));
        self.core.send(Self::with_reason(call, request)).await?;

        tracing::info!(
            platform = DISCORD,
            guild_id = %guild_id,
            user_id = %user_id,
            timeout_seconds = seconds,
            "Ban refused, member timed out instead"
        );

        Ok(ModerationOutcome::executed(DISCORD, ActionKind::BlockUser)
            .with_platform_action("timeout_user")
            .with_detail("guildId", guild_id)
            .with_detail("userId", user_id)
            .with_detail("timeoutSeconds", seconds)
            .with_detail("timeoutUntil", until))
    }
}

/// RFC 3339 instant `seconds` after `now`
fn timeout_until(now: DateTime<Utc>, seconds: u64) -> Result<String> {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .map(|until| until.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| ValidationError::invalid("timeoutSeconds", "timeout is out of range").into())
}

/// Discord caps the header and rejects non-ASCII header bytes
fn audit_log_reason(reason: &str) -> String {
    reason
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .take(MAX_AUDIT_LOG_REASON)
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl PlatformConnector for DiscordConnector {
    fn platform(&self) -> &str {
        DISCORD
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize()
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::new(DISCORD)
            .with_support(ActionKind::HideContent)
            .with_support(ActionKind::BlockUser)
            .with_support(ActionKind::UnblockUser)
            .with_rate_limit(ActionKind::HideContent, "5 requests per 5 seconds per channel")
            .with_rate_limit(ActionKind::BlockUser, "5 requests per 5 seconds per guild")
            .with_rate_limit(ActionKind::UnblockUser, "5 requests per 5 seconds per guild")
            .with_scope("MANAGE_MESSAGES")
            .with_scope("BAN_MEMBERS")
            .with_scope("MODERATE_MEMBERS")
            .with_fallback(ActionKind::ReportUser, None)
    }

    async fn hide_content(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let message_id = request.require_content_id()?;
        let channel_id = request.require_metadata("channelId")?;

        let endpoint = format!(
            "/channels/{}/messages/{}",
            encode(channel_id),
            encode(message_id)
        );
        let call = PlatformCall::delete(endpoint);
        self.core.send(Self::with_reason(call, request)).await?;

        Ok(ModerationOutcome::executed(DISCORD, ActionKind::HideContent)
            .with_platform_action("delete_message")
            .with_detail("channelId", channel_id)
            .with_detail("messageId", message_id))
    }

    async fn report_user(&self, _request: &ModerationRequest) -> Result<ModerationOutcome> {
        Ok(self
            .core
            .escalate(ActionKind::ReportUser, self.manual_instructions(ActionKind::ReportUser)))
    }

    async fn block_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;
        let guild_id = request.require_metadata("guildId")?;

        let endpoint = format!("/guilds/{}/bans/{}", encode(guild_id), encode(user_id));
        let call = PlatformCall::put(endpoint)
            .json(json!({ "delete_message_seconds": 0 }));

        match self.core.send(Self::with_reason(call, request)).await {
            Ok(_) => Ok(ModerationOutcome::executed(DISCORD, ActionKind::BlockUser)
                .with_platform_action("ban_user")
                .with_detail("guildId", guild_id)
                .with_detail("userId", user_id)),
            Err(err) if err.is_forbidden() => {
                tracing::warn!(
                    platform = DISCORD,
                    guild_id = %guild_id,
                    error = %err,
                    "Missing ban permission, falling back to timeout"
                );
                self.timeout_member(request, guild_id, user_id).await
            }
            Err(err) => Err(err),
        }
    }

    async fn unblock_user(&self, request: &ModerationRequest) -> Result<ModerationOutcome> {
        let user_id = request.require_author_id()?;
        let guild_id = request.require_metadata("guildId")?;

        let endpoint = format!("/guilds/{}/bans/{}", encode(guild_id), encode(user_id));
        let call = PlatformCall::delete(endpoint);
        self.core.send(Self::with_reason(call, request)).await?;

        Ok(ModerationOutcome::executed(DISCORD, ActionKind::UnblockUser)
            .with_platform_action("unban_user")
            .with_detail("guildId", guild_id)
            .with_detail("userId", user_id))
    }

    fn manual_instructions(&self, action: ActionKind) -> String {
        match action {
            ActionKind::ReportUser => "Report user to Discord through the web interface",
            _ => DEFAULT_MANUAL_INSTRUCTIONS,
        }
        .to_string()
    }
}
