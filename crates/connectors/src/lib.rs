//! Platform connectors for Shield moderation actions
//!
//! This crate defines the canonical moderation request/outcome model, the
//! capability description each platform publishes, the
//! [`PlatformConnector`] trait, and the Twitter, YouTube, Discord and Twitch
//! implementations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capabilities;
pub mod config;
pub mod connector;
pub mod discord;
pub mod error;
pub mod model;
pub mod registry;
pub mod twitch;
pub mod twitter;
pub mod youtube;

pub use capabilities::PlatformCapabilities;
pub use config::ConnectorConfig;
pub use connector::{ConnectorCore, PlatformConnector};
pub use discord::DiscordConnector;
pub use error::{ConnectorError, Result};
pub use model::{
    ActionKind, AppliedFallback, Disposition, ModerationOutcome, ModerationRequest, ValidationError,
};
pub use registry::{ConnectorRegistry, SimulatedPlatforms};
pub use twitch::TwitchConnector;
pub use twitter::TwitterConnector;
pub use youtube::YouTubeConnector;

/// Platform id for Twitter
pub const TWITTER: &str = "twitter";
/// Platform id for YouTube
pub const YOUTUBE: &str = "youtube";
/// Platform id for Discord
pub const DISCORD: &str = "discord";
/// Platform id for Twitch
pub const TWITCH: &str = "twitch";
