//! Connector registry
//!
//! Maps platform ids to connectors. The executor resolves connectors here and
//! never branches on platform id itself.

use crate::capabilities::PlatformCapabilities;
use crate::config::ConnectorConfig;
use crate::connector::PlatformConnector;
use crate::discord::DiscordConnector;
use crate::error::Result;
use crate::twitch::TwitchConnector;
use crate::twitter::TwitterConnector;
use crate::youtube::YouTubeConnector;
use crate::{DISCORD, TWITCH, TWITTER, YOUTUBE};
use platform_client::{SimulatedTransport, SimulationConfig};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Platform id to connector map
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<String, Arc<dyn PlatformConnector>>,
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}

/// Handles to the simulated transports behind a simulated registry
#[derive(Debug, Clone)]
pub struct SimulatedPlatforms {
    /// Twitter transport
    pub twitter: Arc<SimulatedTransport>,
    /// YouTube transport
    pub youtube: Arc<SimulatedTransport>,
    /// Discord transport
    pub discord: Arc<SimulatedTransport>,
    /// Twitch transport
    pub twitch: Arc<SimulatedTransport>,
}

impl SimulatedPlatforms {
    /// Transport for a platform id
    pub fn transport(&self, platform: &str) -> Option<&Arc<SimulatedTransport>> {
        match platform {
            TWITTER => Some(&self.twitter),
            YOUTUBE => Some(&self.youtube),
            DISCORD => Some(&self.discord),
            TWITCH => Some(&self.twitch),
            _ => None,
        }
    }

    /// Set the random failure rate on every platform
    pub fn set_failure_rate(&self, rate: f64) {
        for transport in [&self.twitter, &self.youtube, &self.discord, &self.twitch] {
            transport.set_failure_rate(rate);
        }
    }
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under its platform id, replacing any previous one
    pub fn register(&mut self, connector: Arc<dyn PlatformConnector>) {
        let platform = connector.platform().to_string();
        tracing::debug!(platform = %platform, "Registering connector");
        self.connectors.insert(platform, connector);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, connector: Arc<dyn PlatformConnector>) -> Self {
        self.register(connector);
        self
    }

    /// Connector for a platform id
    pub fn get(&self, platform: &str) -> Option<Arc<dyn PlatformConnector>> {
        self.connectors.get(platform).cloned()
    }

    /// Registered platform ids, sorted
    pub fn platforms(&self) -> Vec<String> {
        self.connectors.keys().cloned().collect()
    }

    /// Number of registered connectors
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Whether no connector is registered
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Capabilities of every registered platform
    pub fn capabilities(&self) -> BTreeMap<String, PlatformCapabilities> {
        self.connectors
            .iter()
            .map(|(platform, connector)| (platform.clone(), connector.capabilities()))
            .collect()
    }

    /// All four platforms over simulated transports, credentials not required
    pub fn simulated(simulation: SimulationConfig) -> (Self, SimulatedPlatforms) {
        let transport =
            |platform: &str| Arc::new(SimulatedTransport::new(platform, simulation.clone()));
        let platforms = SimulatedPlatforms {
            twitter: transport(TWITTER),
            youtube: transport(YOUTUBE),
            discord: transport(DISCORD),
            twitch: transport(TWITCH),
        };

        let registry = Self::new()
            .with(Arc::new(TwitterConnector::new(
                platforms.twitter.clone(),
                ConnectorConfig::unvalidated(),
            )))
            .with(Arc::new(YouTubeConnector::new(
                platforms.youtube.clone(),
                ConnectorConfig::unvalidated(),
            )))
            .with(Arc::new(DiscordConnector::new(
                platforms.discord.clone(),
                ConnectorConfig::unvalidated(),
            )))
            .with(Arc::new(TwitchConnector::new(
                platforms.twitch.clone(),
                ConnectorConfig::unvalidated(),
            )));

        (registry, platforms)
    }

    /// All four platforms over HTTP, credentials from the environment
    ///
    /// Missing credentials are reported when a connector is first used, not
    /// here.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new()
            .with(Arc::new(TwitterConnector::from_env()?))
            .with(Arc::new(YouTubeConnector::from_env()?))
            .with(Arc::new(DiscordConnector::from_env()?))
            .with(Arc::new(TwitchConnector::from_env()?)))
    }
}
