//! Connector configuration
//!
//! Credentials come either from an explicit map or from environment
//! variables named `<PLATFORM>_<KEY>` (e.g. `TWITCH_CLIENT_ID`).

use std::collections::HashMap;

/// Environment variable that puts every connector into mock mode
pub const MOCK_MODE_ENV: &str = "SHIELD_MOCK_MODE";

/// Configuration shared by all platform connectors
#[derive(Debug, Clone, Default)]
pub struct ConnectorConfig {
    /// Override for the platform API base URL
    pub base_url: Option<String>,
    /// Credentials keyed by name (e.g. "bearer_token")
    pub credentials: HashMap<String, String>,
    /// Skip the credential check in `initialize()` (mock mode and tests)
    pub skip_validation: bool,
}

impl ConnectorConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for tests and mock mode: no credentials required
    pub fn unvalidated() -> Self {
        Self {
            skip_validation: true,
            ..Default::default()
        }
    }

    /// Load credentials for `platform` from the process environment
    pub fn from_env(platform: &str, keys: &[&str]) -> Self {
        Self::from_lookup(platform, keys, |name| std::env::var(name).ok())
    }

    /// Load credentials through an arbitrary lookup function
    pub fn from_lookup<F>(platform: &str, keys: &[&str], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for key in keys {
            let name = env_var_name(platform, key);
            if let Some(value) = lookup(&name).filter(|v| !v.trim().is_empty()) {
                config.credentials.insert((*key).to_string(), value);
            }
        }
        config.base_url = lookup(&env_var_name(platform, "base_url")).filter(|v| !v.is_empty());
        config.skip_validation = lookup(MOCK_MODE_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        config
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a credential
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Skip credential validation
    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    /// A non-empty credential
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Base URL, or the given default
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }
}

fn env_var_name(platform: &str, key: &str) -> String {
    format!("{}_{}", platform, key).to_ascii_uppercase()
}
