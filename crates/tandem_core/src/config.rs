//! Core configuration.

use serde::{Deserialize, Serialize};

/// Environment variable overriding the share endpoint base URL.
pub const SHARE_URL_ENV: &str = "TANDEM_SHARE_URL";

/// Share endpoint for development builds.
const DEV_SHARE_URL: &str = "https://api.dev.tandem.chat";

/// Share endpoint for release builds.
const PROD_SHARE_URL: &str = "https://api.tandem.chat";

/// Sharing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePolicy {
    /// `share()` fails; nothing is ever published.
    Disabled,
    /// Sessions are shared only on explicit `share()` calls.
    #[default]
    Manual,
    /// Root sessions are shared automatically on creation, best-effort.
    Auto,
}

/// Configuration for the core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sharing policy.
    pub share: SharePolicy,
    /// Base URL of the share endpoint.
    pub share_base_url: String,
}

impl Config {
    /// Creates a configuration with defaults: manual sharing against the
    /// build-appropriate endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            share: SharePolicy::default(),
            share_base_url: default_share_base_url(),
        }
    }

    /// Creates a configuration honoring environment overrides
    /// ([`SHARE_URL_ENV`]).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(url) = std::env::var(SHARE_URL_ENV) {
            if !url.is_empty() {
                config.share_base_url = url;
            }
        }
        config
    }

    /// Sets the sharing policy.
    #[must_use]
    pub fn with_share(mut self, share: SharePolicy) -> Self {
        self.share = share;
        self
    }

    /// Sets the share endpoint base URL.
    #[must_use]
    pub fn with_share_base_url(mut self, url: impl Into<String>) -> Self {
        self.share_base_url = url.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn default_share_base_url() -> String {
    if cfg!(debug_assertions) {
        DEV_SHARE_URL.to_string()
    } else {
        PROD_SHARE_URL.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_manual_sharing() {
        let config = Config::new();
        assert_eq!(config.share, SharePolicy::Manual);
        assert!(!config.share_base_url.is_empty());
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new()
            .with_share(SharePolicy::Auto)
            .with_share_base_url("http://localhost:9000");
        assert_eq!(config.share, SharePolicy::Auto);
        assert_eq!(config.share_base_url, "http://localhost:9000");
    }

    #[test]
    fn policy_serializes_lowercase() {
        let json = serde_json::to_string(&SharePolicy::Auto).unwrap();
        assert_eq!(json, "\"auto\"");
        let back: SharePolicy = serde_json::from_str("\"disabled\"").unwrap();
        assert_eq!(back, SharePolicy::Disabled);
    }
}
