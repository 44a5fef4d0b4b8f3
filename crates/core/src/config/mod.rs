//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FURROW_*)
//! 2. TOML config file (if FURROW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FURROW_*)
/// 2. TOML config file (if FURROW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The single origin whose requests this agent arbitrates.
    ///
    /// Set via FURROW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to the SQLite store backing caches and the sync queue.
    ///
    /// Set via FURROW_STORE_PATH environment variable.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// User-Agent string for outbound HTTP requests.
    ///
    /// Set via FURROW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Hard timeout for any single network fetch, in milliseconds.
    ///
    /// Set via FURROW_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Network-first strategies fall back to cache after this many
    /// milliseconds without a network response.
    ///
    /// Set via FURROW_NETWORK_FIRST_TIMEOUT_MS environment variable.
    #[serde(default = "default_network_first_timeout_ms")]
    pub network_first_timeout_ms: u64,

    /// Maximum bytes to accept per response body.
    ///
    /// Set via FURROW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Queued requests older than this are dropped without replay.
    ///
    /// Set via FURROW_QUEUE_RETENTION_HOURS environment variable.
    #[serde(default = "default_queue_retention_hours")]
    pub queue_retention_hours: u64,

    /// After a dismissed update prompt, suppress the next full prompt
    /// for this many minutes.
    ///
    /// Set via FURROW_PROMPT_COOLDOWN_MINUTES environment variable.
    #[serde(default = "default_prompt_cooldown_minutes")]
    pub prompt_cooldown_minutes: u64,

    /// Interval between best-effort checks for a newer agent version.
    ///
    /// Set via FURROW_UPDATE_POLL_SECS environment variable.
    #[serde(default = "default_update_poll_secs")]
    pub update_poll_secs: u64,
}

fn default_origin() -> String {
    "https://app.furrow.example".into()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./furrow-store.sqlite")
}

fn default_user_agent() -> String {
    "furrow-agent/0.1".into()
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_network_first_timeout_ms() -> u64 {
    10_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_queue_retention_hours() -> u64 {
    24
}

fn default_prompt_cooldown_minutes() -> u64 {
    60
}

fn default_update_poll_secs() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            store_path: default_store_path(),
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            network_first_timeout_ms: default_network_first_timeout_ms(),
            max_bytes: default_max_bytes(),
            queue_retention_hours: default_queue_retention_hours(),
            prompt_cooldown_minutes: default_prompt_cooldown_minutes(),
            update_poll_secs: default_update_poll_secs(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Network-first fallback deadline as Duration.
    pub fn network_first_timeout(&self) -> Duration {
        Duration::from_millis(self.network_first_timeout_ms)
    }

    /// Queue retention window as Duration.
    pub fn queue_retention(&self) -> Duration {
        Duration::from_secs(self.queue_retention_hours * 3600)
    }

    /// Update-prompt cooldown as Duration.
    pub fn prompt_cooldown(&self) -> Duration {
        Duration::from_secs(self.prompt_cooldown_minutes * 60)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FURROW_`
    /// 2. TOML file from `FURROW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FURROW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FURROW_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "https://app.furrow.example");
        assert_eq!(config.store_path, PathBuf::from("./furrow-store.sqlite"));
        assert_eq!(config.user_agent, "furrow-agent/0.1");
        assert_eq!(config.fetch_timeout_ms, 20_000);
        assert_eq!(config.network_first_timeout_ms, 10_000);
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.queue_retention_hours, 24);
        assert_eq!(config.prompt_cooldown_minutes, 60);
        assert_eq!(config.update_poll_secs, 60);
    }

    #[test]
    fn test_duration_accessors() {
        let config = AppConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_millis(20_000));
        assert_eq!(config.network_first_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.queue_retention(), Duration::from_secs(24 * 3600));
        assert_eq!(config.prompt_cooldown(), Duration::from_secs(3600));
    }
}
