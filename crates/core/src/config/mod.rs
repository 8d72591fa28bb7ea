//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITECACHE_*)
//! 2. TOML config file (if SITECACHE_CONFIG_FILE set)
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
/// 1. Environment variables (SITECACHE_*)
/// 2. TOML config file (if SITECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database backing every namespace.
    ///
    /// Set via SITECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the line transport listens on.
    ///
    /// Set via SITECACHE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Minimum seconds between successful catalog refreshes.
    ///
    /// Set via SITECACHE_STALE_AFTER_SECS environment variable.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Seconds after which an unfinished refresh is considered abandoned.
    ///
    /// Set via SITECACHE_REFRESH_LEASE_SECS environment variable.
    #[serde(default = "default_refresh_lease_secs")]
    pub refresh_lease_secs: u64,

    /// Rows per INSERT statement during bulk replaces.
    ///
    /// Set via SITECACHE_INSERT_BATCH_SIZE environment variable.
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    /// Base URL of the remote catalog resources.
    ///
    /// Set via SITECACHE_SOURCE_BASE_URL environment variable.
    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,

    /// Root directory of the article library.
    ///
    /// Set via SITECACHE_ARTICLES_PATH environment variable.
    /// Required only when article methods are called.
    #[serde(default)]
    pub articles_path: Option<PathBuf>,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SITECACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SITECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitecache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:4000".into()
}

fn default_stale_after_secs() -> u64 {
    86_400
}

fn default_refresh_lease_secs() -> u64 {
    3_600
}

fn default_insert_batch_size() -> usize {
    300
}

fn default_source_base_url() -> String {
    "https://kenkoooo.com/atcoder/resources".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "sitecache/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            stale_after_secs: default_stale_after_secs(),
            refresh_lease_secs: default_refresh_lease_secs(),
            insert_batch_size: default_insert_batch_size(),
            source_base_url: default_source_base_url(),
            articles_path: None,
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Staleness window for the refresh coordinator.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Lease granted to a refresh before another caller may take it over.
    pub fn refresh_lease(&self) -> Duration {
        Duration::from_secs(self.refresh_lease_secs)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITECACHE_`
    /// 2. TOML file from `SITECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SITECACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Article library root (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the articles path is not set.
    pub fn require_articles_path(&self) -> Result<&PathBuf, ConfigError> {
        self.articles_path.as_ref().ok_or_else(|| ConfigError::Missing {
            field: "articles_path".into(),
            hint: "Set SITECACHE_ARTICLES_PATH environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./sitecache.sqlite"));
        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(config.stale_after_secs, 86_400);
        assert_eq!(config.insert_batch_size, 300);
        assert_eq!(config.timeout_ms, 20_000);
        assert!(config.articles_path.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.stale_after(), Duration::from_secs(86_400));
        assert_eq!(config.refresh_lease(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_require_articles_path_missing() {
        let config = AppConfig::default();
        let result = config.require_articles_path();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SITECACHE_INSERT_BATCH_SIZE", "100");
            jail.set_env("SITECACHE_LISTEN_ADDR", "0.0.0.0:5000");
            let config = AppConfig::from_figment(AppConfig::figment()).unwrap();
            assert_eq!(config.insert_batch_size, 100);
            assert_eq!(config.listen_addr, "0.0.0.0:5000");
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("sitecache.toml", "stale_after_secs = 600\nuser_agent = \"sitecache-test/1\"")?;
            jail.set_env("SITECACHE_CONFIG_FILE", "sitecache.toml");
            let config = AppConfig::from_figment(AppConfig::figment()).unwrap();
            assert_eq!(config.stale_after_secs, 600);
            assert_eq!(config.user_agent, "sitecache-test/1");
            Ok(())
        });
    }
}
