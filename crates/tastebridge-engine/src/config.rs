use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use tastebridge_sync::{CacheSettings, ClientSettings};

use crate::settings::{EngineSettings, ResolverSettings};

/// Configuration for tastebridge.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (TASTEBRIDGE_* prefix)
/// 3. Config file (~/.config/tastebridge/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog-A endpoints, timeouts and retry budget.
    pub client: ClientSettings,

    /// Profile cache TTLs, cooldown and fetch limits.
    pub cache: CacheSettings,

    /// Recommendation weights, caps and timeout.
    pub engine: EngineSettings,

    /// Match scoring weights, threshold and batch size.
    pub resolver: ResolverSettings,

    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: TASTEBRIDGE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/tastebridge/tastebridge.db
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            cache: CacheSettings::default(),
            engine: EngineSettings::default(),
            resolver: ResolverSettings::default(),
            database_path: default_db_path(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("tastebridge");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        log::debug!("configuration loaded (config file: {})", config_path.display());

        Ok(config)
    }

    /// Load configuration with a custom database path (the `--db` flag).
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tastebridge")
        .join("tastebridge.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/tastebridge/config.toml
/// - macOS: ~/Library/Application Support/tastebridge/config.toml
/// - Windows: %APPDATA%\tastebridge\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tastebridge")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Tastebridge Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (TASTEBRIDGE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)
#
# Every value below is a default; uncomment to change it.

# Path to the SQLite database holding the session, the profile cache and
# the cross-catalog match cache.
#
# Can also be set via:
# - CLI: tastebridge --db /custom/path.db status
# - Environment: TASTEBRIDGE_DATABASE_PATH=/custom/path.db
#database_path = "/path/to/custom/tastebridge.db"

[client]
#request_timeout_secs = 15
#max_retries = 2
#retry_min_delay_ms = 500
#retry_max_delay_ms = 4000
# Used when a rate-limit response carries no Retry-After header
#default_retry_after_secs = 30
#graphql_requests_per_second = 5

[cache]
# Top items built with the personal top-items source
#full_ttl_secs = 21600
# Top items built without it (rate limited); retried sooner
#degraded_ttl_secs = 1800
#followed_ttl_secs = 86400
#related_ttl_secs = 604800
#tier2_timeout_secs = 8
#cooldown_base_secs = 300
#cooldown_max_secs = 3600
#history_lookback_days = 90
#related_seed_limit = 10

[engine]
#profile_ttl_secs = 1800
#artist_cap = 3
#bucket_run_limit = 3
#neighbor_limit = 6
#neighbor_floor = 0.1
#recommendation_timeout_secs = 10
#seed_resolution_timeout_secs = 5

[resolver]
#title_weight = 0.45
#artist_weight = 0.35
#duration_weight = 0.20
#studio_bonus = 0.05
#threshold = 0.35
#batch_size = 5
#search_timeout_secs = 5
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;
    log::info!("wrote example config to {}", config_path.display());

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert_eq!(config.resolver.threshold, 0.35);
        assert_eq!(config.engine.artist_cap, 3);
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/tastebridge-test.db");
        let config = Config::load_with_db_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }

    #[test]
    fn test_sections_deserialize_partially() {
        let json = r#"{"cache": {"degraded_ttl_secs": 60}, "resolver": {"threshold": 0.5}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache.degraded_ttl_secs, 60);
        assert_eq!(config.cache.full_ttl_secs, CacheSettings::default().full_ttl_secs);
        assert_eq!(config.resolver.threshold, 0.5);
        assert_eq!(config.engine, EngineSettings::default());
    }
}
