//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

use crate::error::Result;
use crate::telemetry::LoggingConfig;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Module metadata cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Module lifecycle configuration
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache module rows between lookups
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of cached module rows
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// How long a cached row stays valid
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_max_entries(),
            ttl: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    /// A configuration that never caches.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Serialize enable/disable calls for the same school within this process
    #[serde(default = "default_serialize_per_tenant")]
    pub serialize_per_tenant: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            serialize_per_tenant: default_serialize_per_tenant(),
        }
    }
}

// Default value functions
fn default_cache_enabled() -> bool { true }
fn default_cache_max_entries() -> usize { 256 }
fn default_cache_ttl() -> Duration { Duration::from_secs(300) }
fn default_serialize_per_tenant() -> bool { true }

impl Config {
    /// Load configuration from the environment (`SCHOOLGATE__SECTION__KEY`).
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SCHOOLGATE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SCHOOLGATE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::telemetry::LogFormat;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_entries, 256);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert!(config.lifecycle.serialize_per_tenant);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_with_humantime_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schoolgate.toml");
        std::fs::write(
            &path,
            r#"
[cache]
max_entries = 16
ttl = "90s"

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.cache.max_entries, 16);
        assert_eq!(config.cache.ttl, Duration::from_secs(90));
        assert!(config.cache.enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.lifecycle.serialize_per_tenant);
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schoolgate.toml");
        std::fs::write(&path, "[cache]\nmax_entries = \"many\"\n").unwrap();

        let err = Config::from_file(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
        assert!(err.to_string().starts_with("Configuration error:"));

        let missing = dir.path().join("absent.toml");
        let err = Config::from_file(missing.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_disabled_cache() {
        assert!(!CacheConfig::disabled().enabled);
    }
}
