//! Configuration loader with layered sources.

use crate::AppConfig;
use comunidad_core::ComunidadError;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Environment variable prefix; nested keys use `__` (`COMUNIDAD__CACHE__KEY_PREFIX`).
pub const ENV_PREFIX: &str = "COMUNIDAD";

/// Configuration loader with runtime refresh support.
#[derive(Clone)]
pub struct ConfigLoader {
    config: Arc<RwLock<AppConfig>>,
    config_dir: String,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    ///
    /// Configuration is loaded from multiple sources in order:
    /// 1. `config/default.toml` - Default values
    /// 2. `config/{environment}.toml` - Environment-specific overrides
    /// 3. `config/local.toml` - Uncommitted local overrides
    /// 4. Environment variables with `COMUNIDAD__` prefix
    pub fn new(config_dir: impl Into<String>) -> Result<Self, ComunidadError> {
        let config_dir = config_dir.into();
        let config = Self::load_config(&config_dir)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_dir,
        })
    }

    /// Loads configuration from the default location (`./config`).
    pub fn from_default_location() -> Result<Self, ComunidadError> {
        Self::new("./config")
    }

    /// Returns the current configuration.
    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Reloads the configuration from disk.
    pub async fn reload(&self) -> Result<(), ComunidadError> {
        let new_config = Self::load_config(&self.config_dir)?;
        let mut config = self.config.write().await;
        *config = new_config;
        info!("Configuration reloaded successfully");
        Ok(())
    }

    fn load_config(config_dir: &str) -> Result<AppConfig, ComunidadError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file found or error loading it: {}", e);
        }

        let environment =
            std::env::var("COMUNIDAD_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        info!("Loading configuration for environment: {}", environment);

        let mut builder = Config::builder();

        for name in ["default", environment.as_str(), "local"] {
            let path = format!("{}/{}.toml", config_dir, name);
            if Path::new(&path).exists() {
                debug!("Loading config from: {}", path);
                builder = builder.add_source(File::with_name(&path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let app_config: AppConfig = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error_to_comunidad_error)?;

        Self::validate_config(&app_config)?;

        Ok(app_config)
    }

    /// Validates the configuration.
    fn validate_config(config: &AppConfig) -> Result<(), ComunidadError> {
        if config.database.url.is_empty() {
            return Err(ComunidadError::Configuration(
                "Database URL is required".to_string(),
            ));
        }

        if config.cache.enabled && config.redis.url.is_empty() {
            return Err(ComunidadError::Configuration(
                "Redis URL is required when the cache is enabled".to_string(),
            ));
        }

        if config.cache.default_ttl_secs == 0 {
            return Err(ComunidadError::Configuration(
                "cache.default_ttl_secs must be greater than zero".to_string(),
            ));
        }

        if config.cache.invalidation_channel == config.cache.health_channel {
            return Err(ComunidadError::Configuration(
                "Invalidation and health channels must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Gets a specific configuration value by key path.
    pub async fn get_value<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let config = self.config.read().await;
        let json = serde_json::to_value(&*config).ok()?;

        let mut current = &json;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        serde_json::from_value(current.clone()).ok()
    }
}

fn config_error_to_comunidad_error(err: ConfigError) -> ComunidadError {
    ComunidadError::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheConfig, TtlPreset};
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache.key_prefix, "comunidad:");
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.health_check_interval(), Duration::from_secs(30));
        assert_eq!(config.redis.max_retries_per_command, 3);
    }

    #[test]
    fn test_ttl_presets_are_ordered() {
        let cache = CacheConfig::default();
        assert!(cache.ttl(TtlPreset::Short) < cache.ttl(TtlPreset::Default));
        assert!(cache.ttl(TtlPreset::Default) < cache.ttl(TtlPreset::Long));
        assert_eq!(cache.ttl(TtlPreset::Default), cache.default_ttl());
    }

    #[tokio::test]
    async fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            r#"
[cache]
key_prefix = "test:"
default_ttl_secs = 120

[redis]
url = "redis://cache:6379"
"#,
        )
        .unwrap();

        let loader = ConfigLoader::new(dir.path().to_string_lossy()).unwrap();
        let config = loader.get().await;

        assert_eq!(config.cache.key_prefix, "test:");
        assert_eq!(config.cache.default_ttl_secs, 120);
        assert_eq!(config.cache.short_ttl_secs, 60);
        assert_eq!(config.redis.url, "redis://cache:6379");

        let prefix: Option<String> = loader.get_value("cache.key_prefix").await;
        assert_eq!(prefix.as_deref(), Some("test:"));
    }

    #[test]
    fn test_rejects_shared_channels() {
        let mut config = AppConfig::default();
        config.cache.health_channel = config.cache.invalidation_channel.clone();
        assert!(ConfigLoader::validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.default_ttl_secs = 0;
        assert!(ConfigLoader::validate_config(&config).is_err());
    }
}
