//! Configuration loading and environment variable handling

use crate::domains::HubstressConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;

/// Configuration loader with environment variable support
///
/// Prefixed variables (`HUBSTRESS_*`) override file values. The hub
/// endpoint/token additionally honor the unprefixed `JUPYTERHUB_ENDPOINT`
/// and `JUPYTERHUB_API_TOKEN` variables that operators of the hub already
/// have in their environment.
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "HUBSTRESS".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<HubstressConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: HubstressConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<HubstressConfig> {
        let mut config = HubstressConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<HubstressConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut HubstressConfig) -> ConfigResult<()> {
        self.apply_hub_overrides(&mut config.hub)?;
        self.apply_http_overrides(&mut config.http)?;
        self.apply_stress_overrides(&mut config.stress)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply hub config overrides
    fn apply_hub_overrides(&self, config: &mut crate::domains::hub::HubConfig) -> ConfigResult<()> {
        if let Ok(endpoint) = std::env::var("JUPYTERHUB_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(token) = std::env::var("JUPYTERHUB_API_TOKEN") {
            config.token = token;
        }

        if let Ok(prefix) = self.get_env_var("USERNAME_PREFIX") {
            config.username_prefix = prefix;
        }

        Ok(())
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Ok(timeout) = self.get_env_var("HTTP_TIMEOUT") {
            let seconds: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_TIMEOUT: {}", e)))?;
            config.timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(verify_ssl) = self.get_env_var("HTTP_VERIFY_SSL") {
            config.verify_ssl = verify_ssl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid HTTP_VERIFY_SSL: {}", e)))?;
        }

        Ok(())
    }

    /// Apply stress config overrides
    fn apply_stress_overrides(
        &self,
        config: &mut crate::domains::stress::StressConfig,
    ) -> ConfigResult<()> {
        if let Ok(count) = self.get_env_var("COUNT") {
            config.count = count
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid COUNT: {}", e)))?;
        }

        if let Ok(batch_size) = self.get_env_var("BATCH_SIZE") {
            config.batch_size = batch_size
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid BATCH_SIZE: {}", e)))?;
        }

        if let Ok(workers) = self.get_env_var("WORKERS") {
            config.workers = workers
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKERS: {}", e)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            use std::str::FromStr;
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
