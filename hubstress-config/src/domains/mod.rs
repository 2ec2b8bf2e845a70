//! Domain-specific configuration modules

pub mod http;
pub mod hub;
pub mod logging;
pub mod stress;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main hubstress configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HubstressConfig {
    /// Target hub configuration (endpoint, token, username prefix)
    #[serde(default)]
    pub hub: hub::HubConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Stress run configuration (counts, batching, worker pools)
    #[serde(default)]
    pub stress: stress::StressConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl HubstressConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.hub.validate()?;
        self.http.validate()?;
        self.stress.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = HubstressConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
