//! Engine configuration with TOML file support.

use crate::error::FarmError;
use farm_types::FarmingParams;
use farm_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of a process embedding the farming engine.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. "info" or "warn,farm_engine=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Farming parameters. Normally set at genesis and changed by
    /// governance; the file value seeds fresh chains and tests.
    #[serde(default)]
    pub params: FarmingParams,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, FarmError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| FarmError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string. Parameters are validated.
    pub fn from_toml_str(s: &str) -> Result<Self, FarmError> {
        let config: Self = toml::from_str(s).map_err(|e| FarmError::Config(e.to_string()))?;
        config
            .params
            .validate()
            .map_err(|e| FarmError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Install the global tracing subscriber with the configured format
    /// and level.
    pub fn init_logging(&self) -> Result<(), FarmError> {
        farm_utils::init_logging(self.log_format, &self.log_level)
            .map_err(|e| FarmError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, FarmError> {
        toml::to_string_pretty(self).map_err(|e| FarmError::Config(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            params: FarmingParams::default(),
        }
    }
}
