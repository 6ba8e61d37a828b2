//! Configuration management with validation and defaults
//!
//! Loaded from TOML, then overridden by `FAIRWAY_*` environment variables.

use crate::errors::{ConfigurationError, FairwayResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FairwayConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    /// Whether to clear database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/fairway_data".to_string(),
            write_buffer_size_mb: 64,
            clear_on_start: false,
        }
    }
}

/// Settlement engine tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Attempts per settlement run before a conflict is surfaced as contention
    pub max_conflict_retries: u32,
    /// How long a press stays answerable
    pub press_window_secs: u64,
    pub expiry_sweep_interval_secs: u64,
    /// How long a score write waits for its settlement summary before replying
    pub await_settlement_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            press_window_secs: 300,
            expiry_sweep_interval_secs: 30,
            await_settlement_ms: 2_000,
        }
    }
}

/// HTTP API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fairway=info,tower_http=info".to_string(),
        }
    }
}

impl FairwayConfig {
    /// In-memory friendly configuration for tests and local runs
    pub fn testing() -> Self {
        Self {
            storage: StorageConfig {
                clear_on_start: true,
                ..Default::default()
            },
            settlement: SettlementConfig {
                expiry_sweep_interval_secs: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage.data_directory.is_empty() {
            return Err(ConfigurationError::MissingRequired(
                "storage.data_directory".to_string(),
            ));
        }

        if self.settlement.max_conflict_retries == 0 {
            return Err(invalid(
                "settlement.max_conflict_retries",
                "0",
                "at least one settlement attempt is required",
            ));
        }

        if self.settlement.press_window_secs == 0 {
            return Err(invalid(
                "settlement.press_window_secs",
                "0",
                "a press must be answerable for some time",
            ));
        }

        if self.settlement.expiry_sweep_interval_secs == 0 {
            return Err(invalid(
                "settlement.expiry_sweep_interval_secs",
                "0",
                "sweep interval cannot be zero",
            ));
        }

        if self.api.port == 0 {
            return Err(invalid("api.port", "0", "Port cannot be zero"));
        }

        Ok(())
    }

    pub fn press_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.settlement.press_window_secs as i64)
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.settlement.expiry_sweep_interval_secs)
    }

    pub fn await_settlement(&self) -> Duration {
        Duration::from_millis(self.settlement.await_settlement_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> FairwayResult<FairwayConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => FairwayConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> FairwayResult<FairwayConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut FairwayConfig) -> FairwayResult<()> {
        if let Ok(dir) = env::var("FAIRWAY_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Ok(host) = env::var("FAIRWAY_API_HOST") {
            config.api.host = host;
        }
        if let Ok(port) = env::var("FAIRWAY_API_PORT") {
            config.api.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "FAIRWAY_API_PORT".to_string(),
                value: port.clone(),
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Ok(retries) = env::var("FAIRWAY_MAX_CONFLICT_RETRIES") {
            config.settlement.max_conflict_retries =
                retries.parse().map_err(|_| ConfigurationError::InvalidValue {
                    field: "FAIRWAY_MAX_CONFLICT_RETRIES".to_string(),
                    value: retries.clone(),
                    reason: "Invalid retry count".to_string(),
                })?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &FairwayConfig, path: &str) -> FairwayResult<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = FairwayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settlement.max_conflict_retries, 3);
        assert_eq!(config.press_window(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(FairwayConfig::testing().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = FairwayConfig::default();
        config.settlement.max_conflict_retries = 0;
        assert!(config.validate().is_err());

        let mut config = FairwayConfig::default();
        config.storage.data_directory.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_save_and_load_config() -> FairwayResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = FairwayConfig::default();
        original.settlement.press_window_secs = 120;
        ConfigLoader::new().save(&original, path)?;

        let loaded = ConfigLoader::new().with_path(path).load()?;
        assert_eq!(loaded.settlement.press_window_secs, 120);
        assert_eq!(loaded.api.port, original.api.port);

        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FairwayConfig = toml::from_str("[api]\nhost = \"127.0.0.1\"\nport = 9000\nallowed_origins = []\nrequest_timeout_secs = 5\n").unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.settlement.max_conflict_retries, 3);
    }
}
