//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SEGLOG_CONFIG or --config)
//! 3. Environment variables

use seglog_storage::PartitionConfig;
use seglog_wal::DEFAULT_MAX_RECORD_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Reader configuration.
    pub reader: ReaderConfig,
}

impl Config {
    /// Loads configuration from `path` (or defaults), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.storage.apply_env_overrides();
        self.reader.apply_env_overrides();
    }

    /// Checks values the storage layer would reject later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_record_size < 4 {
            return Err(ConfigError::ValidationError(format!(
                "storage.max_record_size must be at least 4, got {}",
                self.storage.max_record_size
            )));
        }
        if self.reader.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reader.poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per partition.
    pub data_dir: PathBuf,
    /// Maximum record payload size in bytes.
    pub max_record_size: usize,
    /// Create partition directories on first write.
    pub create_partitions: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            create_partitions: true,
        }
    }
}

impl StorageConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SEGLOG_DATA") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(size) = std::env::var("SEGLOG_MAX_RECORD_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_record_size = n;
            }
        }

        if let Ok(create) = std::env::var("SEGLOG_CREATE_PARTITIONS") {
            self.create_partitions = create == "1" || create.to_lowercase() == "true";
        }
    }

    /// Resolves a partition argument. Absolute paths are used as given.
    pub fn partition_dir(&self, partition: impl AsRef<Path>) -> PathBuf {
        let partition = partition.as_ref();
        if partition.is_absolute() {
            partition.to_path_buf()
        } else {
            self.data_dir.join(partition)
        }
    }

    /// Builds the writer configuration for a partition.
    pub fn partition_config(&self, partition: impl AsRef<Path>) -> PartitionConfig {
        PartitionConfig::new(self.partition_dir(partition))
            .with_max_record_size(self.max_record_size)
            .with_create(self.create_partitions)
    }
}

/// Reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Poll interval for `read --follow`, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
        }
    }
}

impl ReaderConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(ms) = std::env::var("SEGLOG_POLL_INTERVAL_MS") {
            if let Ok(n) = ms.parse() {
                self.poll_interval_ms = n;
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::SerializeError(e) => write!(f, "failed to render config: {}", e),
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
