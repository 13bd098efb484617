//! Configuration provider trait

use super::file::ConfigFile;

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: Reads from YAML file (~/.config/keyvault/config.yaml)
pub trait ConfigProvider: Send + Sync {
    /// Load the configuration; a missing source yields the defaults
    fn load(&self) -> ConfigResult<ConfigFile>;

    /// Persist the configuration
    fn save(&self, config: &ConfigFile) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
