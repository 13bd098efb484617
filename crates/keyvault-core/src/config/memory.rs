//! In-memory configuration provider

use parking_lot::RwLock;

use super::file::ConfigFile;
use super::traits::{ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<ConfigFile>,
}

impl MemoryConfigProvider {
    /// Create a provider holding the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding `config`
    pub fn with_config(config: ConfigFile) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn load(&self) -> ConfigResult<ConfigFile> {
        Ok(self.config.read().clone())
    }

    fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        config.validate()?;
        *self.config.write() = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_memory_config_provider() {
        let provider = MemoryConfigProvider::new();
        let mut config = provider.load().unwrap();
        assert_eq!(config.vault.backend, "memory");

        config.vault.url = "https://bank.vault.test/".to_string();
        provider.save(&config).unwrap();
        assert_eq!(provider.load().unwrap().vault.url, "https://bank.vault.test/");

        // Invalid configs are rejected and leave the stored one alone
        config.vault.backend.clear();
        assert!(matches!(provider.save(&config), Err(ConfigError::Invalid(_))));
        assert_eq!(provider.load().unwrap().vault.backend, "memory");
    }
}
