//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/keyvault/config.yaml) and workspace-level (.config/keyvault/config.yaml) config.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigProvider, ConfigResult};
use crate::backend::MemoryBackendConfig;

/// Where the backend gets its credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Send no token
    #[default]
    None,
    /// Read a token from `KEYVAULT_ACCESS_TOKEN` / `AZURE_ACCESS_TOKEN`
    Env,
}

/// Which vault to talk to and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VaultSettings {
    /// Base URL used in secret identifiers
    pub url: String,
    /// Registered backend name ("memory", "rpc", ...)
    pub backend: String,
    /// Socket for the rpc backend; defaults to the standard runtime location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// Per-request deadline for the rpc backend
    pub request_timeout_ms: u64,
    pub credentials: CredentialSource,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            url: "https://memory.vault.local/".to_string(),
            backend: "memory".to_string(),
            socket_path: None,
            request_timeout_ms: 5000,
            credentials: CredentialSource::None,
        }
    }
}

/// How long-running operations are polled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollingSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
    /// Give up waiting after this long; unset waits indefinitely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 250,
            max_interval_ms: 5000,
            multiplier: 2.0,
            timeout_secs: None,
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub vault: VaultSettings,
    pub polling: PollingSettings,
    /// Settings for the in-memory backend
    pub memory: MemoryBackendConfig,
}

impl ConfigFile {
    /// Check the settings for values no backend or poller can work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.vault.backend.trim().is_empty() {
            return Err(ConfigError::Invalid("vault.backend must not be empty".to_string()));
        }
        if !(self.vault.url.starts_with("https://") || self.vault.url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "vault.url must be an http(s) URL, got {:?}",
                self.vault.url
            )));
        }
        if self.polling.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid("polling.initialIntervalMs must be positive".to_string()));
        }
        if self.polling.max_interval_ms < self.polling.initial_interval_ms {
            return Err(ConfigError::Invalid(
                "polling.maxIntervalMs must be at least polling.initialIntervalMs".to_string(),
            ));
        }
        if !(self.polling.multiplier >= 1.0) {
            return Err(ConfigError::Invalid("polling.multiplier must be >= 1.0".to_string()));
        }
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("KEYVAULT_URL") {
            self.vault.url = url;
        }
        if let Some(backend) = non_empty("KEYVAULT_BACKEND") {
            self.vault.backend = backend;
        }
        if let Some(socket) = non_empty("KEYVAULT_SOCKET") {
            self.vault.socket_path = Some(PathBuf::from(socket));
        }
    }

    /// Memory backend settings with the vault URL applied
    pub fn memory_backend_config(&self) -> MemoryBackendConfig {
        MemoryBackendConfig {
            vault_url: self.vault.url.clone(),
            ..self.memory.clone()
        }
    }
}

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/keyvault/config.yaml)
    User,
    /// Workspace-level config (.config/keyvault/config.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// File-based configuration provider
///
/// Reads and writes configuration from YAML files.
///
/// # Example
///
/// ```no_run
/// use keyvault_core::config::{ConfigProvider, FileConfigProvider};
///
/// let config = FileConfigProvider::user().load().unwrap();
/// println!("vault: {}", config.vault.url);
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<ConfigFile>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/keyvault/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        let path = config_dir.join("keyvault").join("config.yaml");
        Self::new(path, ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/keyvault/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("keyvault").join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the config level
    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read_from_disk(&self) -> ConfigResult<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", self.path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn store_cache(&self, config: &ConfigFile) {
        if let Ok(mut cache) = self.cache.write() {
            *cache = Some(config.clone());
        }
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<ConfigFile> {
        let config = self.read_from_disk()?;
        self.store_cache(&config);
        Ok(config)
    }

    /// Create a backup of the current config file
    pub fn backup(&self) -> ConfigResult<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }

        let backup_path = self.path.with_extension("yaml.backup");
        fs::copy(&self.path, &backup_path)?;
        Ok(Some(backup_path))
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> ConfigResult<ConfigFile> {
        if let Ok(cache) = self.cache.read() {
            if let Some(config) = cache.as_ref() {
                return Ok(config.clone());
            }
        }
        self.reload()
    }

    fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        config.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(config)
            .map_err(|e| ConfigError::Other(format!("Failed to serialize YAML: {}", e)))?;
        fs::write(&self.path, content)?;

        self.store_cache(config);
        Ok(())
    }
}
