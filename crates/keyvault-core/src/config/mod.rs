//! Configuration for the vault client
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigProvider`: In-memory for testing
//! - `FileConfigProvider`: YAML file-based (user/workspace level)
//!
//! Environment variables (`KEYVAULT_URL`, `KEYVAULT_BACKEND`,
//! `KEYVAULT_SOCKET`) override whatever the file says.

mod traits;
mod memory;
mod file;

pub use traits::{ConfigProvider, ConfigError, ConfigResult};
pub use memory::MemoryConfigProvider;
pub use file::{
    FileConfigProvider, ConfigFile, ConfigLevel, VaultSettings, PollingSettings, CredentialSource,
};
