//! Backend registry for creating vault backends by name

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;

use super::memory::MemoryVaultBackend;
use super::rpc::RpcVaultBackend;
use super::traits::VaultBackend;
use crate::config::{ConfigFile, CredentialSource};
use crate::credentials::{CredentialProvider, EnvCredentialProvider};
use crate::error::{VaultError, VaultResult};
use crate::logging::Logger;
use crate::rpc::{default_socket_path, RpcEndpoint};

/// Factory function type for creating backends from configuration
pub type BackendFactory =
    Box<dyn Fn(&ConfigFile, Arc<dyn Logger>) -> VaultResult<Arc<dyn VaultBackend>> + Send + Sync>;

/// Definition of a registered backend
pub struct BackendDefinition {
    /// Unique name for this backend
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Factory function to create instances
    pub factory: BackendFactory,
}

impl std::fmt::Debug for BackendDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

fn memory_factory(config: &ConfigFile, logger: Arc<dyn Logger>) -> VaultResult<Arc<dyn VaultBackend>> {
    Ok(Arc::new(MemoryVaultBackend::with_config(config.memory_backend_config(), logger)))
}

fn rpc_factory(config: &ConfigFile, logger: Arc<dyn Logger>) -> VaultResult<Arc<dyn VaultBackend>> {
    let socket_path = config
        .vault
        .socket_path
        .clone()
        .unwrap_or_else(|| default_socket_path(true));
    let endpoint = RpcEndpoint::new("config", socket_path)
        .with_timeout(Duration::from_millis(config.vault.request_timeout_ms));

    let credentials: Option<Arc<dyn CredentialProvider>> = match config.vault.credentials {
        CredentialSource::None => None,
        CredentialSource::Env => Some(Arc::new(EnvCredentialProvider::new())),
    };

    logger.debug(&format!(
        "BackendRegistry: rpc backend at {}",
        endpoint.socket_path.display()
    ));
    Ok(Arc::new(RpcVaultBackend::new(&endpoint, credentials)))
}

/// Global registry of vault backends
static REGISTRY: Lazy<RwLock<HashMap<String, BackendDefinition>>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert(
        "memory".to_string(),
        BackendDefinition {
            name: "memory".to_string(),
            description: "In-process vault with soft-delete and recovery".to_string(),
            factory: Box::new(memory_factory),
        },
    );

    map.insert(
        "rpc".to_string(),
        BackendDefinition {
            name: "rpc".to_string(),
            description: "Out-of-process vault over JSON-RPC on a Unix socket".to_string(),
            factory: Box::new(rpc_factory),
        },
    );

    RwLock::new(map)
});

/// Register a new backend type, replacing any backend with the same name
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use keyvault_core::backend::{register_backend, MemoryVaultBackend};
///
/// register_backend(
///     "scratch",
///     "Throwaway in-memory vault",
///     Box::new(|_config, logger| Ok(Arc::new(MemoryVaultBackend::new(logger)))),
/// );
/// ```
pub fn register_backend(name: &str, description: &str, factory: BackendFactory) {
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(
        name.to_string(),
        BackendDefinition {
            name: name.to_string(),
            description: description.to_string(),
            factory,
        },
    );
}

/// Create a backend by name
///
/// Unknown names are reported as `InvalidArgument`.
pub fn create_backend(
    name: &str,
    config: &ConfigFile,
    logger: Arc<dyn Logger>,
) -> VaultResult<Arc<dyn VaultBackend>> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    let definition = registry
        .get(name)
        .ok_or_else(|| VaultError::invalid_argument(format!("unknown backend: {}", name)))?;
    (definition.factory)(config, logger)
}

/// List all registered backends as (name, description) pairs, sorted by name
pub fn list_backends() -> Vec<(String, String)> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    let mut backends: Vec<_> = registry
        .values()
        .map(|def| (def.name.clone(), def.description.clone()))
        .collect();
    backends.sort();
    backends
}

/// Check if a backend is registered
pub fn has_backend(name: &str) -> bool {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    registry.contains_key(name)
}

/// Unregister a backend (mainly for testing)
pub fn unregister_backend(name: &str) -> bool {
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.remove(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use std::path::PathBuf;

    fn logger() -> Arc<dyn Logger> {
        Arc::new(NoOpLogger)
    }

    #[test]
    fn test_builtin_backends_registered() {
        assert!(has_backend("memory"));
        assert!(has_backend("rpc"));

        let names: Vec<_> = list_backends().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"memory".to_string()));
        assert!(names.contains(&"rpc".to_string()));
    }

    #[tokio::test]
    async fn test_create_memory_backend_uses_config() {
        let mut config = ConfigFile::default();
        config.vault.url = "https://bank.vault.test".to_string();
        config.memory.soft_delete = false;

        let backend = create_backend("memory", &config, logger()).unwrap();
        assert_eq!(backend.name(), "memory");
        assert!(!backend.capabilities().await.unwrap().soft_delete);

        let version = backend
            .put_secret_version("A", "x".into(), Default::default())
            .await
            .unwrap();
        assert!(version.properties.id.starts_with("https://bank.vault.test/secrets/A/"));
    }

    #[test]
    fn test_create_rpc_backend_uses_socket_from_config() {
        let mut config = ConfigFile::default();
        config.vault.socket_path = Some(PathBuf::from("/tmp/keyvault-registry-test.sock"));

        let backend = create_backend("rpc", &config, logger()).unwrap();
        assert_eq!(backend.name(), "rpc:config");
    }

    #[test]
    fn test_create_unknown_backend() {
        let result = create_backend("nonexistent_xyz", &ConfigFile::default(), logger());
        assert!(matches!(result, Err(VaultError::InvalidArgument(_))));
    }

    #[test]
    fn test_register_custom_backend() {
        register_backend(
            "test_custom_backend",
            "A test backend",
            Box::new(|_, logger| Ok(Arc::new(MemoryVaultBackend::without_soft_delete(logger)))),
        );
        assert!(has_backend("test_custom_backend"));

        let backend = create_backend("test_custom_backend", &ConfigFile::default(), logger()).unwrap();
        assert_eq!(backend.name(), "memory");

        assert!(unregister_backend("test_custom_backend"));
        assert!(!has_backend("test_custom_backend"));
    }
}
