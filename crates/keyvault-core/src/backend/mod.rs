//! Vault backends
//!
//! A backend is the narrow interface to whatever actually stores secrets.
//! `SecretClient` and `OperationPoller` are written against the
//! `VaultBackend` trait only.

mod traits;
mod memory;
mod rpc;
mod registry;

pub use traits::{BackendCapabilities, VaultBackend};
pub use memory::{MemoryBackendConfig, MemoryVaultBackend, DEFAULT_RECOVERABLE_DAYS};
pub use rpc::RpcVaultBackend;
pub use registry::{
    create_backend, has_backend, list_backends, register_backend, unregister_backend,
    BackendDefinition, BackendFactory,
};
