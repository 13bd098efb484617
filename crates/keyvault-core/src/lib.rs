//! Keyvault Core
//!
//! Secret lifecycle management over a pluggable vault backend.
//!
//! - `SecretClient`: versioned upserts, reads, listing, property updates,
//!   and the delete → purge (or recover) lifecycle
//! - `OperationPoller`: waits on long-running backend operations with
//!   backoff, deadlines and local cancellation
//! - `VaultBackend`: the narrow storage interface, with an in-memory
//!   implementation and a JSON-RPC implementation for out-of-process vaults
//!
//! ```rust,ignore
//! use keyvault_core::{SecretClient, MemoryVaultBackend, SecretAttributes, TracingLogger};
//!
//! let logger = Arc::new(TracingLogger::new());
//! let client = SecretClient::new(Arc::new(MemoryVaultBackend::new(logger.clone())), logger);
//!
//! client.set_secret("A", "x".into(), SecretAttributes::new()).await?;
//! let deleted = client.begin_delete("A").await?.wait_for_completion(None).await?;
//! client.purge(deleted.name()).await?;
//! ```

pub mod types;
pub mod error;
pub mod backend;
pub mod store;
pub mod poller;
pub mod credentials;
pub mod rpc;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use types::{
    SecretValue, SecretState, SecretProperties, SecretVersion, SecretAttributes,
    PropertiesUpdate, DeletedSecret,
    OperationToken, OperationStatus, PollResponse, OperationOutcome,
    CancellationToken,
};

pub use error::{VaultError, VaultResult};

pub use backend::{
    VaultBackend, BackendCapabilities,
    MemoryVaultBackend, MemoryBackendConfig, RpcVaultBackend,
    register_backend, create_backend, list_backends,
};

pub use store::{SecretClient, SecretPropertiesPager};

pub use poller::{OperationPoller, OperationOutput, PollerConfig, TerminalResult};

pub use credentials::{AccessToken, CredentialProvider, StaticCredentialProvider, EnvCredentialProvider};

pub use rpc::{RpcClient, RpcEndpoint, RpcError, RpcVaultServer};

pub use config::{ConfigProvider, ConfigFile, FileConfigProvider, MemoryConfigProvider};

pub use logging::{Logger, NoOpLogger, ConsoleLogger, TracingLogger};
