//! Vault backend trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::types::{
    DeletedSecret, OperationOutcome, OperationToken, PollResponse, SecretAttributes,
    SecretProperties, SecretValue, SecretVersion,
};

/// What a backend can do beyond the required interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendCapabilities {
    /// Deleted secrets are kept (and purgeable/recoverable) instead of
    /// disappearing when the delete operation completes
    pub soft_delete: bool,
    /// In-flight operations can be cancelled on the backend
    pub operation_cancel: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            soft_delete: true,
            operation_cancel: false,
        }
    }
}

/// Narrow interface to the service that actually stores secrets
///
/// Implementations:
/// - `MemoryVaultBackend`: In-process reference implementation
/// - `RpcVaultBackend`: Forwards to an out-of-process vault over JSON-RPC
///
/// Backends own storage, transport and authentication. They report failures
/// with the `VaultError` taxonomy and never retry on the caller's behalf.
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &str;

    /// Capabilities of this backend
    async fn capabilities(&self) -> VaultResult<BackendCapabilities>;

    /// Append a new version (creating the secret if needed)
    async fn put_secret_version(
        &self,
        name: &str,
        value: SecretValue,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretVersion>;

    /// Fetch a version; `None` means the current one
    async fn get_secret_version(&self, name: &str, version: Option<&str>) -> VaultResult<SecretVersion>;

    /// Properties of the current version of every active secret, ordered by
    /// name. With a name, only that secret is considered.
    async fn list_current_properties(&self, name: Option<&str>) -> VaultResult<Vec<SecretProperties>>;

    /// Properties of every version of one secret, in creation order
    async fn list_versions(&self, name: &str) -> VaultResult<Vec<SecretProperties>>;

    /// Change the attributes of one version
    async fn update_properties(
        &self,
        name: &str,
        version: &str,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretProperties>;

    /// Begin deleting a secret
    async fn start_delete(&self, name: &str) -> VaultResult<OperationToken>;

    /// Report the progress of an operation
    async fn poll_operation(&self, token: &OperationToken) -> VaultResult<PollResponse<OperationOutcome>>;

    /// Permanently remove a soft-deleted secret
    async fn purge(&self, name: &str) -> VaultResult<()>;

    /// Fetch a soft-deleted secret
    async fn get_deleted(&self, name: &str) -> VaultResult<DeletedSecret>;

    /// All soft-deleted secrets, ordered by name
    async fn list_deleted(&self) -> VaultResult<Vec<DeletedSecret>>;

    /// Begin recovering a soft-deleted secret
    async fn start_recover(&self, name: &str) -> VaultResult<OperationToken>;

    /// Cancel an in-flight operation
    ///
    /// Only meaningful when `capabilities().operation_cancel` is true.
    async fn cancel_operation(&self, token: &OperationToken) -> VaultResult<()> {
        Err(VaultError::unsupported(
            self.name(),
            format!("cannot cancel operation {}", token),
        ))
    }
}
