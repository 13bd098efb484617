//! RPC-backed vault backend
//!
//! Implements the `VaultBackend` trait by making JSON-RPC calls to an
//! out-of-process vault (see `rpc::RpcVaultServer`).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use super::traits::{BackendCapabilities, VaultBackend};
use crate::credentials::CredentialProvider;
use crate::error::VaultResult;
use crate::rpc::protocol::*;
use crate::rpc::{RpcClient, RpcEndpoint};
use crate::types::{
    DeletedSecret, OperationOutcome, OperationToken, PollResponse, SecretAttributes,
    SecretProperties, SecretValue, SecretVersion,
};

/// A vault backend that uses JSON-RPC to reach a remote vault
pub struct RpcVaultBackend {
    name: String,
    client: RpcClient,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl RpcVaultBackend {
    /// Create a new RPC backend from an endpoint
    pub fn new(endpoint: &RpcEndpoint, credentials: Option<Arc<dyn CredentialProvider>>) -> Self {
        Self {
            name: format!("rpc:{}", endpoint.name),
            client: endpoint.client(),
            credentials,
        }
    }

    /// Check if the RPC endpoint is reachable
    pub async fn is_reachable(&self) -> bool {
        self.client.ping().await.unwrap_or(false)
    }

    async fn call<P: Serialize + Send, R: DeserializeOwned>(&self, method: &str, params: P) -> VaultResult<R> {
        let token = match &self.credentials {
            Some(provider) => Some(provider.get_token().await?),
            None => None,
        };
        let auth = token.as_ref().map(|t| t.token.as_str());
        Ok(self.client.call(method, params, auth).await?)
    }
}

impl std::fmt::Debug for RpcVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcVaultBackend")
            .field("name", &self.name)
            .field("socket_path", &self.client.socket_path())
            .field("credentials", &self.credentials.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

#[async_trait]
impl VaultBackend for RpcVaultBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capabilities(&self) -> VaultResult<BackendCapabilities> {
        self.call(METHOD_CAPABILITIES, json!({})).await
    }

    async fn put_secret_version(
        &self,
        name: &str,
        value: SecretValue,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretVersion> {
        self.call(
            METHOD_SET,
            SetParams {
                name: name.to_string(),
                value,
                attributes,
            },
        )
        .await
    }

    async fn get_secret_version(&self, name: &str, version: Option<&str>) -> VaultResult<SecretVersion> {
        self.call(
            METHOD_GET,
            GetParams {
                name: name.to_string(),
                version: version.map(str::to_string),
            },
        )
        .await
    }

    async fn list_current_properties(&self, name: Option<&str>) -> VaultResult<Vec<SecretProperties>> {
        self.call(METHOD_LIST, ListParams { name: name.map(str::to_string) }).await
    }

    async fn list_versions(&self, name: &str) -> VaultResult<Vec<SecretProperties>> {
        self.call(METHOD_VERSIONS, NameParams { name: name.to_string() }).await
    }

    async fn update_properties(
        &self,
        name: &str,
        version: &str,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretProperties> {
        self.call(
            METHOD_UPDATE,
            UpdateParams {
                name: name.to_string(),
                version: version.to_string(),
                attributes,
            },
        )
        .await
    }

    async fn start_delete(&self, name: &str) -> VaultResult<OperationToken> {
        self.call(METHOD_DELETE, NameParams { name: name.to_string() }).await
    }

    async fn poll_operation(&self, token: &OperationToken) -> VaultResult<PollResponse<OperationOutcome>> {
        self.call(METHOD_POLL, TokenParams { token: token.clone() }).await
    }

    async fn purge(&self, name: &str) -> VaultResult<()> {
        self.call(METHOD_PURGE, NameParams { name: name.to_string() }).await
    }

    async fn get_deleted(&self, name: &str) -> VaultResult<DeletedSecret> {
        self.call(METHOD_GET_DELETED, NameParams { name: name.to_string() }).await
    }

    async fn list_deleted(&self) -> VaultResult<Vec<DeletedSecret>> {
        self.call(METHOD_LIST_DELETED, json!({})).await
    }

    async fn start_recover(&self, name: &str) -> VaultResult<OperationToken> {
        self.call(METHOD_RECOVER, NameParams { name: name.to_string() }).await
    }

    async fn cancel_operation(&self, token: &OperationToken) -> VaultResult<()> {
        self.call(METHOD_CANCEL, TokenParams { token: token.clone() }).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackendConfig, MemoryVaultBackend};
    use crate::credentials::StaticCredentialProvider;
    use crate::error::VaultError;
    use crate::logging::{Logger, NoOpLogger};
    use crate::rpc::RpcVaultServer;
    use crate::types::{CancellationToken, OperationStatus};
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    struct Harness {
        _dir: TempDir,
        shutdown: CancellationToken,
        endpoint: RpcEndpoint,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    fn start_server(config: MemoryBackendConfig, auth: Option<&str>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("vault.sock");
        let listener = UnixListener::bind(&socket).unwrap();

        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let backend = Arc::new(MemoryVaultBackend::with_config(config, Arc::clone(&logger)));
        let server = Arc::new(RpcVaultServer::new(backend, auth.map(str::to_string), logger));

        let shutdown = CancellationToken::new();
        tokio::spawn(server.serve(listener, shutdown.clone()));

        Harness {
            _dir: dir,
            shutdown,
            endpoint: RpcEndpoint::new("test", socket),
        }
    }

    fn authed(harness: &Harness, token: &str) -> RpcVaultBackend {
        RpcVaultBackend::new(
            &harness.endpoint,
            Some(Arc::new(StaticCredentialProvider::new(token))),
        )
    }

    #[tokio::test]
    async fn test_rpc_backend_name() {
        let endpoint = RpcEndpoint::new("vault", "/tmp/test.sock");
        let backend = RpcVaultBackend::new(&endpoint, None);
        assert_eq!(backend.name(), "rpc:vault");
    }

    #[tokio::test]
    async fn test_unreachable_socket_is_backend_unavailable() {
        let endpoint = RpcEndpoint::new("gone", "/nonexistent/keyvault.sock");
        let backend = RpcVaultBackend::new(&endpoint, None);
        assert!(!backend.is_reachable().await);

        let err = backend.get_secret_version("A", None).await.unwrap_err();
        assert!(matches!(err, VaultError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_socket() {
        let harness = start_server(MemoryBackendConfig::default(), Some("token-1"));
        let backend = authed(&harness, "token-1");
        assert!(backend.is_reachable().await);

        let v1 = backend
            .put_secret_version("A", SecretValue::from("x"), SecretAttributes::new())
            .await
            .unwrap();
        let v2 = backend
            .put_secret_version("A", SecretValue::from("y"), SecretAttributes::new())
            .await
            .unwrap();

        assert_eq!(backend.get_secret_version("A", None).await.unwrap().value(), "y");
        assert_eq!(
            backend.get_secret_version("A", Some(v1.version())).await.unwrap().value(),
            "x"
        );

        let listed = backend.list_current_properties(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, v2.properties.version);

        let err = backend.purge("A").await.unwrap_err();
        assert!(err.is_invalid_state());

        let token = backend.start_delete("A").await.unwrap();
        let mut response = backend.poll_operation(&token).await.unwrap();
        while !response.is_terminal() {
            response = backend.poll_operation(&token).await.unwrap();
        }
        assert_eq!(response.status, OperationStatus::Succeeded);
        assert_eq!(backend.list_deleted().await.unwrap().len(), 1);

        backend.purge("A").await.unwrap();
        assert!(backend.purge("A").await.unwrap_err().is_not_found());
        assert!(backend.get_secret_version("A", None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorized() {
        let harness = start_server(MemoryBackendConfig::default(), Some("token-1"));
        let backend = authed(&harness, "token-2");

        let err = backend.list_current_properties(None).await.unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_capabilities_and_cancel_pass_through() {
        let harness = start_server(
            MemoryBackendConfig {
                operation_cancel: false,
                soft_delete: false,
                ..Default::default()
            },
            None,
        );
        let backend = RpcVaultBackend::new(&harness.endpoint, None);

        let caps = backend.capabilities().await.unwrap();
        assert!(!caps.soft_delete);
        assert!(!caps.operation_cancel);

        backend
            .put_secret_version("A", SecretValue::from("x"), SecretAttributes::new())
            .await
            .unwrap();
        let token = backend.start_delete("A").await.unwrap();
        let err = backend.cancel_operation(&token).await.unwrap_err();
        assert!(matches!(err, VaultError::Unsupported { .. }));
    }
}
