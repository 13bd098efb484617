//! Secret lifecycle client
//!
//! `SecretClient` is the entry point callers use: versioned upserts, reads,
//! listing, property updates, and the delete → purge (or recover) lifecycle.
//! Storage is delegated to a `VaultBackend`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};

use crate::backend::{create_backend, BackendCapabilities, VaultBackend};
use crate::config::ConfigFile;
use crate::error::{VaultError, VaultResult};
use crate::logging::Logger;
use crate::poller::{OperationOutput, OperationPoller, PollerConfig};
use crate::types::{
    DeletedSecret, OperationToken, PropertiesUpdate, SecretAttributes, SecretProperties,
    SecretValue, SecretVersion,
};

/// Lazy stream of secret properties
///
/// Nothing is fetched from the backend until the stream is first polled.
pub struct SecretPropertiesPager {
    inner: BoxStream<'static, VaultResult<SecretProperties>>,
}

impl SecretPropertiesPager {
    fn new(backend: Arc<dyn VaultBackend>, name: Option<String>) -> Self {
        let inner = stream::once(async move { backend.list_current_properties(name.as_deref()).await })
            .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, VaultError>)))
            .try_flatten()
            .boxed();
        Self { inner }
    }

    /// Drain the stream into a vector, stopping at the first error
    pub async fn collect_all(self) -> VaultResult<Vec<SecretProperties>> {
        self.try_collect().await
    }
}

impl Stream for SecretPropertiesPager {
    type Item = VaultResult<SecretProperties>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for SecretPropertiesPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPropertiesPager").finish_non_exhaustive()
    }
}

/// Client for managing secrets in one vault
///
/// # Example
///
/// ```rust,ignore
/// let client = SecretClient::new(backend, logger);
///
/// client.set_secret("BankAccountSecret", "f4G34fMh8v".into(), SecretAttributes::new()).await?;
/// let secret = client.get_secret("BankAccountSecret", None).await?;
/// ```
pub struct SecretClient {
    backend: Arc<dyn VaultBackend>,
    poller_config: PollerConfig,
    logger: Arc<dyn Logger>,
    name_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SecretClient {
    pub fn new(backend: Arc<dyn VaultBackend>, logger: Arc<dyn Logger>) -> Self {
        Self {
            backend,
            poller_config: PollerConfig::default(),
            logger,
            name_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Create a client for the backend named in the configuration
    pub fn from_config(config: &ConfigFile, logger: Arc<dyn Logger>) -> VaultResult<Self> {
        let backend = create_backend(&config.vault.backend, config, Arc::clone(&logger))?;
        Ok(Self::new(backend, logger).with_poller_config(PollerConfig::from(&config.polling)))
    }

    /// Backoff used by pollers this client hands out
    pub fn with_poller_config(mut self, config: PollerConfig) -> Self {
        self.poller_config = config;
        self
    }

    pub fn backend(&self) -> &Arc<dyn VaultBackend> {
        &self.backend
    }

    pub async fn capabilities(&self) -> VaultResult<BackendCapabilities> {
        self.backend.capabilities().await
    }

    fn name_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.name_locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Store a value under `name`, creating the secret or appending a new
    /// current version
    pub async fn set_secret(
        &self,
        name: &str,
        value: SecretValue,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretVersion> {
        if name.is_empty() {
            return Err(VaultError::invalid_argument("secret name must not be empty"));
        }

        let lock = self.name_lock(name);
        let _guard = lock.lock().await;

        let version = self.backend.put_secret_version(name, value, attributes).await?;
        self.logger.debug(&format!(
            "SecretClient: set {} (version {})",
            name,
            version.version()
        ));
        Ok(version)
    }

    /// Fetch a version of a secret; `None` fetches the current version
    pub async fn get_secret(&self, name: &str, version: Option<&str>) -> VaultResult<SecretVersion> {
        self.backend.get_secret_version(name, version).await
    }

    /// Properties of the current version of every live secret, ordered by name
    ///
    /// With `Some(name)` only that secret is listed. Values are not included;
    /// fetch them with `get_secret`.
    pub fn list_secret_properties(&self, name: Option<&str>) -> SecretPropertiesPager {
        SecretPropertiesPager::new(Arc::clone(&self.backend), name.map(str::to_string))
    }

    /// Properties of every version of one secret, oldest first
    pub async fn list_secret_versions(&self, name: &str) -> VaultResult<Vec<SecretProperties>> {
        self.backend.list_versions(name).await
    }

    /// Change the properties of an existing version
    ///
    /// Values cannot be changed this way; an update carrying a value is
    /// rejected with `InvalidState`.
    pub async fn update_properties(
        &self,
        name: &str,
        version: &str,
        update: PropertiesUpdate,
    ) -> VaultResult<SecretProperties> {
        if update.value.is_some() {
            return Err(VaultError::invalid_state(
                "secret values are immutable; use set_secret to create a new version",
            ));
        }

        let properties = self
            .backend
            .update_properties(name, version, update.attributes)
            .await?;
        self.logger.debug(&format!("SecretClient: updated {}/{}", name, version));
        Ok(properties)
    }

    /// Start deleting a secret
    ///
    /// The secret cannot be purged until the returned poller reports success.
    pub async fn begin_delete(&self, name: &str) -> VaultResult<OperationPoller<DeletedSecret>> {
        let token = self.backend.start_delete(name).await?;
        self.logger.info(&format!("SecretClient: deleting {} ({})", name, token));
        Ok(self.poller(token))
    }

    /// Permanently remove a soft-deleted secret
    pub async fn purge(&self, name: &str) -> VaultResult<()> {
        self.backend.purge(name).await?;
        self.name_locks.lock().remove(name);
        self.logger.info(&format!("SecretClient: purged {}", name));
        Ok(())
    }

    pub async fn get_deleted_secret(&self, name: &str) -> VaultResult<DeletedSecret> {
        self.backend.get_deleted(name).await
    }

    pub async fn list_deleted_secrets(&self) -> VaultResult<Vec<DeletedSecret>> {
        self.backend.list_deleted().await
    }

    /// Start recovering a soft-deleted secret
    pub async fn begin_recover(&self, name: &str) -> VaultResult<OperationPoller<SecretProperties>> {
        let token = self.backend.start_recover(name).await?;
        self.logger.info(&format!("SecretClient: recovering {} ({})", name, token));
        Ok(self.poller(token))
    }

    fn poller<T>(&self, token: OperationToken) -> OperationPoller<T>
    where
        T: OperationOutput + Clone + Send,
    {
        OperationPoller::new(
            Arc::clone(&self.backend),
            token,
            self.poller_config.clone(),
            Arc::clone(&self.logger),
        )
    }
}

impl std::fmt::Debug for SecretClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretClient")
            .field("backend", &self.backend.name())
            .field("poller_config", &self.poller_config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackendConfig, MemoryVaultBackend};
    use crate::logging::NoOpLogger;
    use crate::types::SecretState;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn client_with(config: MemoryBackendConfig) -> (Arc<MemoryVaultBackend>, SecretClient) {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let backend = Arc::new(MemoryVaultBackend::with_config(config, Arc::clone(&logger)));
        let client = SecretClient::new(backend.clone(), logger)
            .with_poller_config(PollerConfig::fixed(Duration::from_millis(1)));
        (backend, client)
    }

    fn client() -> (Arc<MemoryVaultBackend>, SecretClient) {
        client_with(MemoryBackendConfig::default())
    }

    async fn delete_and_wait(client: &SecretClient, name: &str) -> DeletedSecret {
        client
            .begin_delete(name)
            .await
            .unwrap()
            .wait_for_completion(Some(Duration::from_secs(5)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_set_appends_versions() {
        let (_, client) = client();
        let v1 = client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();
        let v2 = client.set_secret("A", "y".into(), SecretAttributes::new()).await.unwrap();

        assert_ne!(v1.version(), v2.version());
        assert_eq!(client.get_secret("A", None).await.unwrap().value(), "y");
        assert_eq!(client.get_secret("A", Some(v1.version())).await.unwrap().value(), "x");

        let versions = client.list_secret_versions("A").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, v1.properties.version);
        assert_eq!(versions[1].version, v2.properties.version);
    }

    #[tokio::test]
    async fn test_set_rejects_empty_name() {
        let (_, client) = client();
        let err = client.set_secret("", "x".into(), SecretAttributes::new()).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidArgument(_)));

        // Only the empty name is rejected
        let spaced = client.set_secret(" ", "x".into(), SecretAttributes::new()).await.unwrap();
        assert_eq!(spaced.name(), " ");
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let (_, client) = client();
        assert!(client.get_secret("missing", None).await.unwrap_err().is_not_found());

        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();
        assert!(client.get_secret("A", Some("nope")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_shows_current_version_only() {
        let (_, client) = client();
        client.set_secret("B", "b".into(), SecretAttributes::new()).await.unwrap();
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();
        let current = client.set_secret("A", "y".into(), SecretAttributes::new()).await.unwrap();

        let listed = client.list_secret_properties(None).collect_all().await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(listed[0].version, current.properties.version);

        let only_a = client.list_secret_properties(Some("A")).collect_all().await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert!(client
            .list_secret_properties(Some("missing"))
            .collect_all()
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_list_is_lazy() {
        let (_, client) = client();
        let pager = client.list_secret_properties(None);

        // Created before the secret exists, enumerated after
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();
        assert_eq!(pager.collect_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_preserves_value() {
        let (_, client) = client();
        let v1 = client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        let expires = Utc::now() + ChronoDuration::days(365);
        let updated = client
            .update_properties(
                "A",
                v1.version(),
                PropertiesUpdate::default().with_expires_on(expires).with_content_type("text/plain"),
            )
            .await
            .unwrap();
        assert_eq!(updated.expires_on, Some(expires));
        assert!(updated.updated_on >= v1.properties.updated_on);

        let fetched = client.get_secret("A", Some(v1.version())).await.unwrap();
        assert_eq!(fetched.value(), "x");
        assert_eq!(fetched.properties.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_update_rejects_value_change() {
        let (_, client) = client();
        let v1 = client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        let err = client
            .update_properties("A", v1.version(), PropertiesUpdate::default().with_value("z"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(client.get_secret("A", None).await.unwrap().value(), "x");

        let err = client
            .update_properties("A", "nope", PropertiesUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_purge_before_delete_completes() {
        let (_, client) = client_with(MemoryBackendConfig {
            completion_polls: 2,
            ..Default::default()
        });
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        assert!(client.purge("A").await.unwrap_err().is_invalid_state());

        let poller = client.begin_delete("A").await.unwrap();
        assert!(client.purge("A").await.unwrap_err().is_invalid_state());

        let err = poller.wait_for_completion(Some(Duration::ZERO)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(client.purge("A").await.unwrap_err().is_invalid_state());
    }

    #[tokio::test]
    async fn test_delete_then_purge() {
        let (backend, client) = client();
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        let deleted = delete_and_wait(&client, "A").await;
        assert_eq!(deleted.name(), "A");
        assert!(deleted.recovery_id.as_deref().unwrap().ends_with("deletedsecrets/A"));
        assert!(deleted.scheduled_purge_date.is_some());
        assert_eq!(backend.state_of("A"), Some(SecretState::SoftDeleted));

        assert!(client.get_secret("A", None).await.unwrap_err().is_not_found());
        assert!(client.list_secret_properties(None).collect_all().await.unwrap().is_empty());
        assert_eq!(client.get_deleted_secret("A").await.unwrap().name(), "A");
        assert_eq!(client.list_deleted_secrets().await.unwrap().len(), 1);

        // Deleted names take no new versions until purged
        let err = client.set_secret("A", "z".into(), SecretAttributes::new()).await.unwrap_err();
        assert!(err.is_invalid_state());
        assert!(client.begin_delete("A").await.unwrap_err().is_invalid_state());

        client.purge("A").await.unwrap();
        assert!(client.purge("A").await.unwrap_err().is_not_found());
        assert!(client.get_secret("A", None).await.unwrap_err().is_not_found());
        assert!(client.get_deleted_secret("A").await.unwrap_err().is_not_found());

        // The name can be reused after purge
        let fresh = client.set_secret("A", "w".into(), SecretAttributes::new()).await.unwrap();
        assert_eq!(client.list_secret_versions("A").await.unwrap().len(), 1);
        assert_eq!(fresh.value(), "w");
    }

    #[tokio::test]
    async fn test_delete_unknown() {
        let (_, client) = client();
        assert!(client.begin_delete("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_without_soft_delete() {
        let (backend, client) = client_with(MemoryBackendConfig {
            soft_delete: false,
            ..Default::default()
        });
        assert!(!client.capabilities().await.unwrap().soft_delete);
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        let deleted = delete_and_wait(&client, "A").await;
        assert!(deleted.recovery_id.is_none());
        assert_eq!(backend.state_of("A"), Some(SecretState::Purged));

        assert!(client.purge("A").await.unwrap_err().is_not_found());
        assert!(client.list_deleted_secrets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recover() {
        let (backend, client) = client();
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();
        let v2 = client.set_secret("A", "y".into(), SecretAttributes::new()).await.unwrap();
        delete_and_wait(&client, "A").await;

        let recovered = client
            .begin_recover("A")
            .await
            .unwrap()
            .wait_for_completion(Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(recovered.version, v2.properties.version);
        assert!(!recovered.deleted);
        assert_eq!(backend.state_of("A"), Some(SecretState::Active));
        assert_eq!(client.get_secret("A", None).await.unwrap().value(), "y");

        assert!(client.begin_recover("A").await.unwrap_err().is_invalid_state());
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_secret_active() {
        let (backend, client) = client_with(MemoryBackendConfig {
            fail_operations: Some("backend rejected delete".to_string()),
            ..Default::default()
        });
        client.set_secret("A", "x".into(), SecretAttributes::new()).await.unwrap();

        let err = client
            .begin_delete("A")
            .await
            .unwrap()
            .wait_for_completion(None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::OperationFailed { .. }));
        assert_eq!(backend.state_of("A"), Some(SecretState::Active));
        assert_eq!(client.get_secret("A", None).await.unwrap().value(), "x");
    }

    #[tokio::test]
    async fn test_concurrent_sets_lose_no_version() {
        let (_, client) = client();
        let client = Arc::new(client);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .set_secret("A", SecretValue::new(format!("value-{}", i)), SecretAttributes::new())
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(client.list_secret_versions("A").await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = ConfigFile::default();
        config.memory.soft_delete = false;
        config.polling.initial_interval_ms = 1;

        let client = SecretClient::from_config(&config, Arc::new(NoOpLogger)).unwrap();
        assert_eq!(client.backend().name(), "memory");
        assert!(!client.capabilities().await.unwrap().soft_delete);

        config.vault.backend = "nonexistent_xyz".to_string();
        assert!(SecretClient::from_config(&config, Arc::new(NoOpLogger)).is_err());
    }
}
