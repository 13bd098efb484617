//! In-memory vault backend
//!
//! Implements the full secret state machine without any network dependencies.
//! Operation latency is simulated by a configurable number of polls, which
//! keeps tests deterministic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::traits::{BackendCapabilities, VaultBackend};
use crate::error::{VaultError, VaultResult};
use crate::logging::Logger;
use crate::types::{
    DeletedSecret, OperationOutcome, OperationToken, PollResponse, SecretAttributes,
    SecretProperties, SecretState, SecretValue, SecretVersion,
};

/// Default soft-delete retention, matching common managed vault defaults
pub const DEFAULT_RECOVERABLE_DAYS: u32 = 90;

/// Configuration for the memory backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryBackendConfig {
    /// Base URL used to build secret and recovery identifiers
    pub vault_url: String,
    /// Keep deleted secrets until purged
    pub soft_delete: bool,
    /// Retention window reported on deleted secrets
    pub recoverable_days: u32,
    /// Polls an operation reports in progress before completing (0 = first poll completes)
    pub completion_polls: u32,
    /// Allow in-flight operations to be cancelled
    pub operation_cancel: bool,
    /// Make every operation fail with this cause instead of completing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_operations: Option<String>,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            vault_url: "https://memory.vault.local/".to_string(),
            soft_delete: true,
            recoverable_days: DEFAULT_RECOVERABLE_DAYS,
            completion_polls: 1,
            operation_cancel: false,
            fail_operations: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Delete,
    Recover,
}

#[derive(Debug)]
struct OperationRecord {
    kind: OperationKind,
    name: String,
    remaining_polls: u32,
    response: PollResponse<OperationOutcome>,
}

#[derive(Debug)]
struct SecretEntry {
    versions: Vec<SecretVersion>,
    state: SecretState,
    deleted: Option<DeletedSecret>,
}

impl SecretEntry {
    fn current(&self) -> Option<&SecretVersion> {
        self.versions.last()
    }
}

#[derive(Debug, Default)]
struct VaultState {
    secrets: BTreeMap<String, SecretEntry>,
    operations: HashMap<OperationToken, OperationRecord>,
}

impl VaultState {
    /// Drop finished operation records for `name`
    fn forget_operations(&mut self, name: &str) {
        self.operations
            .retain(|_, record| record.name != name || !record.response.is_terminal());
    }

    /// Entry for a secret whose versions are readable
    fn active(&self, name: &str) -> VaultResult<&SecretEntry> {
        match self.secrets.get(name) {
            Some(entry) if entry.state.is_active() => Ok(entry),
            _ => Err(VaultError::not_found(name)),
        }
    }

    fn active_mut(&mut self, name: &str) -> VaultResult<&mut SecretEntry> {
        match self.secrets.get_mut(name) {
            Some(entry) if entry.state.is_active() => Ok(entry),
            _ => Err(VaultError::not_found(name)),
        }
    }
}

/// In-memory vault backend for tests, demos and embedding
///
/// # Thread Safety
///
/// All state lives behind one `RwLock`; every operation takes the lock once,
/// so concurrent version appends are never lost.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use keyvault_core::backend::{MemoryVaultBackend, VaultBackend};
/// use keyvault_core::logging::NoOpLogger;
///
/// let backend = MemoryVaultBackend::new(Arc::new(NoOpLogger));
/// assert_eq!(backend.name(), "memory");
/// ```
pub struct MemoryVaultBackend {
    config: MemoryBackendConfig,
    state: RwLock<VaultState>,
    logger: Arc<dyn Logger>,
}

impl MemoryVaultBackend {
    /// Create a backend with default config (soft-delete on, one-poll latency)
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(MemoryBackendConfig::default(), logger)
    }

    /// Create with specific config
    pub fn with_config(mut config: MemoryBackendConfig, logger: Arc<dyn Logger>) -> Self {
        if !config.vault_url.ends_with('/') {
            config.vault_url.push('/');
        }
        Self {
            config,
            state: RwLock::new(VaultState::default()),
            logger,
        }
    }

    /// Create a backend whose deletes remove secrets outright
    pub fn without_soft_delete(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MemoryBackendConfig {
                soft_delete: false,
                ..Default::default()
            },
            logger,
        )
    }

    pub fn config(&self) -> &MemoryBackendConfig {
        &self.config
    }

    /// Lifecycle state of a secret, `None` if the name was never set
    pub fn state_of(&self, name: &str) -> Option<SecretState> {
        self.state.read().secrets.get(name).map(|entry| entry.state)
    }

    /// Number of names known to the backend, purged tombstones included
    pub fn len(&self) -> usize {
        self.state.read().secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operation records still held, finished ones included
    pub fn operation_count(&self) -> usize {
        self.state.read().operations.len()
    }

    fn secret_id(&self, name: &str, version: &str) -> String {
        format!("{}secrets/{}/{}", self.config.vault_url, name, version)
    }

    fn recovery_id(&self, name: &str) -> String {
        format!("{}deletedsecrets/{}", self.config.vault_url, name)
    }

    fn new_token(&self) -> OperationToken {
        OperationToken::new(format!("op-{}", Uuid::new_v4().simple()))
    }

    fn register_operation(
        &self,
        state: &mut VaultState,
        kind: OperationKind,
        name: &str,
        initial: PollResponse<OperationOutcome>,
    ) -> OperationToken {
        let token = self.new_token();
        state.operations.insert(
            token.clone(),
            OperationRecord {
                kind,
                name: name.to_string(),
                remaining_polls: self.config.completion_polls,
                response: initial,
            },
        );
        token
    }

    /// Undo the transition of an operation that will not complete
    fn roll_back(state: &mut VaultState, kind: OperationKind, name: &str) {
        if let Some(entry) = state.secrets.get_mut(name) {
            match kind {
                OperationKind::Delete => {
                    entry.state = SecretState::Active;
                    entry.deleted = None;
                }
                OperationKind::Recover => entry.state = SecretState::SoftDeleted,
            }
        }
    }

    /// Apply the final transition of an operation and produce its outcome
    fn complete(&self, state: &mut VaultState, kind: OperationKind, name: &str) -> VaultResult<OperationOutcome> {
        let soft_delete = self.config.soft_delete;
        let entry = state
            .secrets
            .get_mut(name)
            .ok_or_else(|| VaultError::not_found(name))?;

        match kind {
            OperationKind::Delete => {
                let deleted = entry
                    .deleted
                    .clone()
                    .ok_or_else(|| VaultError::invalid_state(format!("{} has no deletion record", name)))?;
                if soft_delete {
                    entry.state = SecretState::SoftDeleted;
                } else {
                    entry.state = SecretState::Purged;
                    entry.versions.clear();
                    entry.deleted = None;
                }
                Ok(OperationOutcome::Deleted(deleted))
            }
            OperationKind::Recover => {
                entry.state = SecretState::Active;
                entry.deleted = None;
                let current = entry
                    .current()
                    .ok_or_else(|| VaultError::invalid_state(format!("{} has no versions", name)))?;
                Ok(OperationOutcome::Recovered(current.properties.clone()))
            }
        }
    }
}

impl std::fmt::Debug for MemoryVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVaultBackend")
            .field("config", &self.config)
            .field("secrets", &self.len())
            .finish()
    }
}

#[async_trait]
impl VaultBackend for MemoryVaultBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn capabilities(&self) -> VaultResult<BackendCapabilities> {
        Ok(BackendCapabilities {
            soft_delete: self.config.soft_delete,
            operation_cancel: self.config.operation_cancel,
        })
    }

    async fn put_secret_version(
        &self,
        name: &str,
        value: SecretValue,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretVersion> {
        let now = Utc::now();
        let version = Uuid::new_v4().simple().to_string();

        let mut properties = SecretProperties {
            name: name.to_string(),
            version: version.clone(),
            id: self.secret_id(name, &version),
            enabled: true,
            expires_on: None,
            not_before: None,
            created_on: now,
            updated_on: now,
            content_type: None,
            tags: HashMap::new(),
            recoverable_days: self.config.soft_delete.then_some(self.config.recoverable_days),
            deleted: false,
        };
        attributes.apply_to(&mut properties);

        let secret = SecretVersion { properties, value };

        let mut state = self.state.write();
        let mut reused = false;
        let entry = state.secrets.entry(name.to_string()).or_insert_with(|| SecretEntry {
            versions: Vec::new(),
            state: SecretState::Active,
            deleted: None,
        });

        match entry.state {
            SecretState::Active => {}
            SecretState::Purged => {
                // A purged name can be reused; it starts a fresh history
                entry.state = SecretState::Active;
                entry.versions.clear();
                reused = true;
            }
            other => {
                return Err(VaultError::invalid_state(format!(
                    "secret {} is {} and cannot take new versions",
                    name, other
                )));
            }
        }

        entry.versions.push(secret.clone());
        self.logger.debug(&format!(
            "MemoryVaultBackend: {} now has {} version(s), current {}",
            name,
            entry.versions.len(),
            version
        ));
        if reused {
            state.forget_operations(name);
        }
        Ok(secret)
    }

    async fn get_secret_version(&self, name: &str, version: Option<&str>) -> VaultResult<SecretVersion> {
        let state = self.state.read();
        let entry = state.active(name)?;

        let found = match version {
            None => entry.current(),
            Some(version) => entry.versions.iter().find(|v| v.version() == version),
        };

        found.cloned().ok_or_else(|| match version {
            Some(version) => VaultError::version_not_found(name, version),
            None => VaultError::not_found(name),
        })
    }

    async fn list_current_properties(&self, name: Option<&str>) -> VaultResult<Vec<SecretProperties>> {
        let state = self.state.read();
        Ok(state
            .secrets
            .iter()
            .filter(|(key, _)| name.map_or(true, |n| n == key.as_str()))
            .filter(|(_, entry)| entry.state.is_active())
            .filter_map(|(_, entry)| entry.current().map(|v| v.properties.clone()))
            .collect())
    }

    async fn list_versions(&self, name: &str) -> VaultResult<Vec<SecretProperties>> {
        let state = self.state.read();
        let entry = state.active(name)?;
        Ok(entry.versions.iter().map(|v| v.properties.clone()).collect())
    }

    async fn update_properties(
        &self,
        name: &str,
        version: &str,
        attributes: SecretAttributes,
    ) -> VaultResult<SecretProperties> {
        let mut state = self.state.write();
        let entry = state.active_mut(name)?;
        let target = entry
            .versions
            .iter_mut()
            .find(|v| v.version() == version)
            .ok_or_else(|| VaultError::version_not_found(name, version))?;

        attributes.apply_to(&mut target.properties);
        target.properties.updated_on = Utc::now();

        self.logger.debug(&format!("MemoryVaultBackend: updated properties of {}/{}", name, version));
        Ok(target.properties.clone())
    }

    async fn start_delete(&self, name: &str) -> VaultResult<OperationToken> {
        let now = Utc::now();
        let mut state = self.state.write();

        let entry = match state.secrets.get_mut(name) {
            None => return Err(VaultError::not_found(name)),
            Some(entry) if entry.state == SecretState::Purged => return Err(VaultError::not_found(name)),
            Some(entry) if !entry.state.is_active() => {
                return Err(VaultError::invalid_state(format!(
                    "secret {} is already {}",
                    name, entry.state
                )));
            }
            Some(entry) => entry,
        };

        let mut properties = entry
            .current()
            .map(|v| v.properties.clone())
            .ok_or_else(|| VaultError::invalid_state(format!("{} has no versions", name)))?;
        properties.deleted = true;

        let deleted = DeletedSecret {
            properties,
            recovery_id: self.config.soft_delete.then(|| self.recovery_id(name)),
            deleted_on: now,
            scheduled_purge_date: self
                .config
                .soft_delete
                .then(|| now + Duration::days(i64::from(self.config.recoverable_days))),
        };

        entry.state = SecretState::Deleting;
        entry.deleted = Some(deleted.clone());

        let token = self.register_operation(
            &mut state,
            OperationKind::Delete,
            name,
            PollResponse::in_progress(Some(OperationOutcome::Deleted(deleted))),
        );
        self.logger.info(&format!("MemoryVaultBackend: deleting {} ({})", name, token));
        Ok(token)
    }

    async fn poll_operation(&self, token: &OperationToken) -> VaultResult<PollResponse<OperationOutcome>> {
        let mut state = self.state.write();

        let (kind, name) = {
            let record = state
                .operations
                .get_mut(token)
                .ok_or_else(|| VaultError::not_found(format!("operation {}", token)))?;

            if record.response.is_terminal() {
                return Ok(record.response.clone());
            }
            if record.remaining_polls > 0 {
                record.remaining_polls -= 1;
                return Ok(record.response.clone());
            }
            (record.kind, record.name.clone())
        };

        let response = if let Some(cause) = self.config.fail_operations.clone() {
            Self::roll_back(&mut state, kind, &name);
            self.logger.warn(&format!("MemoryVaultBackend: operation {} failed: {}", token, cause));
            PollResponse::failed(cause)
        } else {
            match self.complete(&mut state, kind, &name) {
                Ok(outcome) => {
                    self.logger.info(&format!("MemoryVaultBackend: operation {} on {} succeeded", token, name));
                    PollResponse::succeeded(outcome)
                }
                Err(e) => PollResponse::failed(e.to_string()),
            }
        };

        if let Some(record) = state.operations.get_mut(token) {
            record.response = response.clone();
        }
        Ok(response)
    }

    async fn purge(&self, name: &str) -> VaultResult<()> {
        let mut state = self.state.write();
        let entry = match state.secrets.get_mut(name) {
            None => return Err(VaultError::not_found(name)),
            Some(entry) => entry,
        };

        match entry.state {
            SecretState::SoftDeleted => {
                entry.state = SecretState::Purged;
                entry.versions.clear();
                entry.deleted = None;
            }
            SecretState::Purged => return Err(VaultError::not_found(name)),
            other => {
                return Err(VaultError::invalid_state(format!(
                    "secret {} is {}; only soft-deleted secrets can be purged",
                    name, other
                )))
            }
        }

        state.forget_operations(name);
        self.logger.info(&format!("MemoryVaultBackend: purged {}", name));
        Ok(())
    }

    async fn get_deleted(&self, name: &str) -> VaultResult<DeletedSecret> {
        let state = self.state.read();
        match state.secrets.get(name) {
            Some(entry) if entry.state == SecretState::SoftDeleted => entry
                .deleted
                .clone()
                .ok_or_else(|| VaultError::not_found(name)),
            _ => Err(VaultError::not_found(name)),
        }
    }

    async fn list_deleted(&self) -> VaultResult<Vec<DeletedSecret>> {
        let state = self.state.read();
        Ok(state
            .secrets
            .values()
            .filter(|entry| entry.state == SecretState::SoftDeleted)
            .filter_map(|entry| entry.deleted.clone())
            .collect())
    }

    async fn start_recover(&self, name: &str) -> VaultResult<OperationToken> {
        let mut state = self.state.write();
        let entry = match state.secrets.get_mut(name) {
            Some(entry) if entry.state == SecretState::SoftDeleted => entry,
            Some(entry) if entry.state != SecretState::Purged => {
                return Err(VaultError::invalid_state(format!(
                    "secret {} is {}; only soft-deleted secrets can be recovered",
                    name, entry.state
                )));
            }
            _ => return Err(VaultError::not_found(name)),
        };

        entry.state = SecretState::Recovering;
        let token = self.register_operation(
            &mut state,
            OperationKind::Recover,
            name,
            PollResponse::in_progress(None),
        );
        self.logger.info(&format!("MemoryVaultBackend: recovering {} ({})", name, token));
        Ok(token)
    }

    async fn cancel_operation(&self, token: &OperationToken) -> VaultResult<()> {
        if !self.config.operation_cancel {
            return Err(VaultError::unsupported(self.name(), "operation cancel is disabled"));
        }

        let mut state = self.state.write();
        let (kind, name) = {
            let record = state
                .operations
                .get_mut(token)
                .ok_or_else(|| VaultError::not_found(format!("operation {}", token)))?;
            if record.response.is_terminal() {
                return Err(VaultError::invalid_state(format!(
                    "operation {} already {}",
                    token, record.response.status
                )));
            }
            record.response = PollResponse::cancelled();
            (record.kind, record.name.clone())
        };

        Self::roll_back(&mut state, kind, &name);
        self.logger.info(&format!("MemoryVaultBackend: cancelled operation {} on {}", token, name));
        Ok(())
    }
}
