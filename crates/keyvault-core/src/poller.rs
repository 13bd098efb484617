//! Long-running operation poller
//!
//! Deletion and recovery are asynchronous on the backend. Starting one hands
//! back an `OperationPoller`, which checks the operation's status and can wait
//! for it with exponential backoff, a deadline and local cancellation.
//!
//! ```rust,ignore
//! let poller = client.begin_delete("BankAccountSecret").await?;
//! let deleted = poller.wait_for_completion(Some(Duration::from_secs(30))).await?;
//! client.purge(deleted.name()).await?;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::backend::VaultBackend;
use crate::config::PollingSettings;
use crate::error::{VaultError, VaultResult};
use crate::logging::Logger;
use crate::types::{
    CancellationToken, DeletedSecret, OperationOutcome, OperationStatus, OperationToken,
    PollResponse, SecretProperties,
};

/// Backoff between status checks
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Delay after the first status check
    pub initial_interval: Duration,
    /// Upper bound for any single delay
    pub max_interval: Duration,
    /// Growth factor applied after every check
    pub multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl PollerConfig {
    /// Fixed interval, no growth
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1.0,
        }
    }

    /// Delay to use after `delay`
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        delay.mul_f64(multiplier).min(self.max_interval)
    }

    /// Delay before the status check after `attempt` (zero-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        (0..attempt).fold(self.initial_interval.min(self.max_interval), |delay, _| {
            self.next_delay(delay)
        })
    }
}

impl From<&PollingSettings> for PollerConfig {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            initial_interval: Duration::from_millis(settings.initial_interval_ms),
            max_interval: Duration::from_millis(settings.max_interval_ms),
            multiplier: settings.multiplier,
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalResult<T> {
    /// The operation completed with this result
    Succeeded(T),
    /// The operation ended in failure with this cause
    Failed(String),
    /// The deadline passed before the operation finished
    TimedOut,
    /// The wait was cancelled locally, or the backend cancelled the operation
    Cancelled,
}

impl<T> TerminalResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalResult::Succeeded(_))
    }

    /// Turn into a value, reporting every other ending as an error
    pub fn into_result(self, operation: &str) -> VaultResult<T> {
        match self {
            TerminalResult::Succeeded(value) => Ok(value),
            TerminalResult::Failed(cause) => Err(VaultError::operation_failed(operation, cause)),
            TerminalResult::TimedOut => Err(VaultError::Timeout {
                operation: operation.to_string(),
            }),
            TerminalResult::Cancelled => Err(VaultError::Cancelled),
        }
    }
}

/// Typed result of a backend operation
pub trait OperationOutput: Sized {
    /// Extract this type from the backend's outcome
    fn from_outcome(outcome: OperationOutcome) -> VaultResult<Self>;
}

impl OperationOutput for DeletedSecret {
    fn from_outcome(outcome: OperationOutcome) -> VaultResult<Self> {
        match outcome {
            OperationOutcome::Deleted(deleted) => Ok(deleted),
            other => Err(VaultError::invalid_state(format!(
                "expected a deleted outcome, got {}",
                other.kind()
            ))),
        }
    }
}

impl OperationOutput for SecretProperties {
    fn from_outcome(outcome: OperationOutcome) -> VaultResult<Self> {
        match outcome {
            OperationOutcome::Recovered(properties) => Ok(properties),
            other => Err(VaultError::invalid_state(format!(
                "expected a recovered outcome, got {}",
                other.kind()
            ))),
        }
    }
}

/// Handle on one in-flight backend operation
pub struct OperationPoller<T> {
    backend: Arc<dyn VaultBackend>,
    token: OperationToken,
    config: PollerConfig,
    last: Mutex<Option<PollResponse<T>>>,
    logger: Arc<dyn Logger>,
    _output: PhantomData<fn() -> T>,
}

impl<T> OperationPoller<T>
where
    T: OperationOutput + Clone + Send,
{
    pub fn new(
        backend: Arc<dyn VaultBackend>,
        token: OperationToken,
        config: PollerConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            backend,
            token,
            config,
            last: Mutex::new(None),
            logger,
            _output: PhantomData,
        }
    }

    /// Token identifying the operation on the backend
    pub fn token(&self) -> &OperationToken {
        &self.token
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// The response from the most recent `poll`, if any
    pub fn last_response(&self) -> Option<PollResponse<T>> {
        self.last.lock().clone()
    }

    /// Check the operation's status once
    pub async fn poll(&self) -> VaultResult<PollResponse<T>> {
        let response = self
            .backend
            .poll_operation(&self.token)
            .await?
            .try_map(T::from_outcome)?;

        self.logger.debug(&format!(
            "OperationPoller: {} is {}",
            self.token, response.status
        ));
        *self.last.lock() = Some(response.clone());
        Ok(response)
    }

    /// Poll until the operation ends, the deadline passes or `cancel` fires
    ///
    /// The deadline and `cancel` also interrupt a status check that is still
    /// running. A zero timeout still starts one check. `None`, or a timeout
    /// too large to represent, waits indefinitely.
    pub async fn wait_until_terminal(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
    ) -> VaultResult<TerminalResult<T>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut delay = self.config.delay_for_attempt(0);

        loop {
            if cancel.map_or(false, |c| c.is_cancelled()) {
                self.logger.debug(&format!("OperationPoller: wait for {} cancelled", self.token));
                return Ok(TerminalResult::Cancelled);
            }

            let response = tokio::select! {
                biased;
                response = self.poll() => response?,
                ended = self.interrupted(deadline, cancel) => return Ok(ended),
            };
            if let Some(result) = self.terminal_result(response)? {
                return Ok(result);
            }

            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                self.logger.warn(&format!("OperationPoller: timed out waiting for {}", self.token));
                return Ok(TerminalResult::TimedOut);
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                ended = self.interrupted(deadline, cancel) => return Ok(ended),
            }

            delay = self.config.next_delay(delay);
        }
    }

    /// Resolves once the deadline passes or `cancel` fires
    async fn interrupted(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> TerminalResult<T> {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match cancel {
                Some(cancel) => cancel.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => {
                self.logger.debug(&format!("OperationPoller: wait for {} cancelled", self.token));
                TerminalResult::Cancelled
            }
            _ = expired => {
                self.logger.warn(&format!("OperationPoller: timed out waiting for {}", self.token));
                TerminalResult::TimedOut
            }
        }
    }

    /// Wait for the operation's result
    ///
    /// Fails with `Timeout` when the deadline passes and `OperationFailed`
    /// when the operation ends in failure.
    pub async fn wait_for_completion(&self, timeout: Option<Duration>) -> VaultResult<T> {
        self.wait_until_terminal(timeout, None)
            .await?
            .into_result(self.token.as_str())
    }

    /// Like `wait_for_completion`, but gives up with `Cancelled` when `cancel`
    /// fires. The backend operation keeps going.
    pub async fn wait_with_cancellation(
        &self,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> VaultResult<T> {
        self.wait_until_terminal(timeout, Some(cancel))
            .await?
            .into_result(self.token.as_str())
    }

    /// Ask the backend to cancel the operation
    pub async fn cancel_operation(&self) -> VaultResult<()> {
        let capabilities = self.backend.capabilities().await?;
        if !capabilities.operation_cancel {
            return Err(VaultError::unsupported(
                self.backend.name(),
                "operations cannot be cancelled",
            ));
        }
        self.backend.cancel_operation(&self.token).await?;
        self.logger.info(&format!("OperationPoller: cancelled {}", self.token));
        Ok(())
    }

    fn terminal_result(&self, response: PollResponse<T>) -> VaultResult<Option<TerminalResult<T>>> {
        let result = match response.status {
            OperationStatus::NotStarted | OperationStatus::InProgress => return Ok(None),
            OperationStatus::Succeeded => match response.value {
                Some(value) => TerminalResult::Succeeded(value),
                None => {
                    return Err(VaultError::operation_failed(
                        self.token.as_str(),
                        "completed without a result",
                    ))
                }
            },
            OperationStatus::Failed => TerminalResult::Failed(
                response.error.unwrap_or_else(|| "unknown failure".to_string()),
            ),
            OperationStatus::Cancelled => TerminalResult::Cancelled,
        };
        Ok(Some(result))
    }
}

impl<T> std::fmt::Debug for OperationPoller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationPoller")
            .field("backend", &self.backend.name())
            .field("token", &self.token)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackendConfig, MemoryVaultBackend};
    use crate::logging::NoOpLogger;
    use crate::types::{SecretAttributes, SecretState, SecretValue};

    async fn deleting(config: MemoryBackendConfig) -> (Arc<MemoryVaultBackend>, OperationPoller<DeletedSecret>) {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let backend = Arc::new(MemoryVaultBackend::with_config(config, Arc::clone(&logger)));
        backend
            .put_secret_version("A", SecretValue::from("x"), SecretAttributes::new())
            .await
            .unwrap();
        let token = backend.start_delete("A").await.unwrap();
        let poller = OperationPoller::new(
            backend.clone(),
            token,
            PollerConfig::fixed(Duration::from_millis(1)),
            logger,
        );
        (backend, poller)
    }

    /// Memory backend whose status checks take `poll_delay`
    struct SlowPollBackend {
        inner: MemoryVaultBackend,
        poll_delay: Duration,
    }

    #[async_trait::async_trait]
    impl VaultBackend for SlowPollBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn capabilities(&self) -> VaultResult<crate::backend::BackendCapabilities> {
            self.inner.capabilities().await
        }

        async fn put_secret_version(
            &self,
            name: &str,
            value: SecretValue,
            attributes: SecretAttributes,
        ) -> VaultResult<crate::types::SecretVersion> {
            self.inner.put_secret_version(name, value, attributes).await
        }

        async fn get_secret_version(
            &self,
            name: &str,
            version: Option<&str>,
        ) -> VaultResult<crate::types::SecretVersion> {
            self.inner.get_secret_version(name, version).await
        }

        async fn list_current_properties(&self, name: Option<&str>) -> VaultResult<Vec<SecretProperties>> {
            self.inner.list_current_properties(name).await
        }

        async fn list_versions(&self, name: &str) -> VaultResult<Vec<SecretProperties>> {
            self.inner.list_versions(name).await
        }

        async fn update_properties(
            &self,
            name: &str,
            version: &str,
            attributes: SecretAttributes,
        ) -> VaultResult<SecretProperties> {
            self.inner.update_properties(name, version, attributes).await
        }

        async fn start_delete(&self, name: &str) -> VaultResult<OperationToken> {
            self.inner.start_delete(name).await
        }

        async fn poll_operation(&self, token: &OperationToken) -> VaultResult<PollResponse<OperationOutcome>> {
            tokio::time::sleep(self.poll_delay).await;
            self.inner.poll_operation(token).await
        }

        async fn purge(&self, name: &str) -> VaultResult<()> {
            self.inner.purge(name).await
        }

        async fn get_deleted(&self, name: &str) -> VaultResult<DeletedSecret> {
            self.inner.get_deleted(name).await
        }

        async fn list_deleted(&self) -> VaultResult<Vec<DeletedSecret>> {
            self.inner.list_deleted().await
        }

        async fn start_recover(&self, name: &str) -> VaultResult<OperationToken> {
            self.inner.start_recover(name).await
        }
    }

    async fn slow_deleting(poll_delay: Duration) -> OperationPoller<DeletedSecret> {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let backend = SlowPollBackend {
            inner: MemoryVaultBackend::new(Arc::clone(&logger)),
            poll_delay,
        };
        backend
            .put_secret_version("A", SecretValue::from("x"), SecretAttributes::new())
            .await
            .unwrap();
        let token = backend.start_delete("A").await.unwrap();
        OperationPoller::new(
            Arc::new(backend),
            token,
            PollerConfig::fixed(Duration::from_millis(1)),
            logger,
        )
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = PollerConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(50), Duration::from_secs(5));

        let fixed = PollerConfig::fixed(Duration::from_millis(10));
        assert_eq!(fixed.delay_for_attempt(4), Duration::from_millis(10));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = PollingSettings {
            initial_interval_ms: 100,
            max_interval_ms: 800,
            multiplier: 3.0,
            timeout_secs: None,
        };
        let config = PollerConfig::from(&settings);
        assert_eq!(config.initial_interval, Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_poll_caches_last_response() {
        let (_, poller) = deleting(MemoryBackendConfig::default()).await;
        assert!(poller.last_response().is_none());

        let first = poller.poll().await.unwrap();
        assert_eq!(first.status, OperationStatus::InProgress);
        // The deleted secret is known before the delete completes
        let deleted = first.value.unwrap();
        assert_eq!(deleted.name(), "A");
        assert!(deleted.recovery_id.is_some());

        assert_eq!(poller.last_response().unwrap().status, OperationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_wait_for_completion() {
        let (backend, poller) = deleting(MemoryBackendConfig {
            completion_polls: 3,
            ..Default::default()
        })
        .await;

        let deleted = poller.wait_for_completion(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(deleted.name(), "A");
        assert_eq!(backend.state_of("A"), Some(SecretState::SoftDeleted));
        assert_eq!(poller.last_response().unwrap().status, OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_zero_timeout_checks_once_then_times_out() {
        let (backend, poller) = deleting(MemoryBackendConfig {
            completion_polls: 2,
            ..Default::default()
        })
        .await;

        let err = poller.wait_for_completion(Some(Duration::ZERO)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(backend.state_of("A"), Some(SecretState::Deleting));
        assert!(poller.last_response().is_some());
    }

    #[tokio::test]
    async fn test_deadline_interrupts_hung_status_check() {
        let poller = slow_deleting(Duration::from_secs(30)).await;

        let started = std::time::Instant::now();
        let err = poller
            .wait_for_completion(Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(poller.last_response().is_none());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_status_check() {
        let poller = slow_deleting(Duration::from_secs(30)).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = poller.wait_with_cancellation(None, &cancel).await.unwrap_err();
        assert!(matches!(err, VaultError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_huge_timeout_waits_without_deadline() {
        let (_, poller) = deleting(MemoryBackendConfig {
            completion_polls: 2,
            ..Default::default()
        })
        .await;

        let result = poller.wait_until_terminal(Some(Duration::MAX), None).await.unwrap();
        assert!(result.is_success());
        assert_eq!(poller.wait_for_completion(Some(Duration::MAX)).await.unwrap().name(), "A");
    }

    #[tokio::test]
    async fn test_failed_operation() {
        let (backend, poller) = deleting(MemoryBackendConfig {
            fail_operations: Some("disk on fire".to_string()),
            ..Default::default()
        })
        .await;

        match poller.wait_until_terminal(None, None).await.unwrap() {
            TerminalResult::Failed(cause) => assert_eq!(cause, "disk on fire"),
            other => panic!("expected failure, got {:?}", other),
        }

        let err = poller.wait_for_completion(None).await.unwrap_err();
        assert!(matches!(err, VaultError::OperationFailed { ref cause, .. } if cause == "disk on fire"));
        assert_eq!(backend.state_of("A"), Some(SecretState::Active));
    }

    #[tokio::test]
    async fn test_local_cancellation_leaves_backend_running() {
        let (backend, poller) = deleting(MemoryBackendConfig {
            completion_polls: u32::MAX,
            ..Default::default()
        })
        .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = poller.wait_with_cancellation(None, &cancel).await.unwrap_err();
        assert!(matches!(err, VaultError::Cancelled));
        assert_eq!(backend.state_of("A"), Some(SecretState::Deleting));

        // Already cancelled: returns before checking again
        let result = poller.wait_until_terminal(None, Some(&cancel)).await.unwrap();
        assert_eq!(result, TerminalResult::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_operation_requires_capability() {
        let (_, poller) = deleting(MemoryBackendConfig::default()).await;
        let err = poller.cancel_operation().await.unwrap_err();
        assert!(matches!(err, VaultError::Unsupported { .. }));

        let (backend, poller) = deleting(MemoryBackendConfig {
            operation_cancel: true,
            completion_polls: 5,
            ..Default::default()
        })
        .await;
        poller.cancel_operation().await.unwrap();

        let result = poller.wait_until_terminal(None, None).await.unwrap();
        assert_eq!(result, TerminalResult::Cancelled);
        assert_eq!(backend.state_of("A"), Some(SecretState::Active));
    }

    #[test]
    fn test_outcome_kind_mismatch() {
        let deleted = sample_deleted();
        assert_eq!(
            DeletedSecret::from_outcome(OperationOutcome::Deleted(deleted.clone())).unwrap(),
            deleted
        );

        let err = SecretProperties::from_outcome(OperationOutcome::Deleted(deleted)).unwrap_err();
        assert!(err.is_invalid_state());
    }

    fn sample_deleted() -> DeletedSecret {
        let now = chrono::Utc::now();
        DeletedSecret {
            properties: SecretProperties {
                name: "A".to_string(),
                version: "0".repeat(32),
                id: "https://memory.vault.local/secrets/A/0".to_string(),
                enabled: true,
                expires_on: None,
                not_before: None,
                created_on: now,
                updated_on: now,
                content_type: None,
                tags: Default::default(),
                recoverable_days: None,
                deleted: true,
            },
            recovery_id: None,
            deleted_on: now,
            scheduled_purge_date: None,
        }
    }
}
