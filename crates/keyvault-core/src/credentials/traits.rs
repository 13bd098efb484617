//! Credential provider trait and access tokens

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::VaultResult;

/// A bearer token presented to a vault backend
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_on: None,
        }
    }

    pub fn with_expires_on(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.map_or(false, |expires| expires <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Source of credentials for a backend
///
/// Only backends consume credentials; the secret client never sees them.
///
/// Implementations:
/// - `StaticCredentialProvider`: A fixed token (tests, local sockets)
/// - `EnvCredentialProvider`: Reads a token from environment variables
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Human-readable name of this provider
    fn name(&self) -> &str;

    /// Obtain a token for the next request
    async fn get_token(&self) -> VaultResult<AccessToken>;
}

/// Credential provider that always returns the same token
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    token: AccessToken,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_token(&self) -> VaultResult<AccessToken> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AccessToken::new("super-secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert!(!AccessToken::new("t").is_expired_at(now));
        assert!(AccessToken::new("t")
            .with_expires_on(now - Duration::seconds(1))
            .is_expired_at(now));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticCredentialProvider::new("abc");
        assert_eq!(provider.name(), "static");
        assert_eq!(provider.get_token().await.unwrap().token, "abc");
    }
}
