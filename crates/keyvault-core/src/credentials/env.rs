//! Environment variable credential provider

use std::env;

use async_trait::async_trait;

use super::traits::{AccessToken, CredentialProvider};
use crate::error::{VaultError, VaultResult};

/// Variables checked, in order, for an access token
pub const TOKEN_ENV_VARS: &[&str] = &["KEYVAULT_ACCESS_TOKEN", "AZURE_ACCESS_TOKEN"];

/// Credential provider that reads a token from the environment
///
/// The variables are read on every call, so rotating the token in the
/// environment takes effect without restarting.
///
/// # Example
///
/// ```
/// use keyvault_core::credentials::{CredentialProvider, EnvCredentialProvider};
///
/// let provider = EnvCredentialProvider::new();
/// assert_eq!(provider.name(), "env");
/// ```
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    vars: Vec<String>,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvCredentialProvider {
    /// Check the standard variables
    pub fn new() -> Self {
        Self::with_vars(TOKEN_ENV_VARS.iter().copied())
    }

    /// Check these variables instead, in order
    pub fn with_vars<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }

    pub fn vars(&self) -> &[String] {
        &self.vars
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_token(&self) -> VaultResult<AccessToken> {
        for var in &self.vars {
            if let Ok(value) = env::var(var) {
                if !value.is_empty() {
                    return Ok(AccessToken::new(value));
                }
            }
        }
        Err(VaultError::Unauthorized(format!(
            "no access token found in {}",
            self.vars.join(", ")
        )))
    }
}
