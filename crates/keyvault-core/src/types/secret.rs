//! Secret data model: versions, properties and soft-deleted secrets

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque secret payload
///
/// The value is redacted from `Debug` output and wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a secret as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretState {
    /// Readable and writable
    Active,
    /// A delete operation is in flight
    Deleting,
    /// Deleted but recoverable until purged
    SoftDeleted,
    /// A recover operation is in flight
    Recovering,
    /// Permanently removed
    Purged,
}

impl SecretState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretState::Active => "active",
            SecretState::Deleting => "deleting",
            SecretState::SoftDeleted => "soft-deleted",
            SecretState::Recovering => "recovering",
            SecretState::Purged => "purged",
        }
    }

    /// Whether the secret's versions can be read or appended to
    pub fn is_active(&self) -> bool {
        matches!(self, SecretState::Active)
    }
}

impl fmt::Display for SecretState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to one version of a secret
///
/// Never carries the secret value. Expiry and the other attributes can be
/// changed without creating a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretProperties {
    /// Secret name
    pub name: String,
    /// Version identifier (32 lowercase hex characters)
    pub version: String,
    /// Full identifier: `{vault_url}secrets/{name}/{version}`
    pub id: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Soft-delete retention in days, when the backend keeps deleted secrets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable_days: Option<u32>,
    /// Set on properties reported for a soft-deleted secret
    #[serde(default)]
    pub deleted: bool,
}

impl SecretProperties {
    /// Whether the version has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.map_or(false, |expires| expires <= now)
    }

    /// Whether the version is enabled and inside its validity window at `now`
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && !self.is_expired_at(now)
            && self.not_before.map_or(true, |nbf| nbf <= now)
    }
}

/// An immutable version of a secret: value plus its properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    pub properties: SecretProperties,
    pub value: SecretValue,
}

impl SecretVersion {
    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn version(&self) -> &str {
        &self.properties.version
    }

    pub fn value(&self) -> &str {
        self.value.expose()
    }
}

/// Attributes supplied when setting a secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretAttributes {
    /// Defaults to enabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl SecretAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_expires_on(mut self, expires_on: DateTime<Utc>) -> Self {
        self.expires_on = Some(expires_on);
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Apply these attributes over existing properties; unset fields are left alone
    pub fn apply_to(&self, properties: &mut SecretProperties) {
        if let Some(enabled) = self.enabled {
            properties.enabled = enabled;
        }
        if let Some(expires_on) = self.expires_on {
            properties.expires_on = Some(expires_on);
        }
        if let Some(not_before) = self.not_before {
            properties.not_before = Some(not_before);
        }
        if let Some(content_type) = &self.content_type {
            properties.content_type = Some(content_type.clone());
        }
        if let Some(tags) = &self.tags {
            properties.tags = tags.clone();
        }
    }
}

/// A request to change the properties of an existing version
///
/// `value` exists so that callers who try to change a value through an update
/// get a clear rejection instead of a silent no-op. Values only change through
/// `set_secret`, which creates a new version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesUpdate {
    pub attributes: SecretAttributes,
    pub value: Option<SecretValue>,
}

impl PropertiesUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expires_on(mut self, expires_on: DateTime<Utc>) -> Self {
        self.attributes.expires_on = Some(expires_on);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.attributes.enabled = Some(enabled);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.attributes.content_type = Some(content_type.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes = self.attributes.with_tag(key, value);
        self
    }

    pub fn with_value(mut self, value: impl Into<SecretValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<SecretAttributes> for PropertiesUpdate {
    fn from(attributes: SecretAttributes) -> Self {
        Self {
            attributes,
            value: None,
        }
    }
}

/// A soft-deleted secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSecret {
    /// Properties of the version that was current at deletion
    pub properties: SecretProperties,
    /// Identifier used to recover the secret; absent when soft-delete is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<String>,
    pub deleted_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}

impl DeletedSecret {
    pub fn name(&self) -> &str {
        &self.properties.name
    }
}
