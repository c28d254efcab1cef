//! # Credentials
//!
//! Credential material attached to a form trigger node, and the interface the
//! host implements to resolve it.
//!
//! Secret values are held in zeroizing buffers, never appear in Debug output,
//! and are compared in constant time.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

// ============================================================================
// Secret Values
// ============================================================================

/// Secure container for secret values
///
/// The buffer is zeroed on drop. Debug output shows only the length.
#[derive(Clone, Default)]
pub struct SecretValue {
    inner: Zeroizing<String>,
}

impl SecretValue {
    /// Create secret value from string
    pub fn from_string(value: String) -> Self {
        Self {
            inner: Zeroizing::new(value),
        }
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Compare against a candidate without leaking where they differ
    pub fn matches(&self, candidate: &str) -> bool {
        self.inner.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::from_string(value.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::from_string)
    }
}

// ============================================================================
// Credential Material
// ============================================================================

/// Credential attached to a node, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Credential {
    BasicAuth(BasicCredential),
    BearerAuth(BearerCredential),
    HeaderAuth(HeaderCredential),
    JwtAuth(JwtCredential),
}

impl Credential {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::BasicAuth(_) => CredentialKind::BasicAuth,
            Self::BearerAuth(_) => CredentialKind::BearerAuth,
            Self::HeaderAuth(_) => CredentialKind::HeaderAuth,
            Self::JwtAuth(_) => CredentialKind::JwtAuth,
        }
    }
}

/// Username and password for HTTP Basic authentication
///
/// Missing fields deserialize as empty and are reported at request time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BasicCredential {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: SecretValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BearerCredential {
    #[serde(default)]
    pub token: SecretValue,
}

/// Header name and expected value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderCredential {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: SecretValue,
}

/// Key material and algorithm for JWT verification
#[derive(Debug, Clone, Deserialize)]
pub struct JwtCredential {
    #[serde(default, alias = "keyType")]
    pub key_type: JwtKeyType,

    /// Shared secret for HMAC algorithms
    #[serde(default)]
    pub secret: SecretValue,

    /// PEM-encoded public key for asymmetric algorithms
    #[serde(default, alias = "publicKey")]
    pub public_key: String,

    /// Verification algorithm; never taken from the token header
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: jsonwebtoken::Algorithm,
}

impl Default for JwtCredential {
    fn default() -> Self {
        Self {
            key_type: JwtKeyType::default(),
            secret: SecretValue::default(),
            public_key: String::new(),
            algorithm: default_jwt_algorithm(),
        }
    }
}

fn default_jwt_algorithm() -> jsonwebtoken::Algorithm {
    jsonwebtoken::Algorithm::HS256
}

/// Kind of key material a JWT credential carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JwtKeyType {
    #[default]
    Passphrase,
    #[serde(alias = "pem_key")]
    PemKey,
}

/// Credential type identifier used for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    BasicAuth,
    BearerAuth,
    HeaderAuth,
    JwtAuth,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicAuth => "basicAuth",
            Self::BearerAuth => "bearerAuth",
            Self::HeaderAuth => "headerAuth",
            Self::JwtAuth => "jwtAuth",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credential Store
// ============================================================================

/// Interface for resolving the credential attached to a node
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the node's credential of the given kind
    ///
    /// Returns `Ok(None)` when the node has no credential of that kind.
    async fn get_credential(
        &self,
        kind: CredentialKind,
    ) -> Result<Option<Credential>, CredentialError>;
}

/// Errors from credential storage
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Credential '{kind}' is malformed: {reason}")]
    Malformed { kind: CredentialKind, reason: String },
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
