//! # Authentication Gate
//!
//! Checks an inbound form request against the credential attached to the
//! node. Dispatch is an exhaustive match over [`AuthenticationMode`]; every
//! mode resolves its stored credential before looking at the request, so a
//! missing credential yields 500 regardless of request content.

use crate::{
    credentials::{
        BasicCredential, BearerCredential, Credential, CredentialKind, CredentialStore,
        HeaderCredential, JwtCredential, JwtKeyType,
    },
    webhook::FormRequest,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::{debug, error, instrument, warn};
use zeroize::Zeroizing;

/// Message returned when credentials are missing
pub const UNAUTHORIZED_MESSAGE: &str = "Authorization is required!";

/// Message returned when credentials are wrong
pub const FORBIDDEN_MESSAGE: &str = "Authorization data is wrong!";

/// Message returned when the node has no usable credential
pub const MISCONFIGURED_MESSAGE: &str = "No authentication data defined on node!";

/// Challenge sent with every 401 reply
pub const BASIC_CHALLENGE: &str = "Basic realm=\"Webhook\"";

/// Authentication required from clients of a form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationMode {
    #[default]
    None,
    #[serde(alias = "basic_auth")]
    BasicAuth,
    #[serde(alias = "bearer_auth")]
    BearerAuth,
    #[serde(alias = "header_auth")]
    HeaderAuth,
    #[serde(alias = "jwt_auth")]
    JwtAuth,
}

impl AuthenticationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BasicAuth => "basicAuth",
            Self::BearerAuth => "bearerAuth",
            Self::HeaderAuth => "headerAuth",
            Self::JwtAuth => "jwtAuth",
        }
    }

    /// Credential kind this mode verifies against, if any
    pub fn credential_kind(&self) -> Option<CredentialKind> {
        match self {
            Self::None => None,
            Self::BasicAuth => Some(CredentialKind::BasicAuth),
            Self::BearerAuth => Some(CredentialKind::BearerAuth),
            Self::HeaderAuth => Some(CredentialKind::HeaderAuth),
            Self::JwtAuth => Some(CredentialKind::JwtAuth),
        }
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication failures, each mapped to an HTTP status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Credentials missing (401)
    #[error("{message}")]
    Unauthorized { message: String },

    /// Credentials present but wrong (403)
    #[error("{message}")]
    Forbidden { message: String },

    /// Mode selected but no matching credential material (500)
    #[error("{message}")]
    Misconfigured { message: String },
}

impl AuthError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized {
            message: UNAUTHORIZED_MESSAGE.to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Self::Forbidden {
            message: FORBIDDEN_MESSAGE.to_string(),
        }
    }

    pub fn misconfigured() -> Self {
        Self::Misconfigured {
            message: MISCONFIGURED_MESSAGE.to_string(),
        }
    }

    /// HTTP status code for this failure
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::Misconfigured { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::Misconfigured { message } => message,
        }
    }

    /// Check if the reply must carry a `WWW-Authenticate` challenge
    pub fn requires_challenge(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Authenticate a request under the given mode
#[instrument(skip(store, request), fields(mode = %mode))]
pub async fn authenticate(
    mode: AuthenticationMode,
    store: &dyn CredentialStore,
    request: &FormRequest,
) -> Result<(), AuthError> {
    let Some(kind) = mode.credential_kind() else {
        return Ok(());
    };

    let credential = load_credential(store, kind).await?;

    let result = match credential {
        Credential::BasicAuth(basic) => check_basic(&basic, request),
        Credential::BearerAuth(bearer) => check_bearer(&bearer, request),
        Credential::HeaderAuth(header) => check_header(&header, request),
        Credential::JwtAuth(jwt) => check_jwt(&jwt, request),
    };

    if let Err(e) = &result {
        warn!(
            status = e.status_code(),
            reason = %e,
            "Form request failed authentication"
        );
    }

    result
}

async fn load_credential(
    store: &dyn CredentialStore,
    kind: CredentialKind,
) -> Result<Credential, AuthError> {
    match store.get_credential(kind).await {
        Ok(Some(credential)) if credential.kind() == kind => Ok(credential),
        Ok(Some(credential)) => {
            error!(
                expected = %kind,
                actual = %credential.kind(),
                "Credential store returned a credential of the wrong kind"
            );
            Err(AuthError::misconfigured())
        }
        Ok(None) => {
            debug!(kind = %kind, "No credential attached to node");
            Err(AuthError::misconfigured())
        }
        Err(e) => {
            error!(kind = %kind, error = %e, "Credential lookup failed");
            Err(AuthError::misconfigured())
        }
    }
}

fn check_basic(credential: &BasicCredential, request: &FormRequest) -> Result<(), AuthError> {
    if credential.user.is_empty() || credential.password.is_empty() {
        return Err(AuthError::misconfigured());
    }

    let (user, password) = request
        .header("authorization")
        .and_then(decode_basic_header)
        .ok_or_else(AuthError::unauthorized)?;

    let user_matches = constant_time_eq(&credential.user, &user);
    let password_matches = credential.password.matches(&password);
    if user_matches && password_matches {
        Ok(())
    } else {
        Err(AuthError::forbidden())
    }
}

fn check_bearer(credential: &BearerCredential, request: &FormRequest) -> Result<(), AuthError> {
    if credential.token.is_empty() {
        return Err(AuthError::misconfigured());
    }

    let expected = Zeroizing::new(format!("Bearer {}", credential.token.expose_secret()));
    match request.header("authorization") {
        Some(provided) if constant_time_eq(&expected, provided) => Ok(()),
        _ => Err(AuthError::forbidden()),
    }
}

fn check_header(credential: &HeaderCredential, request: &FormRequest) -> Result<(), AuthError> {
    if credential.name.trim().is_empty() || credential.value.is_empty() {
        return Err(AuthError::misconfigured());
    }

    match request.header(&credential.name) {
        Some(provided) if !provided.is_empty() && credential.value.matches(provided) => Ok(()),
        _ => Err(AuthError::forbidden()),
    }
}

fn check_jwt(credential: &JwtCredential, request: &FormRequest) -> Result<(), AuthError> {
    let key = decoding_key(credential)?;

    let token = request
        .header("authorization")
        .and_then(|value| value.split(' ').nth(1))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Unauthorized {
            message: "No token provided".to_string(),
        })?;

    let mut validation = Validation::new(credential.algorithm);
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    jsonwebtoken::decode::<serde_json::Value>(token, &key, &validation)
        .map(|_| ())
        .map_err(|e| AuthError::Forbidden {
            message: e.to_string(),
        })
}

/// Build the verification key, rejecting algorithms that do not fit the key type
fn decoding_key(credential: &JwtCredential) -> Result<DecodingKey, AuthError> {
    let algorithm = credential.algorithm;
    let misconfigured = |reason: String| {
        error!(algorithm = ?algorithm, reason = %reason, "JWT credential is unusable");
        AuthError::misconfigured()
    };

    match (credential.key_type, algorithm) {
        (JwtKeyType::Passphrase, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => {
            if credential.secret.is_empty() {
                return Err(AuthError::misconfigured());
            }
            Ok(DecodingKey::from_secret(
                credential.secret.expose_secret().as_bytes(),
            ))
        }
        (JwtKeyType::Passphrase, _) => Err(misconfigured(
            "asymmetric algorithms require a PEM key".to_string(),
        )),
        (JwtKeyType::PemKey, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) => Err(
            misconfigured("HMAC algorithms require a passphrase".to_string()),
        ),
        (JwtKeyType::PemKey, _) => {
            if credential.public_key.trim().is_empty() {
                return Err(AuthError::misconfigured());
            }
            let pem = format_pem_key(&credential.public_key);
            let key = match algorithm {
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
                Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
                _ => DecodingKey::from_rsa_pem(pem.as_bytes()),
            };
            key.map_err(|e| misconfigured(e.to_string()))
        }
    }
}

/// Re-wrap a PEM key that was pasted onto a single line
///
/// Escaped `\n` sequences are turned into newlines; keys that already span
/// several lines are returned unchanged. The body is wrapped at 64 columns.
pub fn format_pem_key(key: &str) -> String {
    const BEGIN: &str = "-----BEGIN ";
    const END: &str = "-----END ";
    const DASHES: &str = "-----";

    let key = key.trim().replace("\\n", "\n");
    if key.contains('\n') {
        return key;
    }

    let Some(header_end) = key
        .strip_prefix(BEGIN)
        .and_then(|rest| rest.find(DASHES))
        .map(|index| BEGIN.len() + index + DASHES.len())
    else {
        return key;
    };
    let Some(footer_start) = key.rfind(END).filter(|start| *start >= header_end) else {
        return key;
    };

    let body: Vec<char> = key[header_end..footer_start]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let mut lines = vec![key[..header_end].to_string()];
    lines.extend(body.chunks(64).map(|chunk| chunk.iter().collect::<String>()));
    lines.push(key[footer_start..].to_string());
    lines.join("\n")
}

fn decode_basic_header(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn constant_time_eq(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
