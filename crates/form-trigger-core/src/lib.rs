//! # Form Trigger Core
//!
//! Request handling for a schema-driven form trigger: a workflow node that
//! serves an HTML page embedding a JSON-Schema form webcomponent, validates
//! submissions, and hands accepted submissions to a workflow host.
//!
//! ## Architecture
//!
//! The host (credential storage, workflow execution, webhook routing) is
//! external and reached only through traits and plain data:
//! - [`credentials::CredentialStore`] resolves the credential attached to the node
//! - [`webhook::TriggerContext`] carries the request-scoped host facts
//! - [`webhook::WebhookOutcome`] is what the host gets back: an HTTP reply and,
//!   for accepted submissions, the [`webhook::ResponseRecord`] to run the workflow with
//!
//! ## Usage
//!
//! ```rust,no_run
//! use form_trigger_core::{
//!     adapters::InMemoryCredentialStore,
//!     config::FormTriggerConfig,
//!     page::FormPageGenerator,
//!     webhook::{FormRequest, FormWebhookHandler, TriggerContext},
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), form_trigger_core::TriggerError> {
//! let handler = FormWebhookHandler::new(
//!     FormTriggerConfig::new("contact"),
//!     Arc::new(InMemoryCredentialStore::new()),
//!     FormPageGenerator::default(),
//! );
//!
//! let request = FormRequest::new("GET", Default::default(), Default::default(), Vec::new());
//! let outcome = handler.handle(&request, &TriggerContext::default()).await?;
//! assert!(outcome.workflow_data.is_none());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard result type for form trigger operations
pub type TriggerResult<T> = Result<T, TriggerError>;

// ============================================================================
// Execution Types
// ============================================================================

/// How the host is running the workflow this trigger belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Interactive execution started from the editor (test URL)
    Manual,
    /// Activated workflow receiving live traffic
    #[default]
    Production,
}

impl ExecutionMode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" | "test" => Ok(Self::Manual),
            "production" | "webhook" | "trigger" => Ok(Self::Production),
            _ => Err(ParseError::InvalidFormat {
                expected: "manual or production".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Form mode reported downstream, derived from the execution mode
///
/// Never taken from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    Test,
    Production,
}

impl FormMode {
    /// Derive the form mode from the host's execution mode
    pub fn from_execution_mode(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Manual => Self::Test,
            ExecutionMode::Production => Self::Production,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Workflow-level errors raised while handling a form request
///
/// These are not HTTP rejections: the host surfaces them as node execution
/// errors. HTTP-level failures (authentication, validation, method) are
/// carried in [`webhook::WebhookOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("{message}")]
    ResponseModeMisconfigured {
        node: String,
        message: String,
        description: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Schema compilation failed: {0}")]
    Schema(#[from] schema::SchemaError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TriggerError {
    /// Human-readable hint for fixing the error, when one exists
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::ResponseModeMisconfigured { description, .. } => Some(description),
            _ => None,
        }
    }

    /// Check if the error is caused by the node's configuration
    ///
    /// Every variant is; the method exists so callers can branch without
    /// matching on the variant list.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::ResponseModeMisconfigured { .. } => true,
            Self::Configuration(_) => true,
            Self::Schema(_) => true,
            Self::Serialization(_) => false,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Infrastructure adapters (in-memory credential store)
pub mod adapters;

/// Authentication gate for inbound form requests
pub mod auth;

/// Bot user-agent detection
pub mod bot;

/// Node configuration: form definition, options, response mode
pub mod config;

/// Credential material and the credential store interface
pub mod credentials;

/// HTML page generation for the form
pub mod page;

/// Response-mode consistency checks against the downstream workflow graph
pub mod response_mode;

/// JSON Schema validation of submissions
pub mod schema;

/// Webhook handling: request, context, outcome, and the orchestrating handler
pub mod webhook;

// Re-export key types for convenience
pub use adapters::InMemoryCredentialStore;
pub use auth::{authenticate, AuthError, AuthenticationMode};
pub use config::{
    ConfigError, FormDefinition, FormOptions, FormTriggerConfig, RespondWith, RespondWithOptions,
    ResponseMode, ValidationMode,
};
pub use credentials::{Credential, CredentialError, CredentialKind, CredentialStore, SecretValue};
pub use page::FormPageGenerator;
pub use response_mode::{check_response_mode, ConnectedNode};
pub use schema::{SchemaError, SchemaValidator, SchemaViolation};
pub use webhook::{
    FormRequest, FormWebhookHandler, HttpReply, Rejection, ReplyBody, ResponseRecord, Submission,
    TriggerContext, WebhookOutcome, WebhookReply,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
