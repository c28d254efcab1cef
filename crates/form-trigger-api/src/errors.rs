//! Error types for the HTTP service

use crate::dispatcher::DispatchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use form_trigger_core::TriggerError;
use tracing::{error, warn};

/// Form endpoint errors with HTTP status code mapping
///
/// Rejections the client caused (authentication, validation, method) are not
/// errors here; the core handler turns them into replies. What remains is:
///
/// - `404 Not Found`: no form is registered under the requested path
/// - `500 Internal Server Error`: the node is misconfigured for its workflow,
///   or the workflow engine failed
/// - `504 Gateway Timeout`: the workflow did not answer a deferred submission
///   in time
#[derive(Debug, thiserror::Error)]
pub enum FormHandlerError {
    #[error("Form not found: {path}")]
    FormNotFound { path: String },

    /// Workflow-level error raised by the trigger node
    #[error("{0}")]
    Workflow(#[from] TriggerError),

    #[error("Workflow dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Workflow did not answer within {seconds}s")]
    DispatchTimeout { seconds: u64 },
}

impl FormHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::FormNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Workflow(_) | Self::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DispatchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for FormHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, description) = match &self {
            Self::FormNotFound { path } => {
                warn!(path = %path, "Form not found");
                (self.to_string(), None)
            }
            Self::Workflow(e) => {
                error!(
                    error = %e,
                    description = e.description().unwrap_or_default(),
                    "Form trigger raised a workflow error"
                );
                (e.to_string(), e.description().map(str::to_string))
            }
            Self::Dispatch(e) => {
                // Details stay in the log
                error!(error = %e, "Workflow dispatch failed");
                (
                    "Workflow could not be started. Please try again later.".to_string(),
                    None,
                )
            }
            Self::DispatchTimeout { seconds } => {
                warn!(timeout_seconds = seconds, "Workflow answer timed out");
                (self.to_string(), None)
            }
        };

        let mut body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(description) = description {
            body["description"] = serde_json::Value::String(description);
        }

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

impl ServiceError {
    /// Process exit code for the error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed { .. } => 2,
            Self::Configuration(_) => 3,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {0}")]
    Parsing(#[from] ::config::ConfigError),
}
