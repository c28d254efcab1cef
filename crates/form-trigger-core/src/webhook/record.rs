//! Submission parsing and the record handed to the workflow.

use crate::FormMode;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// Body of a form POST
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Submission {
    pub data: Map<String, Value>,

    #[serde(default)]
    pub event: Option<Map<String, Value>>,
}

impl Submission {
    /// Parse a submission from a raw request body
    ///
    /// Returns a client-facing message on failure.
    pub fn from_body(body: &[u8]) -> Result<Self, String> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err("Request body is empty".to_string());
        }

        serde_json::from_slice(body).map_err(|e| {
            format!(
                "Request body must be a JSON object with a `data` object: {}",
                e
            )
        })
    }
}

/// Record handed to the workflow for an accepted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,

    /// ISO 8601 timestamp with milliseconds and numeric offset
    pub submitted_at: String,

    pub form_mode: FormMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_query_parameters: Option<BTreeMap<String, String>>,
}

impl ResponseRecord {
    /// Build a record; an empty query map is omitted
    pub fn new(
        data: Value,
        event: Option<Value>,
        submitted_at: String,
        form_mode: FormMode,
        query: &BTreeMap<String, String>,
    ) -> Self {
        Self {
            data,
            event,
            submitted_at,
            form_mode,
            form_query_parameters: (!query.is_empty()).then(|| query.clone()),
        }
    }
}

/// Render an instant in the given IANA timezone, or UTC when none is given
///
/// Unknown timezone names fall back to UTC.
pub fn format_submitted_at(instant: DateTime<Utc>, timezone: Option<&str>) -> String {
    let Some(name) = timezone.map(str::trim).filter(|name| !name.is_empty()) else {
        return instant.to_rfc3339_opts(SecondsFormat::Millis, false);
    };

    match name.parse::<Tz>() {
        Ok(tz) => instant
            .with_timezone(&tz)
            .to_rfc3339_opts(SecondsFormat::Millis, false),
        Err(_) => {
            warn!(
                timezone = name,
                "Unknown workflow timezone, using UTC for submission time"
            );
            instant.to_rfc3339_opts(SecondsFormat::Millis, false)
        }
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
