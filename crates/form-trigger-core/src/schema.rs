//! # Schema Validation
//!
//! Draft-07 JSON Schema validation of form submissions, with format
//! assertion, the extra formats the form webcomponent emits, and default
//! value application.
//!
//! Unknown keywords (such as `discriminator`) and unknown formats are
//! ignored, so discriminated unions validate through their `oneOf` branches.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static HEX_COLOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .inspect_err(|e| tracing::error!(error = %e, "Failed to compile hex color pattern"))
        .ok()
});

static FUNCTIONAL_COLOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?i:rgba?|hsla?)\(\s*[-+0-9.%deg,\s/]+\)$")
        .inspect_err(|e| tracing::error!(error = %e, "Failed to compile color function pattern"))
        .ok()
});

/// A compiled JSON Schema
pub struct SchemaValidator {
    schema: Value,
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compile a schema with draft-07 semantics
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::draft7::options()
            .should_validate_formats(true)
            .should_ignore_unknown_formats(true)
            .with_format("hexcolor", is_hex_color)
            .with_format("color", is_color)
            .with_format("markdown", |_: &str| true)
            .build(schema)
            .map_err(|e| SchemaError::Invalid {
                message: e.to_string(),
            })?;

        Ok(Self {
            schema: schema.clone(),
            validator,
        })
    }

    /// Apply schema defaults to `value`, then validate it
    ///
    /// Collects every violation, in the order the validator reports them.
    pub fn validate(&self, value: &mut Value) -> Result<(), Vec<SchemaViolation>> {
        apply_defaults(&self.schema, value);

        let violations: Vec<SchemaViolation> = self
            .validator
            .iter_errors(value)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                SchemaViolation {
                    path: error.instance_path.to_string(),
                    keyword: schema_path
                        .rsplit('/')
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    message: error.to_string(),
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// One failed schema constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON Pointer to the offending value; empty for the root
    pub path: String,

    /// Schema keyword that failed (`required`, `format`, ...)
    pub keyword: String,

    pub message: String,
}

/// Errors compiling a schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("{message}")]
    Invalid { message: String },
}

/// Fill in `default` values from the schema where the value has none
///
/// Descends through `properties`, `allOf`, and `items`. Missing parent
/// objects are not created.
pub fn apply_defaults(schema: &Value, value: &mut Value) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    if let (Some(properties), Some(object)) = (
        schema.get("properties").and_then(Value::as_object),
        value.as_object_mut(),
    ) {
        for (name, property) in properties {
            match object.get_mut(name) {
                Some(child) => apply_defaults(property, child),
                None => {
                    if let Some(default) = property.get("default") {
                        let mut default = default.clone();
                        apply_defaults(property, &mut default);
                        object.insert(name.clone(), default);
                    }
                }
            }
        }
    }

    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        for subschema in all_of {
            apply_defaults(subschema, value);
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array_mut()) {
        if items.is_object() {
            for item in array {
                apply_defaults(items, item);
            }
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    HEX_COLOR
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

fn is_color(value: &str) -> bool {
    let value = value.trim();
    is_hex_color(value)
        || FUNCTIONAL_COLOR
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(value))
        || (!value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()))
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
