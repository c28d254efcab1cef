//! # Form Trigger Configuration
//!
//! Node parameters for a form trigger: the form definition, the options bag,
//! the authentication mode, and the response mode.
//!
//! Every field documents its default. Keys are snake_case; the camelCase names
//! used by workflow hosts are accepted as aliases. JSON-valued parameters
//! (schemas, data, config) may be given either as JSON values or as strings
//! containing JSON, which is how most hosts store them.

use crate::{auth::AuthenticationMode, schema::SchemaValidator};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Title used when the node does not configure one
pub const DEFAULT_FORM_TITLE: &str = "Form";

/// Node version assumed when the host does not report one
pub const DEFAULT_NODE_VERSION: f64 = 2.2;

/// Message shown after submission when neither a text nor a redirect is configured
pub const DEFAULT_SUBMITTED_TEXT: &str = "Your response has been recorded";

// ============================================================================
// Node Configuration
// ============================================================================

/// Complete configuration of one form trigger node
///
/// Immutable for the lifetime of a request; read-only per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormTriggerConfig {
    /// URL path segment the form is served under
    pub path: String,

    /// Page title and heading (default: "Form")
    #[serde(default = "default_form_title", alias = "formTitle")]
    pub form_title: String,

    /// Optional text shown under the heading
    #[serde(default, alias = "formDescription")]
    pub form_description: Option<String>,

    /// Authentication required from clients (default: none)
    #[serde(default)]
    pub authentication: AuthenticationMode,

    /// When and how the submission is acknowledged (default: onReceived)
    #[serde(default, alias = "responseMode")]
    pub response_mode: ResponseMode,

    /// Schema, UI schema, initial data, and renderer config
    #[serde(default)]
    pub form: FormDefinition,

    /// Rendering and behavior toggles
    #[serde(default)]
    pub options: FormOptions,

    /// Schema version of the node as reported by the host (default: 2.2)
    #[serde(default = "default_node_version", alias = "typeVersion")]
    pub node_version: f64,
}

impl FormTriggerConfig {
    /// Create configuration with the given path and defaults for everything else
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            form_title: default_form_title(),
            form_description: None,
            authentication: AuthenticationMode::default(),
            response_mode: ResponseMode::default(),
            form: FormDefinition::default(),
            options: FormOptions::default(),
            node_version: DEFAULT_NODE_VERSION,
        }
    }

    pub fn with_authentication(mut self, authentication: AuthenticationMode) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = response_mode;
        self
    }

    pub fn with_form(mut self, form: FormDefinition) -> Self {
        self.form = form;
        self
    }

    pub fn with_options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_node_version(mut self, node_version: f64) -> Self {
        self.node_version = node_version;
        self
    }

    /// Validate configuration structure and constraints
    ///
    /// Collects every problem instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let path = self.path.trim();
        if path.is_empty() {
            errors.push("path must not be empty".to_string());
        } else if path
            .chars()
            .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace())
        {
            errors.push(format!("path '{}' must be a single URL segment", self.path));
        }

        if self.form_title.trim().is_empty() {
            errors.push("form title must not be empty".to_string());
        }

        if !self.form.json_schema.is_object() {
            errors.push("JSON schema must be a JSON object".to_string());
        } else if let Err(e) = SchemaValidator::compile(&self.form.json_schema) {
            errors.push(format!("JSON schema is invalid: {}", e));
        }

        for (name, value) in [
            ("UI schema", &self.form.ui_schema),
            ("data", &self.form.data),
            ("config", &self.form.config),
        ] {
            if !value.is_object() {
                errors.push(format!("{} must be a JSON object", name));
            }
        }

        if let Some(event_schema) = &self.options.event_json_schema {
            if let Err(e) = SchemaValidator::compile(event_schema) {
                errors.push(format!("event JSON schema is invalid: {}", e));
            }
        }

        let respond = &self.options.respond_with_options;
        if respond.respond_with == RespondWith::Redirect && respond.redirect_url().is_none() {
            errors.push("redirect URL is required when responding with a redirect".to_string());
        }

        if !self.node_version.is_finite() || self.node_version <= 0.0 {
            errors.push(format!("node version {} is not valid", self.node_version));
        }

        if !errors.is_empty() {
            return Err(ConfigError::Invalid {
                path: self.path.clone(),
                errors,
            });
        }

        Ok(())
    }
}

/// When the trigger acknowledges a submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseMode {
    /// Acknowledge immediately, run the workflow afterwards
    #[default]
    #[serde(rename = "onReceived", alias = "on_received")]
    OnReceived,

    /// Acknowledge when the workflow finishes
    #[serde(rename = "lastNode", alias = "last_node")]
    LastNode,

    /// Delegate the acknowledgment to an explicit respond node downstream
    #[serde(rename = "responseNode", alias = "response_node")]
    ResponseNode,
}

impl ResponseMode {
    /// Get string representation as used by the page script
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnReceived => "onReceived",
            Self::LastNode => "lastNode",
            Self::ResponseNode => "responseNode",
        }
    }
}

// ============================================================================
// Form Definition
// ============================================================================

/// JSON Schema, UI Schema, initial data, and renderer config of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Data shape and validation rules (default: contact form)
    #[serde(
        default = "default_json_schema",
        alias = "jsonSchema",
        deserialize_with = "json_or_string"
    )]
    pub json_schema: Value,

    /// Rendering layout (default: `{}`)
    #[serde(
        default = "empty_object",
        alias = "uiSchema",
        deserialize_with = "json_or_string"
    )]
    pub ui_schema: Value,

    /// Initial form data (default: `{}`)
    #[serde(default = "empty_object", deserialize_with = "json_or_string")]
    pub data: Value,

    /// Renderer behavior flags (default: `{}`)
    #[serde(default = "empty_object", deserialize_with = "json_or_string")]
    pub config: Value,
}

impl FormDefinition {
    /// Create a form definition from a schema with empty UI schema, data, and config
    pub fn from_schema(json_schema: Value) -> Self {
        Self {
            json_schema,
            ..Self::default()
        }
    }
}

impl Default for FormDefinition {
    fn default() -> Self {
        Self {
            json_schema: default_json_schema(),
            ui_schema: empty_object(),
            data: empty_object(),
            config: empty_object(),
        }
    }
}

// ============================================================================
// Options Bag
// ============================================================================

/// Per-node rendering and behavior options
///
/// Each field toggles one concern independently; absent fields take the
/// defaults documented below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    /// Reject requests from known bots with 403 (default: false)
    #[serde(alias = "ignoreBots")]
    pub ignore_bots: bool,

    /// Render the form read-only, without a submit button (default: false)
    pub readonly: bool,

    /// Stamp submissions in the workflow timezone instead of UTC (default: true)
    #[serde(alias = "useWorkflowTimezone")]
    pub use_workflow_timezone: bool,

    /// Client-side validation behavior of the webcomponent (default: validate and show)
    #[serde(alias = "validationMode")]
    pub validation_mode: ValidationMode,

    /// Extra CSS appended to the page after sanitization (default: none)
    #[serde(alias = "customCss", alias = "customStyle", alias = "custom_style")]
    pub custom_css: Option<String>,

    /// Options forwarded to the webcomponent's Vuetify instance (default: none)
    #[serde(alias = "vuetifyOptions", deserialize_with = "optional_json_or_string")]
    pub vuetify_options: Option<Value>,

    /// Schema for the auxiliary `event` payload (default: none, event not validated)
    #[serde(alias = "eventJsonSchema", deserialize_with = "optional_json_or_string")]
    pub event_json_schema: Option<Value>,

    /// What the page does once the submission is accepted
    #[serde(alias = "respondWithOptions")]
    pub respond_with_options: RespondWithOptions,

    /// Show the attribution footer (default: true)
    #[serde(alias = "appendAttribution")]
    pub append_attribution: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            ignore_bots: false,
            readonly: false,
            use_workflow_timezone: true,
            validation_mode: ValidationMode::default(),
            custom_css: None,
            vuetify_options: None,
            event_json_schema: None,
            respond_with_options: RespondWithOptions::default(),
            append_attribution: true,
        }
    }
}

/// Client-side validation behavior of the form webcomponent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    #[default]
    #[serde(alias = "validate_and_show")]
    ValidateAndShow,
    #[serde(alias = "validate_and_hide")]
    ValidateAndHide,
    #[serde(alias = "no_validation")]
    NoValidation,
}

impl ValidationMode {
    /// Attribute value understood by the webcomponent
    pub fn as_attribute(&self) -> &'static str {
        match self {
            Self::ValidateAndShow => "validate-and-show",
            Self::ValidateAndHide => "validate-and-hide",
            Self::NoValidation => "no-validation",
        }
    }
}

/// Post-submission behavior of the page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondWith {
    #[default]
    Text,
    Redirect,
}

impl RespondWith {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Redirect => "redirect",
        }
    }
}

/// Text or redirect shown once a submission is accepted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespondWithOptions {
    #[serde(alias = "respondWith")]
    pub respond_with: RespondWith,

    #[serde(alias = "formSubmittedText")]
    pub form_submitted_text: Option<String>,

    #[serde(alias = "redirectUrl")]
    pub redirect_url: Option<String>,
}

impl RespondWithOptions {
    /// Configured submission text, ignoring blank values
    pub fn submitted_text(&self) -> Option<&str> {
        self.form_submitted_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Configured redirect URL with a scheme, ignoring blank values
    ///
    /// URLs without a scheme get `http://` prepended.
    pub fn redirect_url(&self) -> Option<String> {
        let url = self.redirect_url.as_deref().map(str::trim)?;
        if url.is_empty() {
            return None;
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            Some(url.to_string())
        } else {
            Some(format!("http://{}", url))
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors in a node's configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid form configuration for '{path}': {}", errors.join("; "))]
    Invalid { path: String, errors: Vec<String> },
}

// ============================================================================
// Defaults and serde helpers
// ============================================================================

fn default_form_title() -> String {
    DEFAULT_FORM_TITLE.to_string()
}

fn default_node_version() -> f64 {
    DEFAULT_NODE_VERSION
}

fn empty_object() -> Value {
    json!({})
}

/// Contact form used when the node does not configure a schema
pub fn default_json_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "email", "message"],
        "properties": {
            "name": {
                "type": "string",
                "title": "Name",
                "minLength": 1
            },
            "email": {
                "type": "string",
                "title": "Email",
                "format": "email"
            },
            "message": {
                "type": "string",
                "title": "Message",
                "layout": "textarea"
            }
        }
    })
}

fn json_or_string<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
        other => Ok(other),
    }
}

fn optional_json_or_string<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => serde_json::from_str(&text)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Ok(Some(other)),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
