//! Configuration types for the HTTP service

use crate::{dispatcher::DEFAULT_RUN_HISTORY, errors::ConfigError};
use form_trigger_core::{
    config::FormTriggerConfig, page::DEFAULT_COMPONENT_MODULE_URL, ConnectedNode, Credential,
};
use serde::Deserialize;
use std::{collections::HashSet, path::Path};
use tracing::info;

/// Environment variable naming an explicit configuration file
pub const CONFIG_FILE_ENV: &str = "FT_CONFIG_FILE";

/// Prefix of configuration environment variables (`FT__SERVER__PORT=9090`)
pub const ENV_PREFIX: &str = "FT";

const SYSTEM_CONFIG_FILE: &str = "/etc/form-trigger/service";
const LOCAL_CONFIG_FILE: &str = "config/service";

/// Service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Settings shared by every form's workflow
    pub workflow: WorkflowSettings,

    /// Form page rendering settings
    pub page: PageSettings,

    /// Forms served by this instance
    pub forms: Vec<FormEndpointConfig>,
}

impl ServiceConfig {
    /// Load configuration from files and the environment
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. `/etc/form-trigger/service.yaml`
    /// 2. `./config/service.yaml`
    /// 3. `explicit_path`, when given (must exist)
    /// 4. `FT__`-prefixed environment variables, `__` separating levels
    ///
    /// Every field has a default, so a missing file is not an error. A file
    /// that does not parse, or a value of the wrong type, is.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder()
            .add_source(
                ::config::File::with_name(SYSTEM_CONFIG_FILE)
                    .required(false)
                    .format(::config::FileFormat::Yaml),
            )
            .add_source(
                ::config::File::with_name(LOCAL_CONFIG_FILE)
                    .required(false)
                    .format(::config::FileFormat::Yaml),
            );

        if let Some(path) = explicit_path {
            info!(path = %path.display(), "Loading configuration from explicit path");
            builder = builder.add_source(
                ::config::File::from(path)
                    .required(true)
                    .format(::config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the whole configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must not be 0".to_string());
        }
        if self.server.max_body_size == 0 {
            errors.push("server.max_body_size must be greater than 0".to_string());
        }
        if self.server.timeout_seconds == 0 {
            errors.push("server.timeout_seconds must be greater than 0".to_string());
        }
        if self.page.component_module_url.trim().is_empty() {
            errors.push("page.component_module_url must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for form in &self.forms {
            if let Err(e) = form.trigger.validate() {
                errors.push(e.to_string());
            }
            if !seen.insert(form.trigger.path.as_str()) {
                errors.push(format!(
                    "form path '{}' is configured more than once",
                    form.trigger.path
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                message: errors.join("; "),
            })
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Time a deferred submission may wait for the workflow's answer
    pub timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            timeout_seconds: 30,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
            enable_compression: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Workflow-wide settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// IANA timezone of the workflow, used for `submittedAt`
    pub timezone: Option<String>,

    /// Serve `/form-test/{path}` routes running in manual mode
    pub enable_test_routes: bool,

    /// Completed runs the in-memory dispatcher keeps (default: 100)
    pub run_history: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            enable_test_routes: true,
            run_history: DEFAULT_RUN_HISTORY,
        }
    }
}

/// Form page settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    /// Location of the form webcomponent module
    pub component_module_url: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            component_module_url: DEFAULT_COMPONENT_MODULE_URL.to_string(),
        }
    }
}

/// One served form: node parameters plus the host facts around it
#[derive(Debug, Clone, Deserialize)]
pub struct FormEndpointConfig {
    #[serde(flatten)]
    pub trigger: FormTriggerConfig,

    /// Display name of the trigger node
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Nodes wired downstream of the trigger
    #[serde(default)]
    pub downstream_nodes: Vec<ConnectedNode>,

    /// Credentials available to the node's authentication
    #[serde(default)]
    pub credentials: Vec<Credential>,

    /// Resume URL handed to the page, when the workflow waits on it
    #[serde(default)]
    pub resume_url: Option<String>,
}

impl FormEndpointConfig {
    pub fn new(trigger: FormTriggerConfig) -> Self {
        Self {
            trigger,
            node_name: default_node_name(),
            downstream_nodes: Vec::new(),
            credentials: Vec::new(),
            resume_url: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Vec<Credential>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_downstream_nodes(mut self, nodes: Vec<ConnectedNode>) -> Self {
        self.downstream_nodes = nodes;
        self
    }
}

fn default_node_name() -> String {
    "Form Trigger".to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
