//! Form registry for path-based routing.
//!
//! [`FormRegistry`] maps the `{path}` URL segment to a [`FormEndpoint`]: the
//! core handler plus the host facts the handler needs per request. The
//! registry is built once at startup and used read-only during request
//! handling.
//!
//! # URL Structure
//!
//! ```text
//! GET|POST /form/{path}         production execution
//! GET|POST /form-test/{path}    manual execution
//! ```

use crate::config::{FormEndpointConfig, ServiceConfig};
use form_trigger_core::{
    ConnectedNode, ExecutionMode, FormPageGenerator, FormWebhookHandler,
    InMemoryCredentialStore, TriggerContext,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

/// One routable form
#[derive(Debug, Clone)]
pub struct FormEndpoint {
    handler: FormWebhookHandler,
    node_name: String,
    downstream_nodes: Vec<ConnectedNode>,
    resume_url: Option<String>,
}

impl FormEndpoint {
    pub fn new(handler: FormWebhookHandler) -> Self {
        Self {
            handler,
            node_name: "Form Trigger".to_string(),
            downstream_nodes: Vec::new(),
            resume_url: None,
        }
    }

    /// Build an endpoint from its configuration
    ///
    /// The form's credentials are loaded into a store private to the form.
    pub fn from_config(form: &FormEndpointConfig, pages: FormPageGenerator) -> Self {
        let trigger = &form.trigger;

        if let Some(kind) = trigger.authentication.credential_kind() {
            if !form.credentials.iter().any(|c| c.kind() == kind) {
                warn!(
                    path = %trigger.path,
                    credential = %kind,
                    "Form requires a credential that is not configured; requests will fail with 500"
                );
            }
        }

        let store = InMemoryCredentialStore::with_credentials(form.credentials.iter().cloned());
        let handler = FormWebhookHandler::new(trigger.clone(), Arc::new(store), pages);

        Self {
            handler,
            node_name: form.node_name.clone(),
            downstream_nodes: form.downstream_nodes.clone(),
            resume_url: form.resume_url.clone(),
        }
    }

    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn with_downstream_nodes(mut self, nodes: Vec<ConnectedNode>) -> Self {
        self.downstream_nodes = nodes;
        self
    }

    pub fn handler(&self) -> &FormWebhookHandler {
        &self.handler
    }

    pub fn path(&self) -> &str {
        &self.handler.config().path
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Request context for the given execution mode
    pub fn context(
        &self,
        execution_mode: ExecutionMode,
        workflow_timezone: Option<&str>,
    ) -> TriggerContext {
        let mut context = TriggerContext::default()
            .with_node_name(self.node_name.clone())
            .with_execution_mode(execution_mode)
            .with_downstream_nodes(self.downstream_nodes.clone());

        if let Some(timezone) = workflow_timezone {
            context = context.with_workflow_timezone(timezone);
        }
        if let Some(resume_url) = &self.resume_url {
            context = context.with_resume_url(resume_url.clone());
        }

        context
    }
}

/// Registry of forms keyed by path
#[derive(Debug, Clone, Default)]
pub struct FormRegistry {
    forms: HashMap<String, Arc<FormEndpoint>>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for every form in the service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        let pages = FormPageGenerator::new(config.page.component_module_url.clone());
        let mut registry = Self::new();

        for form in &config.forms {
            let endpoint = FormEndpoint::from_config(form, pages.clone());
            info!(
                path = %endpoint.path(),
                authentication = %form.trigger.authentication,
                response_mode = form.trigger.response_mode.as_str(),
                "Registered form"
            );
            registry.register(endpoint);
        }

        registry
    }

    /// Register an endpoint under its path, replacing any previous one
    pub fn register(&mut self, endpoint: FormEndpoint) -> Option<Arc<FormEndpoint>> {
        let path = endpoint.path().to_string();
        let previous = self.forms.insert(path.clone(), Arc::new(endpoint));
        if previous.is_some() {
            warn!(path = %path, "Replaced previously registered form");
        }
        previous
    }

    pub fn get(&self, path: &str) -> Option<Arc<FormEndpoint>> {
        self.forms.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.forms.contains_key(path)
    }

    /// Registered paths in sorted order
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.forms.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
