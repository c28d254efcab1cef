//! # Response-Mode Validation
//!
//! Checks that a trigger's response mode is consistent with the nodes wired
//! downstream of it. A mismatch is a workflow configuration error, not an
//! HTTP failure.

use crate::{config::ResponseMode, TriggerError, TriggerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node type that answers a webhook explicitly
pub const RESPOND_TO_WEBHOOK_NODE: &str = "n8n-nodes-base.respondToWebhook";

/// Node type that renders a follow-up form page
pub const FORM_NODE: &str = "n8n-nodes-base.form";

/// Node type that pauses a workflow until resumed
pub const WAIT_NODE: &str = "n8n-nodes-base.wait";

/// Last node version that allowed a respond node downstream of a form trigger
const LEGACY_RESPOND_NODE_VERSION: f64 = 2.1;

/// A node wired downstream of the trigger, as reported by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedNode {
    pub name: String,

    #[serde(rename = "type", alias = "node_type")]
    pub node_type: String,

    #[serde(default)]
    pub parameters: Value,
}

impl ConnectedNode {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            parameters: Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn is_respond_node(&self) -> bool {
        self.node_type == RESPOND_TO_WEBHOOK_NODE
    }

    /// Check if the node continues the workflow with another form page
    pub fn is_form_continuation(&self) -> bool {
        self.node_type == FORM_NODE
            || (self.node_type == WAIT_NODE
                && self.parameters.get("resume").and_then(Value::as_str) == Some("form"))
    }
}

/// Validate the response mode against the downstream nodes
pub fn check_response_mode(
    node_name: &str,
    response_mode: ResponseMode,
    node_version: f64,
    downstream: &[ConnectedNode],
) -> TriggerResult<()> {
    let respond_node_connected = downstream.iter().any(ConnectedNode::is_respond_node);

    if !respond_node_connected && response_mode == ResponseMode::ResponseNode {
        return Err(misconfigured(
            node_name,
            "No Respond to Webhook node found in the workflow",
            "Insert a Respond to Webhook node to your workflow to respond to the form submission \
             or choose another option for the \"Respond When\" parameter",
        ));
    }

    if respond_node_connected
        && response_mode != ResponseMode::ResponseNode
        && node_version <= LEGACY_RESPOND_NODE_VERSION
    {
        return Err(misconfigured(
            node_name,
            "Form Trigger node not correctly configured",
            "Set the \"Respond When\" parameter to \"Using Respond to Webhook Node\" \
             or remove the Respond to Webhook node",
        ));
    }

    if respond_node_connected && node_version > LEGACY_RESPOND_NODE_VERSION {
        return Err(misconfigured(
            node_name,
            "The \"Respond to Webhook\" node is not supported in workflows initiated by the Form Trigger",
            "To configure your response, add a Form node and set the \"Page Type\" to \"Form Ending\"",
        ));
    }

    Ok(())
}

/// Check if any downstream node continues the workflow with another form page
pub fn has_form_continuation(downstream: &[ConnectedNode]) -> bool {
    downstream.iter().any(ConnectedNode::is_form_continuation)
}

fn misconfigured(node_name: &str, message: &str, description: &str) -> TriggerError {
    TriggerError::ResponseModeMisconfigured {
        node: node_name.to_string(),
        message: message.to_string(),
        description: description.to_string(),
    }
}

#[cfg(test)]
#[path = "response_mode_tests.rs"]
mod tests;
