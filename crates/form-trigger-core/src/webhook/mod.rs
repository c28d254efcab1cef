//! # Webhook Processing Module
//!
//! Transport-independent request and reply types for form webhooks, the
//! request-scoped host context, and the orchestrating [`FormWebhookHandler`].
//!
//! Rejections are plain values; the HTTP layer maps them to responses only at
//! the outermost boundary.

use crate::{
    auth::{AuthError, BASIC_CHALLENGE},
    response_mode::ConnectedNode,
    schema::SchemaViolation,
    ExecutionMode,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

pub mod handler;
pub mod record;

pub use handler::FormWebhookHandler;
pub use record::{format_submitted_at, ResponseRecord, Submission};

/// Acknowledgment returned for accepted submissions in `onReceived` mode
pub const WORKFLOW_STARTED_MESSAGE: &str = "Workflow was started";

// ============================================================================
// Request and Context
// ============================================================================

/// Inbound HTTP request to a form endpoint
#[derive(Debug, Clone)]
pub struct FormRequest {
    method: String,
    headers: HashMap<String, String>,
    query: BTreeMap<String, String>,
    body: Bytes,
    received_at: DateTime<Utc>,
}

impl FormRequest {
    /// Create new request; header names are normalized to lowercase
    pub fn new(
        method: impl Into<String>,
        headers: HashMap<String, String>,
        query: BTreeMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            query,
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    /// Override the receive time
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Request-scoped facts supplied by the workflow host
#[derive(Debug, Clone)]
pub struct TriggerContext {
    /// Display name of the trigger node, used in error reports
    pub node_name: String,

    /// IANA timezone name configured on the workflow
    pub workflow_timezone: Option<String>,

    /// Whether the workflow runs interactively or in production
    pub execution_mode: ExecutionMode,

    /// Nodes wired downstream of the trigger
    pub downstream_nodes: Vec<ConnectedNode>,

    /// URL a paused workflow resumes on, when one exists
    pub resume_url: Option<String>,
}

impl TriggerContext {
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn with_workflow_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.workflow_timezone = Some(timezone.into());
        self
    }

    pub fn with_execution_mode(mut self, execution_mode: ExecutionMode) -> Self {
        self.execution_mode = execution_mode;
        self
    }

    pub fn with_downstream_nodes(mut self, nodes: Vec<ConnectedNode>) -> Self {
        self.downstream_nodes = nodes;
        self
    }

    pub fn with_resume_url(mut self, resume_url: impl Into<String>) -> Self {
        self.resume_url = Some(resume_url.into());
        self
    }
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self {
            node_name: "Form Trigger".to_string(),
            workflow_timezone: None,
            execution_mode: ExecutionMode::default(),
            downstream_nodes: Vec::new(),
            resume_url: None,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of handling one form request
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    /// What to send back to the client
    pub reply: WebhookReply,

    /// Record to start the workflow with; only set for accepted submissions
    pub workflow_data: Option<ResponseRecord>,

    /// Short reason label when the request was rejected
    pub rejection: Option<&'static str>,
}

impl WebhookOutcome {
    /// Outcome that answers the request and emits nothing downstream
    pub fn respond(reply: HttpReply) -> Self {
        Self {
            reply: WebhookReply::Respond(reply),
            workflow_data: None,
            rejection: None,
        }
    }

    /// Outcome for a rejected request
    pub fn rejected(rejection: Rejection) -> Self {
        let reason = rejection.reason();
        Self {
            rejection: Some(reason),
            ..Self::respond(rejection.into_reply())
        }
    }

    /// Outcome for an accepted submission
    pub fn submitted(reply: WebhookReply, record: ResponseRecord) -> Self {
        Self {
            reply,
            workflow_data: Some(record),
            rejection: None,
        }
    }

    /// HTTP reply, unless deferred to the workflow
    pub fn http_reply(&self) -> Option<&HttpReply> {
        match &self.reply {
            WebhookReply::Respond(reply) => Some(reply),
            WebhookReply::Deferred => None,
        }
    }
}

/// How the client gets answered
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookReply {
    /// Answer immediately
    Respond(HttpReply),

    /// Answer with whatever the workflow produces
    Deferred,
}

/// Transport-independent HTTP reply
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ReplyBody,
}

impl HttpReply {
    pub fn new(status: u16, body: ReplyBody) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    pub fn html(status: u16, html: impl Into<String>) -> Self {
        Self::new(status, ReplyBody::Html(html.into()))
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self::new(status, ReplyBody::Json(value))
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        Self::new(status, ReplyBody::Text(text.into()))
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, ReplyBody::Empty)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Body of an [`HttpReply`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Empty,
    Text(String),
    Html(String),
    Json(Value),
}

impl ReplyBody {
    /// Content type for the body, if it has one
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Text(_) => Some("text/plain; charset=utf-8"),
            Self::Html(_) => Some("text/html; charset=utf-8"),
            Self::Json(_) => Some("application/json"),
        }
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Reasons a request is answered without emitting workflow data
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Authentication failed (401/403/500)
    Auth(AuthError),

    /// User-agent matched a bot signature while bots are ignored (403)
    Bot,

    /// Body is not a JSON object with a `data` object (400)
    InvalidPayload { message: String },

    /// `data` failed the form schema (400)
    DataInvalid { errors: Vec<SchemaViolation> },

    /// `event` failed the event schema (400)
    EventInvalid { errors: Vec<SchemaViolation> },

    /// Neither GET nor POST (405)
    MethodNotAllowed { method: String },
}

impl Rejection {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Auth(e) => e.status_code(),
            Self::Bot => 403,
            Self::InvalidPayload { .. } => 400,
            Self::DataInvalid { .. } => 400,
            Self::EventInvalid { .. } => 400,
            Self::MethodNotAllowed { .. } => 405,
        }
    }

    /// Label used in logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Bot => "bot",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::DataInvalid { .. } => "invalid_data",
            Self::EventInvalid { .. } => "invalid_event",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
        }
    }

    /// Map the rejection to the reply the client sees
    pub fn into_reply(self) -> HttpReply {
        let status = self.status_code();
        match self {
            Self::Auth(e) => {
                let challenge = e.requires_challenge();
                let reply = HttpReply::text(status, e.message());
                if challenge {
                    reply.with_header("WWW-Authenticate", BASIC_CHALLENGE)
                } else {
                    reply
                }
            }
            Self::Bot => HttpReply::empty(status),
            Self::InvalidPayload { message } => HttpReply::json(
                status,
                json!({ "message": message, "errors": Vec::<Value>::new() }),
            ),
            Self::DataInvalid { errors } => validation_reply(status, "Invalid form data", errors),
            Self::EventInvalid { errors } => validation_reply(status, "Invalid event data", errors),
            Self::MethodNotAllowed { .. } => {
                HttpReply::empty(status).with_header("Allow", "GET, POST")
            }
        }
    }
}

fn validation_reply(status: u16, message: &str, errors: Vec<SchemaViolation>) -> HttpReply {
    HttpReply::json(status, json!({ "message": message, "errors": errors }))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
