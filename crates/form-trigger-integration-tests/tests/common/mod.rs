//! Common test utilities for form-trigger-api integration tests
//!
//! This module provides:
//! - Builders for apps serving one or more forms
//! - Request helpers and body readers
//! - Credential and token fixtures

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use form_trigger_api::{
    create_router, AppState, FormEndpointConfig, FormMetrics, FormRegistry, InMemoryDispatcher,
    ServiceConfig, WorkflowDispatcher,
};
use form_trigger_core::{
    config::{FormDefinition, FormTriggerConfig},
    Credential,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Shared HMAC secret for JWT fixtures
#[allow(dead_code)]
pub const JWT_SECRET: &str = "integration-test-secret";

// ============================================================================
// Form fixtures
// ============================================================================

/// Schema with a required `name` and an optional `email`
#[allow(dead_code)]
pub fn contact_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "email": { "type": "string", "format": "email" }
        },
        "required": ["name"]
    })
}

/// Trigger configuration for the contact schema at `path`
#[allow(dead_code)]
pub fn contact_form(path: &str) -> FormTriggerConfig {
    FormTriggerConfig::new(path).with_form(FormDefinition::from_schema(contact_schema()))
}

// ============================================================================
// Test app
// ============================================================================

/// App under test with the dispatcher it hands runs to
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub dispatcher: InMemoryDispatcher,
}

#[allow(dead_code)]
impl TestApp {
    /// Serve the given forms with default service settings
    pub fn new(forms: Vec<FormEndpointConfig>) -> Self {
        Self::with_config(forms, |_| {})
    }

    /// Serve a single form without credentials
    pub fn single(trigger: FormTriggerConfig) -> Self {
        Self::new(vec![FormEndpointConfig::new(trigger)])
    }

    /// Serve a single form with credentials
    pub fn with_credentials(trigger: FormTriggerConfig, credentials: Vec<Credential>) -> Self {
        Self::new(vec![
            FormEndpointConfig::new(trigger).with_credentials(credentials),
        ])
    }

    /// Serve the given forms after adjusting the service configuration
    pub fn with_config(
        forms: Vec<FormEndpointConfig>,
        configure: impl FnOnce(&mut ServiceConfig),
    ) -> Self {
        let mut config = ServiceConfig::default();
        config.forms = forms;
        configure(&mut config);
        Self::from_config(config)
    }

    /// Serve everything a loaded service configuration describes
    pub fn from_config(config: ServiceConfig) -> Self {
        Self::with_dispatcher(config, InMemoryDispatcher::new())
    }

    /// Serve a configuration through a prepared dispatcher
    pub fn with_dispatcher(config: ServiceConfig, dispatcher: InMemoryDispatcher) -> Self {
        let registry = FormRegistry::from_config(&config);
        let state = AppState::new(
            config,
            registry,
            Arc::new(dispatcher.clone()) as Arc<dyn WorkflowDispatcher>,
            FormMetrics::new().expect("metrics registry"),
        );

        Self { state, dispatcher }
    }

    /// Fresh router over the shared state
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Send one request through a fresh router
    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;

        self.router()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Wait until the dispatcher has seen `expected` runs
    pub async fn wait_for_runs(&self, expected: usize) {
        for _ in 0..100 {
            if self.dispatcher.run_count() >= expected {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} workflow runs, saw {}",
            expected,
            self.dispatcher.run_count()
        );
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Build a GET request with optional extra headers
#[allow(dead_code)]
pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).expect("valid request")
}

/// Build a JSON POST request with optional extra headers
#[allow(dead_code)]
pub fn post_json(uri: &str, body: Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("JSON body")
}

// ============================================================================
// Credentials
// ============================================================================

/// `Authorization` value for HTTP Basic
#[allow(dead_code)]
pub fn basic_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// HS256 token signed with [`JWT_SECRET`]
#[allow(dead_code)]
pub fn hs256_token(claims: Value) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token encodes")
}
