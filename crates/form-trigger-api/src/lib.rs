//! # Form Trigger HTTP Service
//!
//! HTTP server exposing schema-driven form triggers.
//!
//! This service provides:
//! - `GET|POST /form/{path}` for every configured form (production execution)
//! - `GET|POST /form-test/{path}` for the same forms in manual execution
//! - `GET /form/{path}/n8n-execution-status` for the page's polling loop
//! - Health and Prometheus metrics endpoints
//!
//! Request handling itself lives in `form-trigger-core`; this crate maps
//! HTTP onto [`form_trigger_core::FormRequest`] and the resulting
//! [`form_trigger_core::WebhookOutcome`] back onto HTTP, and hands accepted
//! submissions to a [`WorkflowDispatcher`].

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod metrics;
pub mod registry;

pub use config::{
    FormEndpointConfig, LoggingConfig, PageSettings, ServerConfig, ServiceConfig,
    WorkflowSettings, CONFIG_FILE_ENV,
};
pub use dispatcher::{
    DispatchError, ExecutionStatus, InMemoryDispatcher, WorkflowDispatcher, WorkflowRun,
    DEFAULT_RUN_HISTORY,
};
pub use errors::{ConfigError, FormHandlerError, ServiceError};
pub use metrics::FormMetrics;
pub use registry::{FormEndpoint, FormRegistry};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use form_trigger_core::{
    ExecutionMode, FormRequest, HttpReply, ReplyBody, WebhookOutcome, WebhookReply,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn, Instrument};

/// Header carrying the request correlation ID
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Forms reachable by path
    pub forms: Arc<FormRegistry>,

    /// Workflow engine accepted submissions are handed to
    pub dispatcher: Arc<dyn WorkflowDispatcher>,

    /// Metrics collector for observability
    pub metrics: Arc<FormMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        forms: FormRegistry,
        dispatcher: Arc<dyn WorkflowDispatcher>,
        metrics: Arc<FormMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            forms: Arc::new(forms),
            dispatcher,
            metrics,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;

    let mut form_routes = Router::new()
        .route("/form/{path}", any(handle_production_form))
        .route(
            "/form/{path}/n8n-execution-status",
            get(handle_production_status),
        );

    if state.config.workflow.enable_test_routes {
        form_routes = form_routes
            .route("/form-test/{path}", any(handle_test_form))
            .route(
                "/form-test/{path}/n8n-execution-status",
                get(handle_test_status),
            );
    }

    let observability_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/metrics", get(metrics_endpoint));

    let mut router = Router::new()
        .merge(form_routes)
        .merge(observability_routes)
        .layer(DefaultBodyLimit::max(server.max_body_size));

    if server.enable_compression {
        router = router.layer(CompressionLayer::new());
    }
    if server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then lets in-flight requests finish.
pub async fn start_server(
    config: ServiceConfig,
    forms: FormRegistry,
    dispatcher: Arc<dyn WorkflowDispatcher>,
) -> Result<(), ServiceError> {
    if forms.is_empty() {
        return Err(ServiceError::Configuration(ConfigError::Missing {
            key: "forms".to_string(),
        }));
    }

    let metrics = FormMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let form_count = forms.len();

    let app = create_router(AppState::new(config, forms, dispatcher, metrics));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, forms = form_count, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!(timeout_seconds = shutdown_timeout.as_secs(), "Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!(timeout_seconds = shutdown_timeout.as_secs(), "Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Form Handlers
// ============================================================================

async fn handle_production_form(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Response, FormHandlerError> {
    let request = form_request(&method, &headers, query, body);
    handle_form(state, path, ExecutionMode::Production, request).await
}

async fn handle_test_form(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Response, FormHandlerError> {
    let request = form_request(&method, &headers, query, body);
    handle_form(state, path, ExecutionMode::Manual, request).await
}

/// Handle one form request
///
/// 1. Look up the form; unknown paths are 404
/// 2. Run the core handler, which answers GETs and rejections itself
/// 3. For accepted submissions, start the workflow: `onReceived` forms answer
///    at once and dispatch in the background, deferred forms wait for the
///    workflow's reply up to the server timeout
#[instrument(skip(state, request), fields(method = %request.method()))]
async fn handle_form(
    state: AppState,
    path: String,
    execution_mode: ExecutionMode,
    request: FormRequest,
) -> Result<Response, FormHandlerError> {
    let endpoint = state
        .forms
        .get(&path)
        .ok_or_else(|| FormHandlerError::FormNotFound { path: path.clone() })?;

    let start = Instant::now();
    let context = endpoint.context(execution_mode, state.config.workflow.timezone.as_deref());
    let outcome = endpoint.handler().handle(&request, &context).await;
    state
        .metrics
        .request_duration
        .with_label_values(&[path.as_str(), method_label(request.method())])
        .observe(start.elapsed().as_secs_f64());

    let outcome = outcome?;
    record_outcome(&state.metrics, &path, request.method(), &outcome);

    let WebhookOutcome {
        reply,
        workflow_data,
        ..
    } = outcome;

    let Some(record) = workflow_data else {
        return Ok(match reply {
            WebhookReply::Respond(reply) => into_http_response(reply),
            WebhookReply::Deferred => StatusCode::NO_CONTENT.into_response(),
        });
    };

    let run = WorkflowRun {
        form_path: path,
        node_name: endpoint.node_name().to_string(),
        execution_mode,
        response_mode: endpoint.handler().config().response_mode,
        record,
    };

    match reply {
        WebhookReply::Respond(reply) => {
            let dispatcher = Arc::clone(&state.dispatcher);
            tokio::spawn(
                async move {
                    if let Err(e) = dispatcher.dispatch(run).await {
                        error!(error = %e, "Background workflow dispatch failed");
                    }
                }
                .instrument(tracing::Span::current()),
            );
            Ok(into_http_response(reply))
        }
        WebhookReply::Deferred => {
            let seconds = state.config.server.timeout_seconds;
            let reply = tokio::time::timeout(
                Duration::from_secs(seconds),
                state.dispatcher.dispatch(run),
            )
            .await
            .map_err(|_| FormHandlerError::DispatchTimeout { seconds })??;
            Ok(into_http_response(reply))
        }
    }
}

async fn handle_production_status(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<String, FormHandlerError> {
    execution_status(state, path, ExecutionMode::Production).await
}

async fn handle_test_status(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<String, FormHandlerError> {
    execution_status(state, path, ExecutionMode::Manual).await
}

#[instrument(skip(state))]
async fn execution_status(
    state: AppState,
    path: String,
    execution_mode: ExecutionMode,
) -> Result<String, FormHandlerError> {
    if !state.forms.contains(&path) {
        return Err(FormHandlerError::FormNotFound { path });
    }

    let status = state
        .dispatcher
        .execution_status(&path, execution_mode)
        .await?;
    Ok(status.as_text().to_string())
}

fn form_request(
    method: &Method,
    headers: &HeaderMap,
    query: BTreeMap<String, String>,
    body: Bytes,
) -> FormRequest {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    FormRequest::new(method.as_str(), headers, query, body)
}

fn record_outcome(metrics: &FormMetrics, path: &str, method: &str, outcome: &WebhookOutcome) {
    if let Some(reason) = outcome.rejection {
        metrics
            .submissions_rejected
            .with_label_values(&[path, reason])
            .inc();

        if reason == "auth" {
            let status = outcome
                .http_reply()
                .map(|reply| reply.status.to_string())
                .unwrap_or_default();
            metrics
                .auth_failures
                .with_label_values(&[path, status.as_str()])
                .inc();
        }
    } else if let Some(record) = &outcome.workflow_data {
        metrics
            .submissions_accepted
            .with_label_values(&[path, record.form_mode.as_str()])
            .inc();
    } else if method == "GET" {
        metrics.pages_served.with_label_values(&[path]).inc();
    }
}

/// Metric label for a request method; anything but GET and POST is `other`
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        _ => "other",
    }
}

/// Convert a transport-independent reply into an axum response
fn into_http_response(reply: HttpReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = match reply.body {
        ReplyBody::Empty => status.into_response(),
        ReplyBody::Text(text) => (status, text).into_response(),
        ReplyBody::Html(html) => (status, Html(html)).into_response(),
        ReplyBody::Json(value) => (status, Json(value)).into_response(),
    };

    for (name, value) in reply.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Dropped reply header that is not valid HTTP"),
        }
    }

    response
}

// ============================================================================
// Health and Metrics
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,

    /// Paths of the registered forms
    pub forms: Vec<String>,

    pub timestamp: String,
}

#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        forms: state.forms.paths(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware
///
/// Propagates or generates the `x-correlation-id` header and logs every
/// request at a level matching its response status.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
