//! Integration tests for response modes and execution status polling

mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, contact_form, get, post_json, TestApp};
use form_trigger_api::{FormEndpointConfig, InMemoryDispatcher, ServiceConfig};
use form_trigger_core::{
    response_mode::{FORM_NODE, RESPOND_TO_WEBHOOK_NODE},
    ConnectedNode, HttpReply, ResponseMode,
};
use serde_json::json;

/// Verify that onReceived answers at once and runs the workflow afterwards
#[tokio::test]
async fn test_on_received_answers_immediately() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let response = app
        .send(post_json(
            "/form/contact",
            json!({ "data": { "name": "Jo" } }),
            &[],
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Workflow was started");
    app.wait_for_runs(1).await;
    assert_eq!(
        app.dispatcher.runs()[0].response_mode,
        ResponseMode::OnReceived
    );
}

/// Verify that lastNode returns what the workflow produced
#[tokio::test]
async fn test_last_node_returns_workflow_reply() {
    // Arrange
    let mut config = ServiceConfig::default();
    config.forms = vec![FormEndpointConfig::new(
        contact_form("orders").with_response_mode(ResponseMode::LastNode),
    )];
    let dispatcher = InMemoryDispatcher::new().with_reply(
        HttpReply::json(201, json!({ "orderId": 42 })).with_header("X-Order", "42"),
    );
    let app = TestApp::with_dispatcher(config, dispatcher);

    // Act
    let response = app
        .send(post_json(
            "/form/orders",
            json!({ "data": { "name": "Jo" } }),
            &[],
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-order"], "42");
    assert_eq!(body_json(response).await["orderId"], 42);
    assert_eq!(app.dispatcher.run_count(), 1);
}

/// Verify that responseNode without a respond node is a workflow error
#[tokio::test]
async fn test_response_node_without_respond_node_fails() {
    // Arrange
    let app = TestApp::single(
        contact_form("signup").with_response_mode(ResponseMode::ResponseNode),
    );

    // Act
    let response = app.send(get("/form/signup", &[])).await;

    // Assert
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No Respond to Webhook node found in the workflow");
    assert!(body["description"]
        .as_str()
        .unwrap_or_default()
        .contains("Respond to Webhook"));
}

/// Verify that current trigger versions refuse a downstream respond node
#[tokio::test]
async fn test_respond_node_is_unsupported_on_current_version() {
    // Arrange
    let endpoint = FormEndpointConfig::new(
        contact_form("signup").with_response_mode(ResponseMode::ResponseNode),
    )
    .with_downstream_nodes(vec![ConnectedNode::new(
        "Respond",
        RESPOND_TO_WEBHOOK_NODE,
    )]);
    let app = TestApp::new(vec![endpoint]);

    // Act
    let response = app.send(get("/form/signup", &[])).await;

    // Assert
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["description"]
        .as_str()
        .unwrap_or_default()
        .contains("Form Ending"));
}

/// Verify that a downstream form page switches the page to responseNode
#[tokio::test]
async fn test_form_continuation_forces_response_node_on_page() {
    // Arrange
    let endpoint = FormEndpointConfig::new(contact_form("wizard"))
        .with_downstream_nodes(vec![ConnectedNode::new("Step 2", FORM_NODE)]);
    let app = TestApp::new(vec![endpoint]);

    // Act
    let response = app.send(get("/form/wizard", &[])).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("\"responseMode\":\"responseNode\""));
}

/// Verify that status polling reports null before and success after a run
#[tokio::test]
async fn test_execution_status_tracks_runs() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let before = app
        .send(get("/form-test/contact/n8n-execution-status", &[]))
        .await;
    let before = body_text(before).await;

    app.send(post_json(
        "/form-test/contact",
        json!({ "data": { "name": "Jo" } }),
        &[],
    ))
    .await;
    app.wait_for_runs(1).await;

    let after = app
        .send(get("/form-test/contact/n8n-execution-status", &[]))
        .await;
    let production = app
        .send(get("/form/contact/n8n-execution-status", &[]))
        .await;

    // Assert
    assert_eq!(before, "null");
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(body_text(after).await, "success");
    assert_eq!(body_text(production).await, "null");
}

/// Verify that polling an unknown form is not found
#[tokio::test]
async fn test_execution_status_for_unknown_form() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let response = app
        .send(get("/form/missing/n8n-execution-status", &[]))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
