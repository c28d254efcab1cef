//! Integration tests for serving form pages

mod common;

use axum::http::StatusCode;
use common::{body_text, contact_form, get, TestApp};
use form_trigger_core::config::FormOptions;

/// Verify that a GET returns the page with the schema embedded in the component
#[tokio::test]
async fn test_get_returns_page_with_schema_attribute() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let response = app.send(get("/form/contact", &[])).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(
        content_type.starts_with("text/html"),
        "Content-Type should be text/html, got: {}",
        content_type
    );

    let html = body_text(response).await;
    assert!(html.contains("<vjsf-form id=\"form\""));
    assert!(html.contains(" schema=\"{&quot;"));
    assert!(html.contains("&quot;minLength&quot;:1"));
}

/// Verify that repeated GETs for the same configuration are byte-identical
#[tokio::test]
async fn test_repeated_gets_are_identical() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let first = body_text(app.send(get("/form/contact", &[])).await).await;
    let second = body_text(app.send(get("/form/contact", &[])).await).await;

    // Assert
    assert_eq!(first, second);
}

/// Verify that known crawlers get an empty 403 when bots are ignored
#[tokio::test]
async fn test_bots_are_rejected_when_ignored() {
    // Arrange
    let trigger = contact_form("contact").with_options(FormOptions {
        ignore_bots: true,
        ..FormOptions::default()
    });
    let app = TestApp::single(trigger);

    // Act
    let response = app
        .send(get(
            "/form/contact",
            &[(
                "user-agent",
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
            )],
        ))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.is_empty());
}

/// Verify that crawlers are served normally when bots are not ignored
#[tokio::test]
async fn test_bots_are_served_by_default() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let response = app
        .send(get("/form/contact", &[("user-agent", "Googlebot/2.1")]))
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
}

/// Verify that custom CSS cannot smuggle markup into the page
#[tokio::test]
async fn test_custom_css_is_sanitized() {
    // Arrange
    let trigger = contact_form("contact").with_options(FormOptions {
        custom_css: Some(
            "body > main { color: red; }</style><script>alert(1)</script>".to_string(),
        ),
        ..FormOptions::default()
    });
    let app = TestApp::single(trigger);

    // Act
    let html = body_text(app.send(get("/form/contact", &[])).await).await;

    // Assert
    assert!(html.contains("body > main { color: red; }"));
    assert!(!html.contains("alert(1)</script>"));
    assert!(!html.contains("<script>alert"));
}

/// Verify that a read-only form has no submit button
#[tokio::test]
async fn test_readonly_form_has_no_submit_button() {
    // Arrange
    let trigger = contact_form("contact").with_options(FormOptions {
        readonly: true,
        ..FormOptions::default()
    });
    let app = TestApp::single(trigger);

    // Act
    let html = body_text(app.send(get("/form/contact", &[])).await).await;

    // Assert
    assert!(html.contains("readonly=\"true\""));
    assert!(!html.contains("id=\"submit-button\""));
}

/// Verify that the page tells the client script it runs in test mode
#[tokio::test]
async fn test_test_route_marks_page_as_test() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));

    // Act
    let production = body_text(app.send(get("/form/contact", &[])).await).await;
    let test = body_text(app.send(get("/form-test/contact", &[])).await).await;

    // Assert
    assert!(production.contains("\"isTest\":false"));
    assert!(test.contains("\"isTest\":true"));
}

/// Verify that unsupported methods are refused
#[tokio::test]
async fn test_delete_is_method_not_allowed() {
    // Arrange
    let app = TestApp::single(contact_form("contact"));
    let request = axum::http::Request::builder()
        .method("DELETE")
        .uri("/form/contact")
        .body(axum::body::Body::empty())
        .unwrap();

    // Act
    let response = app.send(request).await;

    // Assert
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()["allow"], "GET, POST");
}
