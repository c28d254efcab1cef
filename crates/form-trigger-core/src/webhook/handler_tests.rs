//! Tests for the form webhook handler

use super::*;
use crate::{
    adapters::InMemoryCredentialStore,
    auth::AuthenticationMode,
    config::{FormOptions, RespondWithOptions},
    credentials::{BasicCredential, Credential},
    response_mode::{ConnectedNode, RESPOND_TO_WEBHOOK_NODE},
    webhook::ReplyBody,
    ExecutionMode, TriggerError,
};
use chrono::{TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};

const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

fn handler(config: FormTriggerConfig) -> FormWebhookHandler {
    handler_with_store(config, InMemoryCredentialStore::new())
}

fn handler_with_store(
    config: FormTriggerConfig,
    store: InMemoryCredentialStore,
) -> FormWebhookHandler {
    FormWebhookHandler::new(config, Arc::new(store), FormPageGenerator::default())
}

fn get() -> FormRequest {
    FormRequest::new("GET", HashMap::new(), BTreeMap::new(), Vec::new())
}

fn post(body: Value) -> FormRequest {
    FormRequest::new(
        "POST",
        HashMap::new(),
        BTreeMap::new(),
        serde_json::to_vec(&body).unwrap(),
    )
    .with_received_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

fn valid_contact() -> Value {
    json!({ "data": { "name": "Jo", "email": "jo@x.com", "message": "hi" } })
}

fn reply(outcome: &WebhookOutcome) -> &HttpReply {
    outcome.http_reply().expect("expected an immediate reply")
}

#[tokio::test]
async fn test_get_serves_form_page() {
    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&get(), &TriggerContext::default())
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 200);
    assert!(matches!(&reply.body, ReplyBody::Html(html) if html.contains(" schema=\"")));
    assert!(outcome.workflow_data.is_none());
}

#[tokio::test]
async fn test_valid_submission_emits_record() {
    let context = TriggerContext::default().with_execution_mode(ExecutionMode::Manual);

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&post(valid_contact()), &context)
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.body,
        ReplyBody::Json(json!({ "message": "Workflow was started" }))
    );

    let record = outcome.workflow_data.unwrap();
    assert_eq!(record.data["name"], json!("Jo"));
    assert_eq!(record.form_mode, FormMode::Test);
    assert_eq!(record.submitted_at, "2024-06-01T12:00:00.000+00:00");
    assert!(record.event.is_none());
    assert!(record.form_query_parameters.is_none());
}

#[tokio::test]
async fn test_invalid_email_is_rejected_without_record() {
    let body = json!({ "data": { "name": "Jo", "email": "not-an-email", "message": "hi" } });

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&post(body), &TriggerContext::default())
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 400);
    let ReplyBody::Json(body) = &reply.body else {
        panic!("expected JSON body");
    };
    assert_eq!(body["errors"][0]["path"], json!("/email"));
    assert_eq!(body["errors"][0]["keyword"], json!("format"));
    assert!(outcome.workflow_data.is_none());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let request = FormRequest::new("POST", HashMap::new(), BTreeMap::new(), "name=Jo");

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&request, &TriggerContext::default())
        .await
        .unwrap();

    assert_eq!(reply(&outcome).status, 400);
    assert!(outcome.workflow_data.is_none());
}

#[tokio::test]
async fn test_event_schema_is_enforced() {
    let config = FormTriggerConfig::new("contact").with_options(FormOptions {
        event_json_schema: Some(json!({
            "type": "object",
            "required": ["action"],
            "properties": { "action": { "enum": ["submit", "save"] } }
        })),
        ..Default::default()
    });
    let handler = handler(config);

    let mut body = valid_contact();
    body["event"] = json!({ "action": "delete" });
    let outcome = handler
        .handle(&post(body), &TriggerContext::default())
        .await
        .unwrap();
    let reply = reply(&outcome);
    assert_eq!(reply.status, 400);
    assert!(matches!(
        &reply.body,
        ReplyBody::Json(body) if body["message"] == json!("Invalid event data")
    ));

    let outcome = handler
        .handle(&post(valid_contact()), &TriggerContext::default())
        .await
        .unwrap();
    assert_eq!(outcome.http_reply().unwrap().status, 400);

    let mut body = valid_contact();
    body["event"] = json!({ "action": "save" });
    let outcome = handler
        .handle(&post(body), &TriggerContext::default())
        .await
        .unwrap();
    assert_eq!(
        outcome.workflow_data.unwrap().event,
        Some(json!({ "action": "save" }))
    );
}

#[tokio::test]
async fn test_event_defaults_reach_the_record() {
    let config = FormTriggerConfig::new("contact").with_options(FormOptions {
        event_json_schema: Some(json!({
            "type": "object",
            "properties": { "action": { "type": "string", "default": "submit" } }
        })),
        ..Default::default()
    });
    let handler = handler(config);

    let mut body = valid_contact();
    body["event"] = json!({});
    let outcome = handler
        .handle(&post(body), &TriggerContext::default())
        .await
        .unwrap();
    assert_eq!(
        outcome.workflow_data.unwrap().event,
        Some(json!({ "action": "submit" }))
    );

    let outcome = handler
        .handle(&post(valid_contact()), &TriggerContext::default())
        .await
        .unwrap();
    assert!(outcome.workflow_data.unwrap().event.is_none());
}

#[tokio::test]
async fn test_submission_uses_workflow_timezone() {
    let context = TriggerContext::default().with_workflow_timezone("America/New_York");

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&post(valid_contact()), &context)
        .await
        .unwrap();

    assert_eq!(
        outcome.workflow_data.unwrap().submitted_at,
        "2024-06-01T08:00:00.000-04:00"
    );
}

#[tokio::test]
async fn test_submission_ignores_workflow_timezone_when_disabled() {
    let config = FormTriggerConfig::new("contact").with_options(FormOptions {
        use_workflow_timezone: false,
        ..Default::default()
    });
    let context = TriggerContext::default().with_workflow_timezone("America/New_York");

    let outcome = handler(config)
        .handle(&post(valid_contact()), &context)
        .await
        .unwrap();

    assert_eq!(
        outcome.workflow_data.unwrap().submitted_at,
        "2024-06-01T12:00:00.000+00:00"
    );
}

#[tokio::test]
async fn test_query_parameters_are_recorded() {
    let mut query = BTreeMap::new();
    query.insert("campaign".to_string(), "spring".to_string());
    let request = FormRequest::new(
        "POST",
        HashMap::new(),
        query,
        serde_json::to_vec(&valid_contact()).unwrap(),
    );

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&request, &TriggerContext::default())
        .await
        .unwrap();

    let record = outcome.workflow_data.unwrap();
    assert_eq!(
        record.form_query_parameters.unwrap()["campaign"],
        "spring".to_string()
    );
    assert_eq!(record.form_mode, FormMode::Production);
}

#[tokio::test]
async fn test_last_node_mode_defers_reply() {
    let config =
        FormTriggerConfig::new("contact").with_response_mode(ResponseMode::LastNode);

    let outcome = handler(config)
        .handle(&post(valid_contact()), &TriggerContext::default())
        .await
        .unwrap();

    assert_eq!(outcome.reply, WebhookReply::Deferred);
    assert!(outcome.workflow_data.is_some());
}

#[tokio::test]
async fn test_other_methods_are_not_allowed() {
    let request = FormRequest::new("PUT", HashMap::new(), BTreeMap::new(), Vec::new());

    let outcome = handler(FormTriggerConfig::new("contact"))
        .handle(&request, &TriggerContext::default())
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 405);
    assert_eq!(reply.header("Allow"), Some("GET, POST"));
}

#[tokio::test]
async fn test_bots_are_rejected_before_auth() {
    let config = FormTriggerConfig::new("contact")
        .with_authentication(AuthenticationMode::BasicAuth)
        .with_options(FormOptions {
            ignore_bots: true,
            ..Default::default()
        });
    let mut headers = HashMap::new();
    headers.insert(
        "User-Agent".to_string(),
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)".to_string(),
    );
    let request = FormRequest::new("GET", headers, BTreeMap::new(), Vec::new());

    let outcome = handler(config)
        .handle(&request, &TriggerContext::default())
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 403);
    assert_eq!(reply.body, ReplyBody::Empty);
}

#[tokio::test]
async fn test_browsers_pass_bot_filter() {
    let config = FormTriggerConfig::new("contact").with_options(FormOptions {
        ignore_bots: true,
        ..Default::default()
    });
    let mut headers = HashMap::new();
    headers.insert("user-agent".to_string(), BROWSER_UA.to_string());
    let request = FormRequest::new("GET", headers, BTreeMap::new(), Vec::new());

    let outcome = handler(config)
        .handle(&request, &TriggerContext::default())
        .await
        .unwrap();

    assert_eq!(reply(&outcome).status, 200);
}

#[tokio::test]
async fn test_auth_failure_short_circuits() {
    let config =
        FormTriggerConfig::new("contact").with_authentication(AuthenticationMode::BasicAuth);
    let store = InMemoryCredentialStore::with_credentials([Credential::BasicAuth(
        BasicCredential {
            user: "ada".to_string(),
            password: "lovelace".into(),
        },
    )]);

    let outcome = handler_with_store(config, store)
        .handle(&post(valid_contact()), &TriggerContext::default())
        .await
        .unwrap();

    let reply = reply(&outcome);
    assert_eq!(reply.status, 401);
    assert_eq!(
        reply.header("WWW-Authenticate"),
        Some("Basic realm=\"Webhook\"")
    );
    assert!(outcome.workflow_data.is_none());
}

#[tokio::test]
async fn test_auth_runs_before_response_mode_check() {
    let config = FormTriggerConfig::new("contact")
        .with_authentication(AuthenticationMode::BearerAuth)
        .with_response_mode(ResponseMode::ResponseNode);

    let outcome = handler(config)
        .handle(&get(), &TriggerContext::default())
        .await
        .unwrap();

    assert_eq!(reply(&outcome).status, 500);
}

#[tokio::test]
async fn test_response_node_without_respond_node_is_workflow_error() {
    let config =
        FormTriggerConfig::new("contact").with_response_mode(ResponseMode::ResponseNode);
    let context = TriggerContext::default().with_node_name("Contact Form");

    for request in [get(), post(valid_contact())] {
        let error = handler(config.clone())
            .handle(&request, &context)
            .await
            .unwrap_err();

        match error {
            TriggerError::ResponseModeMisconfigured { node, .. } => {
                assert_eq!(node, "Contact Form")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_respond_node_on_current_version_is_workflow_error() {
    let context = TriggerContext::default().with_downstream_nodes(vec![ConnectedNode::new(
        "Respond",
        RESPOND_TO_WEBHOOK_NODE,
    )]);

    let result = handler(FormTriggerConfig::new("contact"))
        .handle(&get(), &context)
        .await;

    assert!(matches!(
        result,
        Err(TriggerError::ResponseModeMisconfigured { .. })
    ));
}

#[tokio::test]
async fn test_repeated_gets_are_identical() {
    let config = FormTriggerConfig::new("contact").with_options(FormOptions {
        respond_with_options: RespondWithOptions {
            form_submitted_text: Some("Thanks".to_string()),
            ..Default::default()
        },
        ..Default::default()
    });
    let handler = handler(config);
    let context = TriggerContext::default();

    let first = handler.handle(&get(), &context).await.unwrap();
    let second = handler.handle(&get(), &context).await.unwrap();

    assert_eq!(first.http_reply(), second.http_reply());
}
