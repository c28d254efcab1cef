//! Orchestration of a single form request.
//!
//! Order of checks: bot filter, authentication, response-mode consistency,
//! then method dispatch. Each step may end the request; only an accepted
//! POST produces workflow data.

use super::{
    format_submitted_at, FormRequest, HttpReply, Rejection, ResponseRecord, Submission,
    TriggerContext, WebhookOutcome, WebhookReply, WORKFLOW_STARTED_MESSAGE,
};
use crate::{
    auth, bot,
    config::{FormTriggerConfig, ResponseMode},
    credentials::CredentialStore,
    page::FormPageGenerator,
    response_mode::check_response_mode,
    schema::SchemaValidator,
    FormMode, TriggerResult,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Handles GET and POST requests for one form trigger node
#[derive(Clone)]
pub struct FormWebhookHandler {
    config: FormTriggerConfig,
    credentials: Arc<dyn CredentialStore>,
    pages: FormPageGenerator,
}

impl FormWebhookHandler {
    pub fn new(
        config: FormTriggerConfig,
        credentials: Arc<dyn CredentialStore>,
        pages: FormPageGenerator,
    ) -> Self {
        Self {
            config,
            credentials,
            pages,
        }
    }

    pub fn config(&self) -> &FormTriggerConfig {
        &self.config
    }

    /// Handle one request
    ///
    /// HTTP-level failures come back as an outcome carrying the rejection
    /// reply. A response-mode misconfiguration is returned as `Err`.
    #[instrument(
        skip(self, request, context),
        fields(
            path = %self.config.path,
            method = %request.method(),
            execution_mode = %context.execution_mode,
        )
    )]
    pub async fn handle(
        &self,
        request: &FormRequest,
        context: &TriggerContext,
    ) -> TriggerResult<WebhookOutcome> {
        if self.config.options.ignore_bots && bot::is_bot(request.user_agent()) {
            info!(user_agent = ?request.user_agent(), "Rejected bot request");
            return Ok(WebhookOutcome::rejected(Rejection::Bot));
        }

        if let Err(e) = auth::authenticate(
            self.config.authentication,
            self.credentials.as_ref(),
            request,
        )
        .await
        {
            return Ok(WebhookOutcome::rejected(Rejection::Auth(e)));
        }

        check_response_mode(
            &context.node_name,
            self.config.response_mode,
            self.config.node_version,
            &context.downstream_nodes,
        )?;

        match request.method() {
            "GET" => self.serve_page(context),
            "POST" => self.submit(request, context),
            other => {
                debug!(method = other, "Method not allowed");
                Ok(WebhookOutcome::rejected(Rejection::MethodNotAllowed {
                    method: other.to_string(),
                }))
            }
        }
    }

    fn serve_page(&self, context: &TriggerContext) -> TriggerResult<WebhookOutcome> {
        let html = self.pages.render_form_page(&self.config, context)?;
        Ok(WebhookOutcome::respond(HttpReply::html(200, html)))
    }

    fn submit(
        &self,
        request: &FormRequest,
        context: &TriggerContext,
    ) -> TriggerResult<WebhookOutcome> {
        let submission = match Submission::from_body(request.body()) {
            Ok(submission) => submission,
            Err(message) => {
                warn!(reason = %message, "Rejected malformed submission");
                return Ok(WebhookOutcome::rejected(Rejection::InvalidPayload {
                    message,
                }));
            }
        };

        let mut data = Value::Object(submission.data);
        let validator = SchemaValidator::compile(&self.config.form.json_schema)?;
        if let Err(errors) = validator.validate(&mut data) {
            warn!(errors = errors.len(), "Submission failed schema validation");
            return Ok(WebhookOutcome::rejected(Rejection::DataInvalid { errors }));
        }

        let mut event = submission.event.map(Value::Object);
        if let Some(event_schema) = &self.config.options.event_json_schema {
            let validator = SchemaValidator::compile(event_schema)?;
            let submitted = event.is_some();
            let mut candidate = event.take().unwrap_or_else(|| json!({}));
            if let Err(errors) = validator.validate(&mut candidate) {
                warn!(errors = errors.len(), "Submission event failed schema validation");
                return Ok(WebhookOutcome::rejected(Rejection::EventInvalid { errors }));
            }
            // Defaults only reach the record for events the client sent
            if submitted {
                event = Some(candidate);
            }
        }

        let timezone = if self.config.options.use_workflow_timezone {
            context.workflow_timezone.as_deref()
        } else {
            None
        };

        let record = ResponseRecord::new(
            data,
            event,
            format_submitted_at(request.received_at(), timezone),
            FormMode::from_execution_mode(context.execution_mode),
            request.query(),
        );

        let reply = match self.config.response_mode {
            ResponseMode::OnReceived => WebhookReply::Respond(HttpReply::json(
                200,
                json!({ "message": WORKFLOW_STARTED_MESSAGE }),
            )),
            ResponseMode::LastNode | ResponseMode::ResponseNode => WebhookReply::Deferred,
        };

        info!(
            form_mode = %record.form_mode,
            response_mode = self.config.response_mode.as_str(),
            "Accepted form submission"
        );

        Ok(WebhookOutcome::submitted(reply, record))
    }
}

impl std::fmt::Debug for FormWebhookHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormWebhookHandler")
            .field("path", &self.config.path)
            .field("authentication", &self.config.authentication)
            .field("response_mode", &self.config.response_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
