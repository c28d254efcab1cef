//! # Form Page Generation
//!
//! Builds the HTML document served on GET: a single `<vjsf-form>`
//! webcomponent carrying the form definition as JSON attributes, the page
//! stylesheet, sanitized custom CSS, and the client script that submits the
//! form and follows up on the result.
//!
//! Output is plain string assembly and depends only on its inputs, so
//! identical configuration yields byte-identical pages.

use crate::{
    config::{FormTriggerConfig, RespondWith, ResponseMode, DEFAULT_SUBMITTED_TEXT},
    response_mode::has_form_continuation,
    webhook::TriggerContext,
    ExecutionMode, TriggerResult,
};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

/// Default location of the form webcomponent module
pub const DEFAULT_COMPONENT_MODULE_URL: &str =
    "https://cdn.jsdelivr.net/npm/@koumoul/vjsf-webcomponent@3/dist/vjsf-form.js";

/// Link shown in the attribution footer
pub const ATTRIBUTION_URL: &str = "https://n8n.io/?utm_source=n8n-internal&utm_medium=form-trigger";

const FORM_PAGE_CSS: &str = include_str!("../assets/form-page.css");
const FORM_PAGE_JS: &str = include_str!("../assets/form-page.js");

static CSS_MARKUP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"<!--|-->|<[^>]*>")
        .inspect_err(|e| tracing::error!(error = %e, "Failed to compile CSS markup pattern"))
        .ok()
});

/// Renders form pages
#[derive(Debug, Clone)]
pub struct FormPageGenerator {
    component_module_url: String,
}

impl FormPageGenerator {
    pub fn new(component_module_url: impl Into<String>) -> Self {
        Self {
            component_module_url: component_module_url.into(),
        }
    }

    pub fn component_module_url(&self) -> &str {
        &self.component_module_url
    }

    /// Render the complete HTML document for a form
    pub fn render_form_page(
        &self,
        config: &FormTriggerConfig,
        context: &TriggerContext,
    ) -> TriggerResult<String> {
        let params = PageParameters::resolve(config, context);
        let params_json = escape_script_json(&serde_json::to_string(&params)?);
        let element = render_form_element(config)?;

        let title = escape_html(&config.form_title);
        let mut html = String::with_capacity(FORM_PAGE_CSS.len() + FORM_PAGE_JS.len() + 4096);

        html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        );
        html.push_str("<meta name=\"robots\" content=\"noindex, nofollow\">\n");
        html.push_str(&format!("<title>{}</title>\n", title));
        html.push_str(&format!("<style>\n{}</style>\n", FORM_PAGE_CSS));
        if let Some(css) = config
            .options
            .custom_css
            .as_deref()
            .filter(|css| !css.trim().is_empty())
        {
            html.push_str(&format!(
                "<style id=\"custom-css\">\n{}\n</style>\n",
                sanitize_css(css)
            ));
        }
        html.push_str(&format!(
            "<script type=\"module\" src=\"{}\"></script>\n",
            escape_html(&self.component_module_url)
        ));
        html.push_str("</head>\n<body>\n<main class=\"form-container\">\n");

        html.push_str("<header class=\"form-header\">\n");
        html.push_str(&format!("<h1>{}</h1>\n", title));
        if let Some(description) = config
            .form_description
            .as_deref()
            .filter(|description| !description.trim().is_empty())
        {
            html.push_str(&format!(
                "<p class=\"form-description\">{}</p>\n",
                escape_html(description)
            ));
        }
        html.push_str("</header>\n");

        html.push_str("<section id=\"form-section\">\n");
        html.push_str(&element);
        html.push('\n');
        if !config.options.readonly {
            html.push_str(
                "<div class=\"form-actions\"><button id=\"submit-button\" type=\"button\">Submit</button></div>\n",
            );
        }
        html.push_str("<p id=\"form-error\" class=\"form-error\" role=\"alert\" hidden></p>\n");
        html.push_str("</section>\n");

        html.push_str(
            "<section id=\"submitted-section\" class=\"submitted\" hidden>\n\
             <h2 id=\"submitted-message\"></h2>\n\
             </section>\n",
        );

        if config.options.append_attribution {
            html.push_str(&format!(
                "<footer class=\"form-footer\"><a href=\"{}\" target=\"_blank\" rel=\"noopener\">Form automated with n8n</a></footer>\n",
                escape_html(ATTRIBUTION_URL)
            ));
        }
        html.push_str("</main>\n");

        html.push_str(&format!(
            "<script id=\"form-trigger-params\" type=\"application/json\">{}</script>\n",
            params_json
        ));
        html.push_str(&format!("<script>\n{}</script>\n", FORM_PAGE_JS));
        html.push_str("</body>\n</html>\n");

        Ok(html)
    }
}

impl Default for FormPageGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_COMPONENT_MODULE_URL)
    }
}

/// Values the client script reads from the page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageParameters {
    respond_with: RespondWith,
    redirect_url: Option<String>,
    form_submitted_text: Option<String>,
    response_mode: ResponseMode,
    resume_url: Option<String>,
    is_test: bool,
}

impl PageParameters {
    /// Resolve the post-submission behavior
    ///
    /// A downstream form continuation forces `responseNode` and drops any
    /// configured redirect.
    fn resolve(config: &FormTriggerConfig, context: &TriggerContext) -> Self {
        let respond = &config.options.respond_with_options;
        let continuation = has_form_continuation(&context.downstream_nodes);

        let response_mode = if continuation {
            ResponseMode::ResponseNode
        } else {
            config.response_mode
        };

        let redirect_url = if continuation || respond.respond_with != RespondWith::Redirect {
            None
        } else {
            respond.redirect_url()
        };

        let form_submitted_text = match (&redirect_url, respond.submitted_text()) {
            (_, Some(text)) if respond.respond_with == RespondWith::Text => Some(text.to_string()),
            (None, _) => Some(DEFAULT_SUBMITTED_TEXT.to_string()),
            (Some(_), _) => None,
        };

        Self {
            respond_with: if redirect_url.is_some() {
                RespondWith::Redirect
            } else {
                RespondWith::Text
            },
            redirect_url,
            form_submitted_text,
            response_mode,
            resume_url: context.resume_url.clone(),
            is_test: context.execution_mode == ExecutionMode::Manual,
        }
    }
}

fn render_form_element(config: &FormTriggerConfig) -> TriggerResult<String> {
    let form = &config.form;
    let options = &config.options;

    let mut element = String::from("<vjsf-form id=\"form\"");
    push_json_attribute(&mut element, "schema", Some(&form.json_schema))?;
    push_json_attribute(&mut element, "ui-schema", non_empty(&form.ui_schema))?;
    push_json_attribute(&mut element, "data", non_empty(&form.data))?;
    push_json_attribute(&mut element, "config", non_empty(&form.config))?;
    push_json_attribute(
        &mut element,
        "vuetify-options",
        options.vuetify_options.as_ref().and_then(non_empty),
    )?;
    element.push_str(&format!(
        " validation-mode=\"{}\"",
        options.validation_mode.as_attribute()
    ));
    element.push_str(&format!(" readonly=\"{}\"", options.readonly));
    element.push_str("></vjsf-form>");

    Ok(element)
}

fn push_json_attribute(
    element: &mut String,
    name: &str,
    value: Option<&Value>,
) -> Result<(), serde_json::Error> {
    if let Some(value) = value {
        let json = serde_json::to_string(value)?.replace('/', "\\/");
        element.push_str(&format!(" {}=\"{}\"", name, escape_html(&json)));
    }
    Ok(())
}

fn non_empty(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other),
    }
}

/// Escape text for HTML content and double- or single-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Make JSON safe to embed in a `<script>` element
fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c").replace('/', "\\/")
}

/// Strip markup from user-supplied CSS
///
/// Removes HTML comment markers, every tag-like `<...>` sequence, and any
/// remaining `<`. Plain CSS, including `>` child combinators, is kept as is.
pub fn sanitize_css(css: &str) -> String {
    let stripped = match CSS_MARKUP.as_ref() {
        Some(pattern) => pattern.replace_all(css, "").into_owned(),
        None => css.replace("<!--", "").replace("-->", ""),
    };
    stripped.replace('<', "")
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
