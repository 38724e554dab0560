//! Error page construction for 404, 405 and 500 responses.
//!
//! Pages are rendered with the configured template when there is one. A
//! failing template falls back to [`BUILTIN_ERROR_TEMPLATE`] once; if that
//! fails too, [`LAST_RESORT_ERROR_PAGE`] is emitted verbatim.

use std::error::Error as _;

use http::Method;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::error::DispatchError;
use crate::handlers::ErrorInfo;
use crate::templates::{Templates, BUILTIN_ERROR_TEMPLATE, LAST_RESORT_ERROR_PAGE};

/// Rendered error page
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ErrorPage {
    pub(crate) html: String,
    /// The configured template was tried and failed
    pub(crate) template_failed: bool,
}

/// Render `info` with `template`, falling back to the built-in page.
pub(crate) fn render_error_page(
    templates: &Templates,
    locals: &Map<String, Value>,
    info: &ErrorInfo,
    template: Option<&str>,
) -> ErrorPage {
    let data = serde_json::to_value(info).unwrap_or_default();
    let mut template_failed = false;

    if let Some(file) = template {
        match templates.render(&[file], locals, &data) {
            Ok(html) => {
                return ErrorPage {
                    html,
                    template_failed,
                }
            }
            Err(err) => {
                warn!(template = %file, error = %err, "Error template failed; using built-in page");
                template_failed = true;
            }
        }
    }

    let html = match Templates::render_str("error.html", BUILTIN_ERROR_TEMPLATE, locals, &data) {
        Ok(html) => html,
        Err(err) => {
            error!(error = %err, "Built-in error template failed");
            LAST_RESORT_ERROR_PAGE.to_string()
        }
    };
    ErrorPage {
        html,
        template_failed,
    }
}

pub(crate) fn not_found_info(path: &str) -> ErrorInfo {
    ErrorInfo {
        status: 404,
        title: "404 - Page Not Found".to_string(),
        message: format!("The requested page [{path}] could not be found."),
        kind: None,
        detail: None,
    }
}

pub(crate) fn method_not_allowed_info(method: &Method, allow: &str) -> ErrorInfo {
    ErrorInfo {
        status: 405,
        title: "Error - Method Not Allowed".to_string(),
        message: format!(
            "A [{method}] request was submitted however this route only allows [{allow}] requests."
        ),
        kind: None,
        detail: None,
    }
}

pub(crate) fn server_error_info(err: &DispatchError, show_detail: bool) -> ErrorInfo {
    let (kind, detail) = if show_detail {
        (Some(err.kind().to_string()), Some(error_chain(err)))
    } else {
        (None, None)
    };
    ErrorInfo {
        status: 500,
        title: "An error has occurred".to_string(),
        message: "An error has occurred while processing your request.".to_string(),
        kind,
        detail,
    }
}

/// Error message followed by each `Caused by:` line
fn error_chain(err: &DispatchError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\nCaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// `Allow` header value: de-duplicated, alphabetical, with OPTIONS added on request
pub(crate) fn format_allow(methods: &[Method], with_options: bool) -> String {
    let mut names: Vec<&str> = methods.iter().map(Method::as_str).collect();
    if with_options {
        names.push(Method::OPTIONS.as_str());
    }
    names.sort_unstable();
    names.dedup();
    names.join(", ")
}
