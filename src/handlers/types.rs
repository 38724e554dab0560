use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::ParamValue;
use crate::runtime_config::AppConfig;
use crate::server::{Emitted, Output, Request, Response};
use crate::templates::{escape_html, Templates};

/// What a controller or not-found hook hands back to the dispatcher.
///
/// The variant decides how the response is normalized:
///
/// - `Text` is sent as-is with the default HTML content type,
/// - `Json` is serialized, with `application/json` unless a content type was
///   already set on the output,
/// - `Response` emits itself through [`Response::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Json(Value),
    Response(Response),
}

impl Reply {
    /// Structured reply from any serializable value
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Reply::Json(serde_json::to_value(value)?))
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Json(v)
    }
}

impl From<Response> for Reply {
    fn from(r: Response) -> Self {
        Reply::Response(r)
    }
}

/// Result of running one route filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// Run the next filter, then the controller
    Continue,
    /// Abandon this route and keep scanning later routes
    Skip,
    /// Stop routing and send this response instead of calling the controller
    Respond(Response),
}

impl From<bool> for FilterOutcome {
    fn from(pass: bool) -> Self {
        if pass {
            FilterOutcome::Continue
        } else {
            FilterOutcome::Skip
        }
    }
}

impl From<Response> for FilterOutcome {
    fn from(r: Response) -> Self {
        FilterOutcome::Respond(r)
    }
}

/// Controller capability: invoked with the positional route parameters.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &mut Context<'_>, params: &[ParamValue]) -> anyhow::Result<Reply>;
}

impl<F> Handler for F
where
    F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync,
{
    fn handle(&self, ctx: &mut Context<'_>, params: &[ParamValue]) -> anyhow::Result<Reply> {
        self(ctx, params)
    }
}

/// Route guard run before the controller.
pub trait Filter: Send + Sync {
    fn check(&self, ctx: &mut Context<'_>) -> anyhow::Result<FilterOutcome>;
}

impl<F> Filter for F
where
    F: Fn(&mut Context<'_>) -> anyhow::Result<FilterOutcome> + Send + Sync,
{
    fn check(&self, ctx: &mut Context<'_>) -> anyhow::Result<FilterOutcome> {
        self(ctx)
    }
}

/// Runs before any routing decision
pub type BeforeHook = Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync>;
/// Runs when no route produced a response; `Some` ends the fallback chain
pub type NotFoundHook =
    Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<Option<Reply>> + Send + Sync>;
/// Receives the response about to be sent and must return it (possibly changed)
pub type BeforeSendHook =
    Arc<dyn Fn(Response, &mut Context<'_>) -> anyhow::Result<Option<Response>> + Send + Sync>;
/// Runs after emission with the emitted response
pub type AfterHook = Arc<dyn Fn(&Emitted, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync>;
/// Observes a fault before the error page is built
pub type ErrorHook = Arc<dyn Fn(&ErrorInfo, &mut Context<'_>) + Send + Sync>;
/// Runs before every template render
pub type RenderHook = Arc<dyn Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Description of an error page, passed to error hooks and error templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub status: u16,
    pub title: String,
    pub message: String,
    /// Error type label, only for faults
    pub kind: Option<String>,
    /// Full error chain, only when detailed errors are enabled
    pub detail: Option<String>,
}

/// Everything a callback can see and touch while a request is dispatched.
pub struct Context<'a> {
    request: &'a Request,
    request_id: RequestId,
    config: &'a AppConfig,
    templates: &'a Templates,
    render_hooks: &'a [RenderHook],
    /// Output stream; use it for status, headers and direct writes
    pub output: &'a mut Output,
    /// Application-wide values, merged into every template render
    pub locals: &'a mut Map<String, Value>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        request: &'a Request,
        request_id: RequestId,
        config: &'a AppConfig,
        templates: &'a Templates,
        render_hooks: &'a [RenderHook],
        output: &'a mut Output,
        locals: &'a mut Map<String, Value>,
    ) -> Self {
        Self {
            request,
            request_id,
            config,
            templates,
            render_hooks,
            output,
            locals,
        }
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        self.request
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        self.config
    }

    /// Path as requested, without the query string
    #[must_use]
    pub fn requested_path(&self) -> &str {
        &self.request.path
    }

    /// Set the response status.
    ///
    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn status(&mut self, status: u16) -> Result<(), DispatchError> {
        self.output.set_status(status)
    }

    /// Set a response header.
    ///
    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn header(&mut self, name: &str, value: &str) -> Result<(), DispatchError> {
        self.output.set_header(name, value)
    }

    /// Send headers that disable caching.
    ///
    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn no_cache(&mut self) -> Result<(), DispatchError> {
        self.output
            .set_header("Cache-Control", "no-cache, no-store, must-revalidate")?;
        self.output.set_header("Pragma", "no-cache")?;
        self.output.set_header("Expires", "-1")
    }

    /// Write directly to the output; the first write commits the headers
    pub fn write(&mut self, text: &str) {
        self.output.write(text.as_bytes());
    }

    /// Render template files with `data` layered over the application locals.
    ///
    /// Render hooks run first.
    ///
    /// # Errors
    ///
    /// Fails when a render hook fails or a template cannot be loaded or rendered.
    pub fn render(&mut self, files: &[&str], data: &Value) -> Result<String, DispatchError> {
        let hooks = self.render_hooks;
        for hook in hooks {
            hook(self)?;
        }
        Ok(self.templates.render(files, &*self.locals, data)?)
    }

    /// HTML-escape text for safe inclusion in markup
    #[must_use]
    pub fn escape(&self, text: &str) -> String {
        escape_html(text)
    }
}
