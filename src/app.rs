//! # Application Module
//!
//! [`Application`] owns everything a site is made of: the ordered route list,
//! the parameter rules, the lifecycle hooks, template settings and the CORS
//! policy. Requests are dispatched with [`Application::run`].
//!
//! ## Registration
//!
//! ```rust
//! use fastsite::app::Application;
//! use fastsite::handlers::Reply;
//! use fastsite::router::{Converter, Validation};
//! use fastsite::server::Request;
//! use serde_json::json;
//!
//! let mut app = Application::new();
//! app.param(":id", Validation::Int, Some(Converter::Int)).unwrap();
//! app.get("/users/:id", |_ctx, params| {
//!     Ok(Reply::Json(json!({ "id": params[0].as_i64() })))
//! });
//!
//! let emitted = app.run(&Request::get("/users/42"));
//! assert_eq!(emitted.status, 200);
//! assert_eq!(emitted.body_text(), r#"{"id":42}"#);
//! assert_eq!(app.run(&Request::get("/users/abc")).status, 404);
//! ```
//!
//! ## Mounts
//!
//! [`Application::mount`] defers registering a group of routes until a
//! request under its prefix arrives. Each mount runs at most once.

use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cors::Cors;
use crate::dispatcher::{self, errors};
use crate::error::ConfigError;
use crate::handlers::{
    AfterHook, BeforeHook, BeforeSendHook, Context, ErrorHook, ErrorInfo, Handler, NotFoundHook,
    RenderHook, Reply,
};
use crate::router::{
    match_pattern, validate_pattern, Converter, ParamList, ParamRules, ParamValue, Route,
    Validation,
};
use crate::runtime_config::AppConfig;
use crate::server::{Emitted, Request, Response};
use crate::templates::{escape_html, Templates};

/// Deferred route registration for a path prefix
pub type MountFn = Box<dyn FnOnce(&mut Application) -> anyhow::Result<()> + Send>;

pub(crate) struct Mount {
    pub(crate) prefix: String,
    pub(crate) register: Option<MountFn>,
}

/// Lifecycle hook lists, each run in registration order.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) before: Vec<BeforeHook>,
    pub(crate) not_found: Vec<NotFoundHook>,
    pub(crate) before_send: Vec<BeforeSendHook>,
    pub(crate) after: Vec<AfterHook>,
    pub(crate) error: Vec<ErrorHook>,
    pub(crate) render: Vec<RenderHook>,
}

/// A site: routes, parameter rules, hooks and settings.
pub struct Application {
    pub(crate) config: AppConfig,
    pub(crate) routes: Vec<Route>,
    pub(crate) params: ParamRules,
    pub(crate) hooks: Hooks,
    pub(crate) mounts: Vec<Mount>,
    pub(crate) templates: Templates,
    pub(crate) cors: Option<Cors>,
    pub(crate) requested_path: Option<String>,
    /// Values available to every template render and every callback
    pub locals: Map<String, Value>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("params", &self.params.len())
            .field("mounts", &self.mounts.len())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Application with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let templates = Templates::new(
            config.template_dir.clone(),
            config.header_templates.clone(),
            config.footer_templates.clone(),
        );
        Self {
            config,
            routes: Vec::new(),
            params: ParamRules::new(),
            hooks: Hooks::default(),
            mounts: Vec::new(),
            templates,
            cors: None,
            requested_path: None,
            locals: Map::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Change configuration; template settings are re-read
    pub fn set_config(&mut self, config: AppConfig) {
        self.templates = Templates::new(
            config.template_dir.clone(),
            config.header_templates.clone(),
            config.footer_templates.clone(),
        );
        self.config = config;
    }

    // ---------------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------------

    /// Register a route answering any method
    pub fn route<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, None, Arc::new(controller))
    }

    pub fn get<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, Some(Method::GET), Arc::new(controller))
    }

    pub fn post<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, Some(Method::POST), Arc::new(controller))
    }

    pub fn put<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, Some(Method::PUT), Arc::new(controller))
    }

    pub fn delete<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, Some(Method::DELETE), Arc::new(controller))
    }

    pub fn patch<F>(&mut self, pattern: &str, controller: F) -> &mut Route
    where
        F: Fn(&mut Context<'_>, &[ParamValue]) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.add_route(pattern, Some(Method::PATCH), Arc::new(controller))
    }

    /// Register a route with a controller type; `None` accepts any method.
    ///
    /// A malformed pattern is reported here and again, as a fatal error, when
    /// a request is matched against it.
    pub fn add_route(
        &mut self,
        pattern: &str,
        method: Option<Method>,
        controller: Arc<dyn Handler>,
    ) -> &mut Route {
        if let Err(err) = validate_pattern(pattern) {
            warn!(pattern = %pattern, error = %err, "Invalid route pattern registered");
        }
        info!(
            pattern = %pattern,
            method = %method.as_ref().map_or("*", Method::as_str),
            index = self.routes.len(),
            "Route registered"
        );
        self.routes.push(Route::new(pattern, method, controller));
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    /// Registered routes in registration order
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Match `path` against `pattern` with this application's rules and
    /// URL settings.
    ///
    /// # Errors
    ///
    /// See [`match_pattern`].
    pub fn route_matches(&self, pattern: &str, path: &str) -> Result<Option<ParamList>, ConfigError> {
        match_pattern(pattern, path, &self.params, self.config.match_options())
    }

    /// Path of the request being (or most recently) dispatched
    #[must_use]
    pub fn requested_path(&self) -> Option<&str> {
        self.requested_path.as_deref()
    }

    // ---------------------------------------------------------------------
    // Parameters
    // ---------------------------------------------------------------------

    /// Define a validation rule (and optional converter) for `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParamName`] or [`ConfigError::DuplicateParam`].
    pub fn param(
        &mut self,
        name: &str,
        validation: Validation,
        converter: Option<Converter>,
    ) -> Result<&mut Self, ConfigError> {
        self.params.define(name, validation, converter)?;
        Ok(self)
    }

    /// Define a rule from keywords: `"int"`, `"float"`, `"bool"`, `"any"` or a
    /// regular expression, with an optional `"int"`/`"float"`/`"bool"` converter.
    ///
    /// # Errors
    ///
    /// Rejects unknown converters, invalid regexes and duplicate names.
    pub fn param_keywords(
        &mut self,
        name: &str,
        validation: &str,
        converter: Option<&str>,
    ) -> Result<&mut Self, ConfigError> {
        let validation = Validation::parse(name, validation)?;
        let converter = converter.map(|c| Converter::parse(name, c)).transpose()?;
        self.param(name, validation, converter)
    }

    #[must_use]
    pub fn params(&self) -> &ParamRules {
        &self.params
    }

    // ---------------------------------------------------------------------
    // Mounts
    // ---------------------------------------------------------------------

    /// Register routes under `prefix` only when a request for it arrives.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMountPrefix`] unless `prefix` starts with `/`.
    pub fn mount<F>(&mut self, prefix: &str, register: F) -> Result<&mut Self, ConfigError>
    where
        F: FnOnce(&mut Application) -> anyhow::Result<()> + Send + 'static,
    {
        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidMountPrefix {
                prefix: prefix.to_string(),
            });
        }
        self.mounts.push(Mount {
            prefix: prefix.to_string(),
            register: Some(Box::new(register)),
        });
        Ok(self)
    }

    // ---------------------------------------------------------------------
    // Hooks
    // ---------------------------------------------------------------------

    /// Run before routing
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.before.push(Arc::new(hook));
        self
    }

    /// Run when no route answered; the first `Some` reply is used
    pub fn not_found<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<Option<Reply>> + Send + Sync + 'static,
    {
        self.hooks.not_found.push(Arc::new(hook));
        self
    }

    /// Inspect or replace the response before it is sent; returning `None`
    /// is a fatal error
    pub fn before_send<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Response, &mut Context<'_>) -> anyhow::Result<Option<Response>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.before_send.push(Arc::new(hook));
        self
    }

    /// Run once the response has been emitted
    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Emitted, &mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.after.push(Arc::new(hook));
        self
    }

    /// Observe faults before the 500 page is built
    pub fn on_error<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&ErrorInfo, &mut Context<'_>) + Send + Sync + 'static,
    {
        self.hooks.error.push(Arc::new(hook));
        self
    }

    /// Run before every template render
    pub fn on_render<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.render.push(Arc::new(hook));
        self
    }

    /// Apply a cross-origin policy to every response
    pub fn cors(&mut self, cors: Cors) -> &mut Self {
        self.cors = Some(cors);
        self
    }

    // ---------------------------------------------------------------------
    // Pages and helpers
    // ---------------------------------------------------------------------

    /// HTML error response rendered with the configured error template
    #[must_use]
    pub fn error_page(&self, status: u16, title: &str, message: &str) -> Response {
        let info = ErrorInfo {
            status,
            title: title.to_string(),
            message: message.to_string(),
            kind: None,
            detail: None,
        };
        let page = errors::render_error_page(
            &self.templates,
            &self.locals,
            &info,
            self.config.error_template.as_deref(),
        );
        Response::html(page.html).status(status)
    }

    /// Standard 404 page for the last requested path
    #[must_use]
    pub fn page_not_found(&self) -> Response {
        let info = errors::not_found_info(self.requested_path().unwrap_or("/"));
        let template = self
            .config
            .not_found_template
            .as_deref()
            .or(self.config.error_template.as_deref());
        let page = errors::render_error_page(&self.templates, &self.locals, &info, template);
        Response::html(page.html).status(404)
    }

    /// HTML-escape text
    #[must_use]
    pub fn escape(&self, text: &str) -> String {
        escape_html(text)
    }

    /// Dispatch one request through the full lifecycle.
    ///
    /// Always produces a response: faults become a 500 page.
    pub fn run(&mut self, request: &Request) -> Emitted {
        dispatcher::run(self, request)
    }
}
