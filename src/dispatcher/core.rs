use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use http::Method;
use serde_json::{Map, Value};
use tracing::{debug, error, info, info_span, warn};

use super::errors::{
    format_allow, method_not_allowed_info, not_found_info, render_error_page, server_error_info,
};
use crate::app::{Application, Hooks};
use crate::cors::Cors;
use crate::error::DispatchError;
use crate::handlers::{Context, FilterOutcome, Reply};
use crate::ids::RequestId;
use crate::router::{match_pattern, ParamRules, Route};
use crate::runtime_config::AppConfig;
use crate::server::{
    Emitted, Output, Request, Response, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON,
};
use crate::templates::Templates;

/// Header carrying the real method of a tunnelled POST
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Run `f` at a callback boundary, turning errors and panics into a
/// [`DispatchError`].
pub(crate) fn guard<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, DispatchError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.map_err(DispatchError::from),
        Err(panic) => Err(DispatchError::Panic(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The request as dispatched: POST with a method override header becomes
/// the overriding method when the config allows it.
fn effective_request(config: &AppConfig, request: &Request) -> Option<Request> {
    if !config.allow_methods_override || request.method != Method::POST {
        return None;
    }
    let value = request.header(METHOD_OVERRIDE_HEADER)?;
    match value.trim().to_ascii_uppercase().parse::<Method>() {
        Ok(method) => {
            debug!(method = %method, "Method override applied");
            let mut overridden = request.clone();
            overridden.method = method;
            Some(overridden)
        }
        Err(_) => {
            warn!(value = %value, "Ignoring invalid method override");
            None
        }
    }
}

fn prefix_matches(prefix: &str, path: &str, case_sensitive: bool) -> bool {
    let head = match path.get(..prefix.len()) {
        Some(head) => head,
        None => return false,
    };
    let same = if case_sensitive {
        head == prefix
    } else {
        head.eq_ignore_ascii_case(prefix)
    };
    same && (prefix.ends_with('/') || path.len() == prefix.len() || path[prefix.len()..].starts_with('/'))
}

/// Register every pending mount whose prefix covers the request path.
fn run_mounts(app: &mut Application, request: &Request) -> Result<(), DispatchError> {
    let case_sensitive = app.config.case_sensitive_urls;
    let pending: Vec<_> = app
        .mounts
        .iter_mut()
        .filter(|m| m.register.is_some() && prefix_matches(&m.prefix, &request.path, case_sensitive))
        .filter_map(|m| {
            debug!(prefix = %m.prefix, "Loading mount");
            m.register.take()
        })
        .collect();
    for register in pending {
        guard(|| register(&mut *app))?;
    }
    Ok(())
}

/// Dispatch `request` through `app` and return what was emitted.
pub(crate) fn run(app: &mut Application, request: &Request) -> Emitted {
    let request_id = RequestId::for_request(request);
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method,
        path = %request.path
    );
    let _enter = span.enter();

    app.requested_path = Some(request.path.clone());
    let overridden = effective_request(&app.config, request);
    let request = overridden.as_ref().unwrap_or(request);

    let mounted = run_mounts(app, request);

    let Application {
        config,
        routes,
        params,
        hooks,
        templates,
        cors,
        locals,
        ..
    } = app;
    let mut run = Run {
        request,
        request_id,
        config,
        routes,
        params,
        hooks,
        templates,
        cors: cors.as_ref(),
        locals,
        output: Output::new(),
        hooks_cleared: false,
        error_template_failed: false,
    };
    let emitted = run.execute(mounted);
    info!(
        status = emitted.status,
        bytes = emitted.body.len(),
        "Request complete"
    );
    emitted
}

/// Outcome of scanning the route list
enum Scan {
    Reply(Reply),
    NoMatch(Vec<Method>),
}

/// Disjoint borrows of the application for the duration of one request.
struct Run<'a> {
    request: &'a Request,
    request_id: RequestId,
    config: &'a AppConfig,
    routes: &'a [Route],
    params: &'a ParamRules,
    hooks: &'a Hooks,
    templates: &'a Templates,
    cors: Option<&'a Cors>,
    locals: &'a mut Map<String, Value>,
    output: Output,
    /// Set once an after hook fails; before-send and error hooks are
    /// skipped for the rest of this request.
    hooks_cleared: bool,
    /// Set once the configured error template fails to render.
    error_template_failed: bool,
}

impl<'a> Run<'a> {
    fn ctx(&mut self) -> Context<'_> {
        Context::new(
            self.request,
            self.request_id,
            self.config,
            self.templates,
            &self.hooks.render,
            &mut self.output,
            &mut *self.locals,
        )
    }

    fn execute(&mut self, mounted: Result<(), DispatchError>) -> Emitted {
        if let Err(err) = mounted.and_then(|()| self.dispatch()) {
            self.server_error(&err);
        }
        self.run_after_hooks();
        if self.request.method == Method::HEAD {
            self.output.discard_body();
        }
        std::mem::take(&mut self.output).into_emitted()
    }

    fn dispatch(&mut self) -> Result<(), DispatchError> {
        for hook in self.hooks.before.clone() {
            guard(|| hook(&mut self.ctx()))?;
        }

        let reply = if self.request.method == Method::OPTIONS && self.config.allow_options_requests
        {
            match self.options_methods()? {
                Some(methods) => return self.send_options(&methods),
                None => self.fallback(Vec::new())?,
            }
        } else {
            match self.scan_routes()? {
                Scan::Reply(reply) => Some(reply),
                Scan::NoMatch(allowed) => self.fallback(allowed)?,
            }
        };

        match reply {
            Some(reply) => self.send_reply(reply),
            None => Ok(()),
        }
    }

    /// Walk the routes in registration order.
    fn scan_routes(&mut self) -> Result<Scan, DispatchError> {
        let opts = self.config.match_options();
        let routes = self.routes;
        let mut allowed: Vec<Method> = Vec::new();

        for (index, route) in routes.iter().enumerate() {
            let Some(params) = match_pattern(route.pattern(), &self.request.path, self.params, opts)?
            else {
                continue;
            };
            if !route.accepts(&self.request.method) {
                debug!(
                    index,
                    pattern = %route.pattern(),
                    route_method = ?route.method(),
                    "Route matched path but not method"
                );
                allowed.extend(route.allowed_methods());
                continue;
            }

            match self.run_filters(route)? {
                FilterOutcome::Continue => {}
                FilterOutcome::Skip => {
                    debug!(index, pattern = %route.pattern(), "Route skipped by filter");
                    continue;
                }
                FilterOutcome::Respond(response) => {
                    debug!(index, pattern = %route.pattern(), "Filter produced the response");
                    return Ok(Scan::Reply(Reply::Response(response)));
                }
            }

            debug!(index, pattern = %route.pattern(), params = ?params, "Route matched");
            let controller = route.controller();
            let reply = guard(|| controller.handle(&mut self.ctx(), &params))?;
            return Ok(Scan::Reply(reply));
        }
        Ok(Scan::NoMatch(allowed))
    }

    fn run_filters(&mut self, route: &Route) -> Result<FilterOutcome, DispatchError> {
        for filter in route.filters() {
            match guard(|| filter.check(&mut self.ctx()))? {
                FilterOutcome::Continue => {}
                other => return Ok(other),
            }
        }
        Ok(FilterOutcome::Continue)
    }

    /// Methods answered for the OPTIONS target, `None` when no route matches.
    fn options_methods(&self) -> Result<Option<Vec<Method>>, DispatchError> {
        let probe = self.request.path == self.config.options_probe_path;
        let opts = self.config.match_options();
        let mut methods = Vec::new();
        for route in self.routes {
            if probe || match_pattern(route.pattern(), &self.request.path, self.params, opts)?.is_some() {
                methods.extend(route.allowed_methods());
            }
        }
        Ok(if methods.is_empty() { None } else { Some(methods) })
    }

    fn send_options(&mut self, methods: &[Method]) -> Result<(), DispatchError> {
        let allow = format_allow(methods, true);
        debug!(allow = %allow, "Answering OPTIONS request");
        self.output.set_status(200)?;
        self.output.set_header("Allow", &allow)?;
        if let Some(cors) = self.cors {
            let mut listed: Vec<Method> = methods.to_vec();
            listed.push(Method::OPTIONS);
            listed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            listed.dedup();
            cors.apply(self.request, &mut self.output, &listed, true)?;
        }
        self.output.commit();
        Ok(())
    }

    /// Not-found hooks, then the synthesized 404/405 page. `None` means a
    /// hook already started output.
    fn fallback(&mut self, allowed: Vec<Method>) -> Result<Option<Reply>, DispatchError> {
        for hook in self.hooks.not_found.clone() {
            if self.output.has_started() {
                break;
            }
            if let Some(reply) = guard(|| hook(&mut self.ctx()))? {
                debug!("Not-found hook produced the response");
                return Ok(Some(reply));
            }
        }
        if self.output.has_started() {
            return Ok(None);
        }

        let (status, info) = if allowed.is_empty() {
            (404, not_found_info(&self.request.path))
        } else {
            let allow = format_allow(&allowed, self.config.allow_options_requests);
            (405, method_not_allowed_info(&self.request.method, &allow))
        };
        debug!(status, "No route answered");

        let template = self
            .config
            .not_found_template
            .as_deref()
            .or(self.error_template());
        let page = render_error_page(self.templates, &*self.locals, &info, template);
        let mut response = Response::html(page.html).status(status);
        if status == 405 {
            let allow = format_allow(&allowed, self.config.allow_options_requests);
            response.set_header("Allow", &allow);
        }
        Ok(Some(Reply::Response(response)))
    }

    /// Normalize, run before-send hooks, apply CORS and emit.
    fn send_reply(&mut self, reply: Reply) -> Result<(), DispatchError> {
        let mut response = self.normalize(reply)?;

        let hooks: &'a Hooks = self.hooks;
        let before_send: &[_] = if self.hooks_cleared { &[] } else { &hooks.before_send };
        for hook in before_send {
            let current = response;
            response = guard(|| hook(current, &mut self.ctx()))?
                .ok_or(DispatchError::BeforeSendReturnedNothing)?;
        }

        if let Some(cors) = self.cors {
            if !self.output.has_started() {
                cors.apply(self.request, &mut self.output, &[], false)?;
            }
        }
        response.send(&mut self.output)
    }

    fn normalize(&self, reply: Reply) -> Result<Response, DispatchError> {
        let status = self.output.status();
        let content_type = self.output.header("Content-Type").map(str::to_string);
        Ok(match reply {
            Reply::Text(text) => Response::new()
                .status(status)
                .content_type(content_type.as_deref().unwrap_or(CONTENT_TYPE_HTML))
                .body(text),
            Reply::Json(value) => Response::new()
                .status(status)
                .content_type(content_type.as_deref().unwrap_or(CONTENT_TYPE_JSON))
                .body(serde_json::to_vec(&value).map_err(anyhow::Error::from)?),
            Reply::Response(response) => response,
        })
    }

    /// Run after-hooks exactly once. A failing hook stops the remaining
    /// after hooks, disables before-send and error hooks for this request
    /// and replaces the response with the 500 page.
    fn run_after_hooks(&mut self) {
        let hooks: &'a Hooks = self.hooks;
        let emitted = self.output.to_emitted();
        for hook in &hooks.after {
            if let Err(err) = guard(|| hook(&emitted, &mut self.ctx())) {
                error!(error = %err, kind = err.kind(), "After hook failed");
                self.hooks_cleared = true;
                self.server_error(&err);
                return;
            }
        }
    }

    fn error_template(&self) -> Option<&'a str> {
        let config: &'a AppConfig = self.config;
        if self.error_template_failed {
            None
        } else {
            config.error_template.as_deref()
        }
    }

    /// The 500 path: error hooks, then the error page with fallbacks.
    fn server_error(&mut self, err: &DispatchError) {
        error!(error = %err, kind = err.kind(), "Request failed");
        let info = server_error_info(err, self.config.show_detailed_errors);

        let hooks: &'a Hooks = self.hooks;
        let error_hooks: &[_] = if self.hooks_cleared { &[] } else { &hooks.error };
        for hook in error_hooks {
            let observed = catch_unwind(AssertUnwindSafe(|| hook(&info, &mut self.ctx())));
            if let Err(panic) = observed {
                warn!(panic = %panic_message(panic.as_ref()), "Error hook panicked");
            }
        }

        self.output.reset();
        if let Some(cors) = self.cors {
            if let Err(cors_err) = cors.apply(self.request, &mut self.output, &[], false) {
                warn!(error = %cors_err, "Could not apply CORS headers to error page");
            }
        }
        let template = self.error_template();
        let page = render_error_page(self.templates, &*self.locals, &info, template);
        if page.template_failed {
            self.error_template_failed = true;
        }
        if let Err(send_err) = Response::html(page.html).status(500).send(&mut self.output) {
            error!(error = %send_err, "Could not emit error page");
        }
    }
}
