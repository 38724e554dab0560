//! # Site Manifest
//!
//! A YAML document that describes a site without writing Rust: application
//! config, template locals, parameter rules and routes with static replies.
//!
//! ```yaml
//! config:
//!   case_sensitive_urls: false
//!   template_dir: views
//! locals:
//!   site: Demo
//! params:
//!   - name: ":id"
//!     validation: int
//!     converter: int
//! routes:
//!   - pattern: /hello/:name
//!     method: GET
//!     reply:
//!       text: "Hello {{ params[0] }}"
//!   - pattern: /api/status
//!     reply:
//!       json: { ok: true }
//!   - pattern: /about
//!     reply:
//!       template: about.html
//!   - pattern: /old-page
//!     reply:
//!       redirect: /about
//!       status: 301
//! ```
//!
//! Each reply sets exactly one of `text`, `json`, `template` or `redirect`.
//! Text and template replies are rendered with `params` (the positional route
//! parameters), `request` (`method`, `path`) and the locals in scope. A route
//! without `method` answers any method. A relative `template_dir` is resolved
//! against the manifest's directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::app::Application;
use crate::handlers::{Context, Handler, Reply};
use crate::router::ParamValue;
use crate::runtime_config::AppConfig;
use crate::server::Response;
use crate::templates::Templates;

/// Parsed site manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub config: AppConfig,
    #[serde(default)]
    pub locals: Map<String, Value>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

/// Parameter rule entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    pub name: String,
    /// `int`, `float`, `bool`, `any` or a regular expression
    #[serde(default = "default_validation")]
    pub validation: String,
    /// `int`, `float` or `bool`
    #[serde(default)]
    pub converter: Option<String>,
}

fn default_validation() -> String {
    "any".to_string()
}

/// Route entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteSpec {
    pub pattern: String,
    /// Omitted for routes answering any method
    #[serde(default)]
    pub method: Option<String>,
    pub reply: ReplySpec,
}

/// Static reply; exactly one of the body fields must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplySpec {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub redirect: Option<String>,
    /// Response status; for redirects one of 301/302/303/307/308 (default 302)
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from YAML text.
    ///
    /// # Errors
    ///
    /// Returns the YAML error.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid site manifest")
    }

    /// Load a manifest file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let mut manifest =
            Self::parse(&content).with_context(|| format!("in manifest {}", path.display()))?;
        if let (Some(dir), Some(base)) = (manifest.config.template_dir.as_ref(), path.parent()) {
            if dir.is_relative() {
                manifest.config.template_dir = Some(base.join(dir));
            }
        }
        debug!(
            path = %path.display(),
            routes = manifest.routes.len(),
            params = manifest.params.len(),
            "Manifest loaded"
        );
        Ok(manifest)
    }

    /// Environment overrides (`FASTSITE_*`) on top of the manifest config
    pub fn apply_env(&mut self) {
        self.config.apply_env();
    }

    /// Build an application from the manifest.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameter rules, unknown methods, replies that do not
    /// set exactly one body field, and invalid redirect statuses.
    pub fn build(&self) -> Result<Application> {
        let mut app = Application::with_config(self.config.clone());
        app.locals = self.locals.clone();

        for param in &self.params {
            app.param_keywords(&param.name, &param.validation, param.converter.as_deref())
                .with_context(|| format!("invalid rule for parameter '{}'", param.name))?;
        }

        for (index, route) in self.routes.iter().enumerate() {
            let method = parse_method(route.method.as_deref())
                .with_context(|| format!("route #{index} ({})", route.pattern))?;
            let handler = StaticReply::from_spec(&route.reply)
                .with_context(|| format!("route #{index} ({})", route.pattern))?;
            app.add_route(&route.pattern, method, Arc::new(handler));
        }
        Ok(app)
    }
}

fn parse_method(method: Option<&str>) -> Result<Option<Method>> {
    match method.map(str::trim) {
        None | Some("*") => Ok(None),
        Some(m) if m.eq_ignore_ascii_case("any") => Ok(None),
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map(Some)
            .map_err(|_| anyhow!("unknown method '{m}'")),
    }
}

/// Body of a [`StaticReply`]
#[derive(Debug, Clone, PartialEq)]
enum StaticBody {
    Text(String),
    Json(Value),
    Template(String),
    Redirect(Response),
}

/// Controller serving a reply declared in a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticReply {
    body: StaticBody,
    status: Option<u16>,
    headers: Vec<(String, String)>,
}

impl StaticReply {
    /// Validate a reply entry.
    ///
    /// # Errors
    ///
    /// Fails unless exactly one body field is set, or when a redirect status
    /// is not a redirect code.
    pub fn from_spec(spec: &ReplySpec) -> Result<Self> {
        let set = [
            spec.text.is_some(),
            spec.json.is_some(),
            spec.template.is_some(),
            spec.redirect.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count();
        if set != 1 {
            bail!("a reply must set exactly one of text, json, template or redirect (found {set})");
        }

        let body = if let Some(text) = &spec.text {
            StaticBody::Text(text.clone())
        } else if let Some(value) = &spec.json {
            StaticBody::Json(value.clone())
        } else if let Some(file) = &spec.template {
            StaticBody::Template(file.clone())
        } else if let Some(url) = &spec.redirect {
            StaticBody::Redirect(Response::redirect(url, spec.status.unwrap_or(302))?)
        } else {
            bail!("reply has no body");
        };

        Ok(Self {
            body,
            status: spec.status,
            headers: spec
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

impl Handler for StaticReply {
    fn handle(&self, ctx: &mut Context<'_>, params: &[ParamValue]) -> Result<Reply> {
        let data = json!({
            "params": params,
            "request": {
                "method": ctx.request().method.as_str(),
                "path": ctx.requested_path(),
            },
        });

        if let StaticBody::Redirect(response) = &self.body {
            let mut response = response.clone();
            for (name, value) in &self.headers {
                response.set_header(name, value);
            }
            return Ok(Reply::Response(response));
        }

        if let Some(status) = self.status {
            ctx.status(status)?;
        }
        for (name, value) in &self.headers {
            ctx.header(name, value)?;
        }

        Ok(match &self.body {
            StaticBody::Text(source) => {
                Reply::Text(Templates::render_str("reply.html", source, &*ctx.locals, &data)?)
            }
            StaticBody::Json(value) => Reply::Json(value.clone()),
            StaticBody::Template(file) => Reply::Text(ctx.render(&[file.as_str()], &data)?),
            StaticBody::Redirect(response) => Reply::Response(response.clone()),
        })
    }
}
