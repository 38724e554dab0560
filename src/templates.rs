//! Template rendering with `minijinja`.
//!
//! Files are loaded from the configured template directory, rendered in order
//! (header templates, requested files, footer templates) and concatenated.
//! Application locals form the base context; per-call data is layered on top.
//! Files ending in `.html`/`.htm` are auto-escaped.

use std::fs;
use std::path::{Component, Path, PathBuf};

use minijinja::Environment;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TemplateError;

/// Minimal page used when no error template is configured or the configured
/// one fails.
pub const BUILTIN_ERROR_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{ title }}</title>
    <style>
        body { font-family: sans-serif; margin: 2em; color: #222; }
        h1 { color: #b00020; }
        pre { background: #f4f4f4; padding: 1em; overflow: auto; }
    </style>
</head>
<body>
    <h1>{{ title }}</h1>
    <p>{{ message }}</p>
    {% if kind %}<p><strong>{{ kind }}</strong></p>{% endif %}
    {% if detail %}<pre>{{ detail }}</pre>{% endif %}
</body>
</html>
"#;

/// Unstyled page emitted when every template has failed
pub const LAST_RESORT_ERROR_PAGE: &str =
    "<h1>An error has occurred</h1><p>An error has occurred and the error page could not be displayed.</p>";

/// HTML-escape `&`, `<`, `>`, `"` and `'`
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// File-based template renderer.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    base_dir: Option<PathBuf>,
    header: Vec<String>,
    footer: Vec<String>,
}

impl Templates {
    #[must_use]
    pub fn new(base_dir: Option<PathBuf>, header: Vec<String>, footer: Vec<String>) -> Self {
        Self {
            base_dir,
            header,
            footer,
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn map_path(&self, file: &str) -> Result<PathBuf, TemplateError> {
        let mut pb = self.base_dir.clone().ok_or(TemplateError::NoTemplateDir)?;
        for comp in Path::new(file.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return Err(TemplateError::InvalidPath(file.to_string())),
            }
        }
        Ok(pb)
    }

    /// Render `files` surrounded by the header and footer templates.
    ///
    /// # Errors
    ///
    /// Fails when no template directory is set, a path escapes it, a file
    /// cannot be read, or a template fails to render.
    pub fn render(
        &self,
        files: &[&str],
        locals: &Map<String, Value>,
        data: &Value,
    ) -> Result<String, TemplateError> {
        let names: Vec<&str> = self
            .header
            .iter()
            .map(String::as_str)
            .chain(files.iter().copied())
            .chain(self.footer.iter().map(String::as_str))
            .collect();

        let mut sources = Vec::with_capacity(names.len());
        for name in &names {
            let path = self.map_path(name)?;
            let source = fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                file: (*name).to_string(),
                source,
            })?;
            sources.push(source);
        }

        let ctx = merge_context(locals, data);
        let mut env = Environment::new();
        let mut html = String::new();
        for (name, source) in names.iter().zip(sources.iter()) {
            env.add_template(name, source)
                .map_err(|source| TemplateError::Render {
                    file: (*name).to_string(),
                    source,
                })?;
            let tmpl = env.get_template(name).map_err(|source| TemplateError::Render {
                file: (*name).to_string(),
                source,
            })?;
            let rendered = tmpl.render(&ctx).map_err(|source| TemplateError::Render {
                file: (*name).to_string(),
                source,
            })?;
            html.push_str(&rendered);
        }
        debug!(templates = ?names, bytes = html.len(), "Templates rendered");
        Ok(html)
    }

    /// Render a template given as a string (used for inline replies and the
    /// built-in error page).
    ///
    /// # Errors
    ///
    /// Fails when the template does not compile or render.
    pub fn render_str(
        name: &str,
        source: &str,
        locals: &Map<String, Value>,
        data: &Value,
    ) -> Result<String, TemplateError> {
        let ctx = merge_context(locals, data);
        let mut env = Environment::new();
        env.add_template(name, source)
            .and_then(|()| env.get_template(name)?.render(&ctx))
            .map_err(|source| TemplateError::Render {
                file: name.to_string(),
                source,
            })
    }
}

/// Locals first, then `data` on top; non-object data is exposed as `data`.
fn merge_context(locals: &Map<String, Value>, data: &Value) -> Value {
    let mut ctx = locals.clone();
    match data {
        Value::Object(map) => {
            for (k, v) in map {
                ctx.insert(k.clone(), v.clone());
            }
        }
        Value::Null => {}
        other => {
            ctx.insert("data".to_string(), other.clone());
        }
    }
    Value::Object(ctx)
}
