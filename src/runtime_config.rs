//! # Runtime Configuration Module
//!
//! Switches that change how the application matches URLs, answers OPTIONS
//! requests and renders error pages.
//!
//! ## Sources
//!
//! Configuration starts from [`AppConfig::default()`] and can be loaded from:
//!
//! - a YAML (`.yaml`/`.yml`) or TOML (`.toml`) file via [`AppConfig::from_file`],
//! - environment variables via [`AppConfig::from_env`] / [`AppConfig::apply_env`].
//!
//! ## Environment Variables
//!
//! | Variable                           | Field                    |
//! |------------------------------------|--------------------------|
//! | `FASTSITE_CASE_SENSITIVE_URLS`     | `case_sensitive_urls`    |
//! | `FASTSITE_STRICT_URL_MODE`         | `strict_url_mode`        |
//! | `FASTSITE_ALLOW_OPTIONS_REQUESTS`  | `allow_options_requests` |
//! | `FASTSITE_ALLOW_METHODS_OVERRIDE`  | `allow_methods_override` |
//! | `FASTSITE_SHOW_DETAILED_ERRORS`    | `show_detailed_errors`   |
//! | `FASTSITE_TEMPLATE_DIR`            | `template_dir`           |
//! | `FASTSITE_ERROR_TEMPLATE`          | `error_template`         |
//! | `FASTSITE_NOT_FOUND_TEMPLATE`      | `not_found_template`     |
//!
//! Boolean variables accept `1/true/on/yes` and `0/false/off/no`; anything
//! else leaves the field unchanged.
//!
//! ## Example
//!
//! ```yaml
//! case_sensitive_urls: false
//! show_detailed_errors: true
//! template_dir: ./views
//! header_templates: [header.html]
//! footer_templates: [footer.html]
//! error_template: error.html
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::router::MatchOptions;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Compare literal URL segments case-sensitively
    pub case_sensitive_urls: bool,
    /// Treat `/about/` and `/about` as different URLs
    pub strict_url_mode: bool,
    /// Answer OPTIONS requests with an `Allow` header instead of routing them
    pub allow_options_requests: bool,
    /// Honor `X-HTTP-Method-Override` on POST requests
    pub allow_methods_override: bool,
    /// Include error type and chain on 500 pages
    pub show_detailed_errors: bool,
    /// Directory template files are resolved against
    pub template_dir: Option<PathBuf>,
    /// Rendered before every template render
    pub header_templates: Vec<String>,
    /// Rendered after every template render
    pub footer_templates: Vec<String>,
    /// Template for 500 pages (and 404/405 when no not-found template is set)
    pub error_template: Option<String>,
    /// Template for 404/405 pages
    pub not_found_template: Option<String>,
    /// OPTIONS target that reports methods across every route
    pub options_probe_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            case_sensitive_urls: true,
            strict_url_mode: false,
            allow_options_requests: true,
            allow_methods_override: false,
            show_detailed_errors: false,
            template_dir: None,
            header_templates: Vec::new(),
            footer_templates: Vec::new(),
            error_template: None,
            not_found_template: None,
            options_probe_path: "*".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with `FASTSITE_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a YAML or TOML file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, has an unknown extension or does
    /// not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML config {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("invalid TOML config {}", path.display()))?,
            other => bail!(
                "unsupported config format {:?} for {}: expected .yaml, .yml or .toml",
                other.unwrap_or(""),
                path.display()
            ),
        };
        debug!(path = %path.display(), config = ?config, "Loaded application config");
        Ok(config)
    }

    /// Overlay `FASTSITE_*` environment variables on this config
    pub fn apply_env(&mut self) {
        apply_bool("FASTSITE_CASE_SENSITIVE_URLS", &mut self.case_sensitive_urls);
        apply_bool("FASTSITE_STRICT_URL_MODE", &mut self.strict_url_mode);
        apply_bool(
            "FASTSITE_ALLOW_OPTIONS_REQUESTS",
            &mut self.allow_options_requests,
        );
        apply_bool(
            "FASTSITE_ALLOW_METHODS_OVERRIDE",
            &mut self.allow_methods_override,
        );
        apply_bool("FASTSITE_SHOW_DETAILED_ERRORS", &mut self.show_detailed_errors);
        if let Ok(dir) = env::var("FASTSITE_TEMPLATE_DIR") {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Ok(file) = env::var("FASTSITE_ERROR_TEMPLATE") {
            self.error_template = Some(file);
        }
        if let Ok(file) = env::var("FASTSITE_NOT_FOUND_TEMPLATE") {
            self.not_found_template = Some(file);
        }
    }

    /// URL comparison switches for the matcher
    #[must_use]
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive_urls,
            strict: self.strict_url_mode,
        }
    }
}

fn apply_bool(var: &str, field: &mut bool) {
    if let Ok(val) = env::var(var) {
        match parse_bool(&val) {
            Some(b) => *field = b,
            None => warn!(var = %var, value = %val, "Ignoring invalid boolean environment value"),
        }
    }
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
