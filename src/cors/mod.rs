//! # CORS Module
//!
//! Cross-origin resource sharing headers for application responses.
//!
//! A [`Cors`] policy is attached with
//! [`Application::cors`](crate::app::Application::cors). The dispatcher then
//! applies it in two places:
//!
//! - **Preflight**: the OPTIONS short-circuit response gets
//!   `Access-Control-Allow-Methods` (the configured methods, or the computed
//!   allow list for the path), `Access-Control-Allow-Headers` and
//!   `Access-Control-Max-Age`.
//! - **Actual requests**: every routed response gets
//!   `Access-Control-Allow-Origin`, `Vary: Origin`, credentials and exposed
//!   headers.
//!
//! Headers are only added when the request carries an `Origin` header that
//! passes the origin validation. Requests without an `Origin` are same-origin
//! or non-browser and are left untouched.
//!
//! ## Origin validation
//!
//! | Strategy   | Builder method                         |
//! |------------|----------------------------------------|
//! | Exact      | `allowed_origins(&["https://a.com"])`  |
//! | Wildcard   | `allowed_origins(&["*"])`              |
//! | Regex      | `origin_patterns(&[r"^https://.*"])`   |
//! | Custom     | `origin_validator(\|o\| ...)`          |
//!
//! Credentials cannot be combined with the wildcard; the builder rejects it.

mod builder;
mod error;

pub use builder::CorsBuilder;
pub use error::CorsConfigError;

use std::fmt;
use std::sync::Arc;

use http::Method;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::server::{Output, Request};

/// How an `Origin` header is checked
#[derive(Clone)]
pub enum OriginValidation {
    Exact(Vec<String>),
    Wildcard,
    Regex(Vec<Regex>),
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginValidation::Exact(origins) => f.debug_tuple("Exact").field(origins).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Regex(patterns) => f
                .debug_tuple("Regex")
                .field(&patterns.iter().map(Regex::as_str).collect::<Vec<_>>())
                .finish(),
            OriginValidation::Custom(_) => write!(f, "Custom(<function>)"),
        }
    }
}

impl OriginValidation {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(origins) => origins.iter().any(|o| o == origin),
            OriginValidation::Wildcard => true,
            OriginValidation::Regex(patterns) => patterns.iter().any(|re| re.is_match(origin)),
            OriginValidation::Custom(validator) => validator(origin),
        }
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, OriginValidation::Wildcard)
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            OriginValidation::Exact(origins) => origins.is_empty(),
            OriginValidation::Regex(patterns) => patterns.is_empty(),
            OriginValidation::Wildcard | OriginValidation::Custom(_) => false,
        }
    }
}

/// Cross-origin policy applied by the dispatcher.
#[derive(Debug, Clone)]
pub struct Cors {
    pub(crate) origin_validation: OriginValidation,
    pub(crate) allowed_headers: Vec<String>,
    pub(crate) allowed_methods: Option<Vec<Method>>,
    pub(crate) allow_credentials: bool,
    pub(crate) expose_headers: Vec<String>,
    pub(crate) max_age: Option<u32>,
}

impl Default for Cors {
    /// Allows no origins until configured
    fn default() -> Self {
        Self {
            origin_validation: OriginValidation::Exact(vec![]),
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: None,
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }
}

impl Cors {
    /// Any origin, no credentials. Intended for development.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            origin_validation: OriginValidation::Wildcard,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    #[must_use]
    pub fn allows_credentials(&self) -> bool {
        self.allow_credentials
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` when `origin` is refused
    #[must_use]
    pub fn allowed_origin(&self, origin: &str) -> Option<String> {
        if !self.origin_validation.is_allowed(origin) {
            return None;
        }
        if self.origin_validation.is_wildcard() {
            Some("*".to_string())
        } else {
            Some(origin.to_string())
        }
    }

    /// Add CORS headers for `request` to the pending output headers.
    ///
    /// `allow` is the computed allow list for the path and is advertised on
    /// preflight when no explicit method list was configured. Returns whether
    /// any header was added.
    ///
    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] when output has started.
    pub fn apply(
        &self,
        request: &Request,
        out: &mut Output,
        allow: &[Method],
        preflight: bool,
    ) -> Result<bool, DispatchError> {
        let Some(origin) = request.header("Origin") else {
            return Ok(false);
        };
        let Some(allowed) = self.allowed_origin(origin) else {
            warn!(origin = %origin, path = %request.path, "CORS origin not allowed");
            return Ok(false);
        };

        let methods: Vec<Method> = match &self.allowed_methods {
            Some(m) => m.clone(),
            None => allow.to_vec(),
        };
        if preflight && !self.preflight_allowed(request, &methods) {
            return Ok(false);
        }

        out.set_header("Access-Control-Allow-Origin", &allowed)?;
        out.set_header("Vary", "Origin")?;
        if self.allow_credentials {
            out.set_header("Access-Control-Allow-Credentials", "true")?;
        }
        if preflight {
            let list = methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            out.set_header("Access-Control-Allow-Methods", &list)?;
            out.set_header("Access-Control-Allow-Headers", &self.allowed_headers.join(", "))?;
            if let Some(age) = self.max_age {
                out.set_header("Access-Control-Max-Age", &age.to_string())?;
            }
        } else if !self.expose_headers.is_empty() {
            out.set_header("Access-Control-Expose-Headers", &self.expose_headers.join(", "))?;
        }
        debug!(origin = %origin, preflight, "CORS headers applied");
        Ok(true)
    }

    /// Check `Access-Control-Request-Method` and `-Headers` of a preflight
    fn preflight_allowed(&self, request: &Request, methods: &[Method]) -> bool {
        if let Some(requested) = request.header("Access-Control-Request-Method") {
            match requested.parse::<Method>() {
                Ok(m) if methods.contains(&m) => {}
                _ => {
                    warn!(method = %requested, "CORS preflight method not allowed");
                    return false;
                }
            }
        }
        if let Some(requested) = request.header("Access-Control-Request-Headers") {
            if self.allowed_headers.iter().any(|h| h == "*") {
                return true;
            }
            for header in requested.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                if !self
                    .allowed_headers
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(header))
                {
                    warn!(header = %header, "CORS preflight header not allowed");
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross_origin(origin: &str) -> Request {
        Request::get("/api").with_header("Origin", origin)
    }

    #[test]
    fn test_wildcard_with_credentials_is_rejected() {
        let err = CorsBuilder::new()
            .allowed_origins(&["*"])
            .allow_credentials(true)
            .build()
            .unwrap_err();
        assert_eq!(err, CorsConfigError::WildcardWithCredentials);
    }

    #[test]
    fn test_empty_origins_with_credentials_is_rejected() {
        let err = CorsBuilder::new().allow_credentials(true).build().unwrap_err();
        assert_eq!(err, CorsConfigError::EmptyOriginsWithCredentials);
    }

    #[test]
    fn test_invalid_origin_format() {
        let err = CorsBuilder::new()
            .allowed_origins(&["example.com"])
            .build()
            .unwrap_err();
        assert!(matches!(err, CorsConfigError::InvalidOriginFormat { .. }));
        assert!(CorsBuilder::new()
            .allowed_origins(&["https://example.com/"])
            .build()
            .is_err());
        assert!(CorsBuilder::new()
            .allowed_origins(&["http://localhost:8080"])
            .build()
            .is_ok());
    }

    #[test]
    fn test_regex_and_custom_origins() {
        let cors = CorsBuilder::new()
            .origin_patterns(&[r"^https://.*\.example\.com$"])
            .build()
            .unwrap();
        assert_eq!(
            cors.allowed_origin("https://api.example.com").as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(cors.allowed_origin("https://evil.com"), None);

        let cors = CorsBuilder::new()
            .origin_validator(|o| o.ends_with(".test"))
            .allow_credentials(true)
            .build()
            .unwrap();
        assert!(cors.allowed_origin("http://a.test").is_some());
    }

    #[test]
    fn test_apply_actual_request() {
        let cors = CorsBuilder::new()
            .allowed_origins(&["https://a.com"])
            .allow_credentials(true)
            .expose_headers(&["X-Total-Count"])
            .build()
            .unwrap();
        let mut out = Output::new();
        assert!(cors.apply(&cross_origin("https://a.com"), &mut out, &[], false).unwrap());
        assert_eq!(out.header("access-control-allow-origin"), Some("https://a.com"));
        assert_eq!(out.header("Access-Control-Allow-Credentials"), Some("true"));
        assert_eq!(out.header("Access-Control-Expose-Headers"), Some("X-Total-Count"));
        assert_eq!(out.header("Vary"), Some("Origin"));
        assert_eq!(out.header("Access-Control-Allow-Methods"), None);
    }

    #[test]
    fn test_apply_skips_unknown_or_missing_origin() {
        let cors = CorsBuilder::new()
            .allowed_origins(&["https://a.com"])
            .build()
            .unwrap();
        let mut out = Output::new();
        assert!(!cors.apply(&cross_origin("https://b.com"), &mut out, &[], false).unwrap());
        assert!(!cors.apply(&Request::get("/api"), &mut out, &[], false).unwrap());
        assert_eq!(out.header("Access-Control-Allow-Origin"), None);
    }

    #[test]
    fn test_preflight_uses_computed_allow_list() {
        let cors = Cors::permissive();
        let req = cross_origin("https://a.com")
            .with_header("Access-Control-Request-Method", "POST")
            .with_header("Access-Control-Request-Headers", "content-type");
        let mut out = Output::new();
        let allow = [Method::GET, Method::HEAD, Method::POST];
        assert!(cors.apply(&req, &mut out, &allow, true).unwrap());
        assert_eq!(out.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(out.header("Access-Control-Allow-Methods"), Some("GET, HEAD, POST"));
        assert_eq!(
            out.header("Access-Control-Allow-Headers"),
            Some("Content-Type, Authorization")
        );
    }

    #[test]
    fn test_preflight_rejects_unlisted_method_and_header() {
        let cors = CorsBuilder::new()
            .allowed_origins(&["https://a.com"])
            .allowed_methods(&[Method::GET])
            .max_age(600)
            .build()
            .unwrap();
        let mut out = Output::new();
        let req = cross_origin("https://a.com").with_header("Access-Control-Request-Method", "DELETE");
        assert!(!cors.apply(&req, &mut out, &[], true).unwrap());

        let req = cross_origin("https://a.com").with_header("Access-Control-Request-Headers", "X-Secret");
        assert!(!cors.apply(&req, &mut out, &[], true).unwrap());

        let req = cross_origin("https://a.com").with_header("Access-Control-Request-Method", "GET");
        assert!(cors.apply(&req, &mut out, &[], true).unwrap());
        assert_eq!(out.header("Access-Control-Max-Age"), Some("600"));
    }
}
