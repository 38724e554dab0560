use std::sync::Arc;

use http::Method;
use regex::Regex;
use url::Url;

use super::{Cors, CorsConfigError, OriginValidation};

/// Fluent builder for [`Cors`].
///
/// ```rust
/// use fastsite::cors::CorsBuilder;
/// use http::Method;
///
/// let cors = CorsBuilder::new()
///     .allowed_origins(&["https://example.com", "https://api.example.com"])
///     .allowed_methods(&[Method::GET, Method::POST])
///     .allowed_headers(&["Content-Type", "Authorization", "X-Custom-Header"])
///     .allow_credentials(true)
///     .expose_headers(&["X-Total-Count"])
///     .max_age(3600)
///     .build()
///     .unwrap();
/// assert!(cors.allows_credentials());
/// ```
pub struct CorsBuilder {
    origins: Vec<String>,
    origin_patterns: Vec<String>,
    origin_validator: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
    allowed_headers: Vec<String>,
    allowed_methods: Option<Vec<Method>>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

impl CorsBuilder {
    /// Secure defaults: no origins, `Content-Type` and `Authorization`
    /// headers, methods taken from the route's allow list, no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origins: vec![],
            origin_patterns: vec![],
            origin_validator: None,
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: None,
            allow_credentials: false,
            expose_headers: vec![],
            max_age: None,
        }
    }

    /// Exact origins; `"*"` allows every origin
    #[must_use]
    pub fn allowed_origins(mut self, origins: &[&str]) -> Self {
        self.origins = origins.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Regular expressions an origin must match, e.g. `^https://.*\.example\.com$`
    #[must_use]
    pub fn origin_patterns(mut self, patterns: &[&str]) -> Self {
        self.origin_patterns = patterns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Decide origins with a predicate; takes precedence over lists and patterns
    #[must_use]
    pub fn origin_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.origin_validator = Some(Arc::new(validator));
        self
    }

    /// Methods advertised on preflight; when unset the route's allow list is used
    #[must_use]
    pub fn allowed_methods(mut self, methods: &[Method]) -> Self {
        self.allowed_methods = Some(methods.to_vec());
        self
    }

    /// Request headers accepted on preflight; `"*"` accepts any
    #[must_use]
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Response headers readable from browser scripts
    #[must_use]
    pub fn expose_headers(mut self, headers: &[&str]) -> Self {
        self.expose_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Preflight cache duration in seconds
    #[must_use]
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// - [`CorsConfigError::WildcardWithCredentials`] for `*` with credentials
    /// - [`CorsConfigError::EmptyOriginsWithCredentials`] for credentials with
    ///   no origin source
    /// - [`CorsConfigError::InvalidOriginFormat`] for a malformed exact origin
    /// - [`CorsConfigError::InvalidOriginPattern`] for a bad regex
    pub fn build(self) -> Result<Cors, CorsConfigError> {
        let wildcard = self.origins.iter().any(|o| o == "*");
        if self.allow_credentials && wildcard {
            return Err(CorsConfigError::WildcardWithCredentials);
        }

        let origin_validation = if let Some(validator) = self.origin_validator {
            OriginValidation::Custom(validator)
        } else if wildcard {
            OriginValidation::Wildcard
        } else if !self.origin_patterns.is_empty() {
            let patterns = self
                .origin_patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|_| CorsConfigError::InvalidOriginPattern {
                        pattern: p.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            OriginValidation::Regex(patterns)
        } else {
            for origin in &self.origins {
                validate_origin_format(origin)?;
            }
            OriginValidation::Exact(self.origins)
        };

        if self.allow_credentials && origin_validation.is_empty() {
            return Err(CorsConfigError::EmptyOriginsWithCredentials);
        }

        Ok(Cors {
            origin_validation,
            allowed_headers: self.allowed_headers,
            allowed_methods: self.allowed_methods,
            allow_credentials: self.allow_credentials,
            expose_headers: self.expose_headers,
            max_age: self.max_age,
        })
    }
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_origin_format(origin: &str) -> Result<(), CorsConfigError> {
    let invalid = || CorsConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };
    let url = Url::parse(origin).map_err(|_| invalid())?;
    let bare = url.path() == "/" && url.query().is_none() && url.fragment().is_none();
    if !matches!(url.scheme(), "http" | "https")
        || url.host_str().is_none()
        || !bare
        || origin.ends_with('/')
    {
        return Err(invalid());
    }
    Ok(())
}
