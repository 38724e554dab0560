use thiserror::Error;

/// Cross-origin configuration error.
///
/// Returned by [`CorsBuilder::build`](super::CorsBuilder::build) when the
/// configuration violates the CORS rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorsConfigError {
    /// Wildcard origin (`*`) cannot be combined with credentials
    #[error("CORS configuration error: cannot use wildcard origin (*) with credentials; list exact origins instead")]
    WildcardWithCredentials,

    /// Origin is not of the form `scheme://host[:port]`
    #[error("CORS configuration error: invalid origin format '{origin}', expected scheme://host[:port] (e.g. https://example.com)")]
    InvalidOriginFormat { origin: String },

    /// Origin pattern is not a valid regular expression
    #[error("CORS configuration error: invalid origin pattern '{pattern}'")]
    InvalidOriginPattern { pattern: String },

    /// Credentials enabled while no origin is allowed
    #[error("CORS configuration error: cannot use credentials with an empty origins list")]
    EmptyOriginsWithCredentials,
}
