//! Error types shared by the router, the dispatcher and the template layer.
//!
//! Two families matter at runtime:
//!
//! - [`ConfigError`] describes a malformed application definition: a bad route
//!   pattern, a duplicate parameter rule, an unknown validator keyword. These
//!   are raised at registration time or on the first match attempt and are
//!   always fatal for the request.
//! - [`DispatchError`] is the error channel of the dispatch sequencer. Every
//!   hook, filter and controller boundary converts its outcome into a
//!   `Result<_, DispatchError>` and the sequencer funnels any `Err` into the
//!   500 error page path.
//!
//! A parameter value that fails its validation rule is *not* an error; it is
//! an ordinary no-match and routing continues with the next route.

use thiserror::Error;

/// Malformed route, parameter or application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Route pattern was empty
    #[error("route pattern must not be empty")]
    EmptyPattern,

    /// Request path was empty
    #[error("requested path must not be empty")]
    EmptyPath,

    /// A required segment follows an optional one
    #[error("invalid route pattern '{pattern}': required segment '{segment}' follows an optional segment")]
    RequiredAfterOptional { pattern: String, segment: String },

    /// `*` used anywhere other than as the final segment
    #[error("invalid route pattern '{pattern}': a wildcard '*' is only allowed as the final segment")]
    MisplacedWildcard { pattern: String },

    /// Parameter names must start with `:`
    #[error("invalid parameter name '{name}': parameter names must start with ':'")]
    InvalidParamName { name: String },

    /// `param()` called twice for the same name
    #[error("parameter '{name}' has already been defined")]
    DuplicateParam { name: String },

    /// Validation keyword that is neither a built-in nor a usable regex
    #[error("invalid validation '{value}' for parameter '{name}'")]
    InvalidValidation { name: String, value: String },

    /// Converter keyword that is not one of `int`, `float`, `bool`
    #[error("invalid converter '{value}' for parameter '{name}': expected one of int, float, bool")]
    InvalidConverter { name: String, value: String },

    /// Redirect with a status outside 301/302/303/307/308
    #[error("invalid redirect status {status}: expected one of 301, 302, 303, 307, 308")]
    InvalidRedirectStatus { status: u16 },

    /// Mount prefix must start with `/`
    #[error("invalid mount prefix '{prefix}': prefixes must start with '/'")]
    InvalidMountPrefix { prefix: String },

    /// Cross-origin configuration that violates the CORS rules
    #[error(transparent)]
    Cors(#[from] crate::cors::CorsConfigError),
}

/// Template lookup or rendering failure.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Rendering was requested without a template directory
    #[error("no template directory has been configured")]
    NoTemplateDir,

    /// Template path escapes the template directory
    #[error("invalid template path '{0}'")]
    InvalidPath(String),

    /// Template file could not be read
    #[error("template '{file}' could not be read: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    /// Template failed to compile or render
    #[error("template '{file}' failed to render: {source}")]
    Render {
        file: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Fault raised while sequencing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Route or parameter definition error found while matching
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A hook, filter or controller returned an error
    #[error(transparent)]
    Handler(anyhow::Error),

    /// A hook, filter or controller panicked
    #[error("handler panicked: {0}")]
    Panic(String),

    /// A before-send hook returned no response
    #[error("a before-send hook returned no response; before-send hooks must return the response to send")]
    BeforeSendReturnedNothing,

    /// Status or headers were changed after body output started
    #[error("headers cannot be modified after output has started")]
    HeadersAlreadySent,

    /// Template error while rendering on behalf of a controller
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl DispatchError {
    /// Short type label shown on detailed error pages and in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::Config(_) => "ConfigError",
            DispatchError::Handler(_) => "HandlerError",
            DispatchError::Panic(_) => "Panic",
            DispatchError::BeforeSendReturnedNothing => "ContractViolation",
            DispatchError::HeadersAlreadySent => "HeadersAlreadySent",
            DispatchError::Template(_) => "TemplateError",
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that travelled through a user callback as anyhow.
        match err.downcast::<DispatchError>() {
            Ok(inner) => inner,
            Err(err) => match err.downcast::<ConfigError>() {
                Ok(cfg) => DispatchError::Config(cfg),
                Err(err) => DispatchError::Handler(err),
            },
        }
    }
}
