//! # Dispatcher Module
//!
//! The dispatch sequencer drives one request through the application
//! lifecycle and always ends with an emitted response.
//!
//! ## Request Flow
//!
//! 1. Method override (`X-HTTP-Method-Override` on POST, when enabled)
//! 2. Pending mounts whose prefix covers the path are registered
//! 3. Before hooks
//! 4. OPTIONS short-circuit: `Allow` header (plus CORS preflight headers)
//!    built from every route matching the path, or from all routes for the
//!    probe path `*`
//! 5. Route scan in registration order: pattern, then method, then filters,
//!    then the controller. A route whose pattern matches but whose method
//!    does not contributes to the allowed-method list and scanning continues.
//! 6. Not-found hooks, then a 404 (nothing matched) or 405 (path matched
//!    with other methods) page
//! 7. Reply normalization, before-send hooks, CORS headers, emission
//! 8. After hooks, exactly once
//!
//! ## Error Handling
//!
//! Every hook, filter and controller call goes through one boundary that
//! converts returned errors and panics into a
//! [`DispatchError`](crate::error::DispatchError). Any error aborts the
//! sequence and takes the 500 path: error hooks run, buffered output is
//! discarded, CORS headers are applied again and the error page is
//! rendered. A broken error template is skipped for the rest of the request
//! and the built-in page is used; if even that fails a fixed HTML string is
//! sent.
//!
//! If an after hook fails, the remaining after hooks are dropped and the
//! response is replaced by the 500 page without running before-send or
//! error hooks. The application's hook lists are untouched, so the next
//! request runs them all again.

mod core;
pub(crate) mod errors;

pub(crate) use core::run;
pub use core::METHOD_OVERRIDE_HEADER;
