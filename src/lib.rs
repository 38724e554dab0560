//! # fastsite
//!
//! **fastsite** is a small web application core: pattern-based URL routing
//! with typed parameters, a request lifecycle with hooks and filters, template
//! rendering and response construction. It does not open sockets; a host
//! adapter hands over a [`Request`] and writes back the [`Emitted`] response.
//!
//! ## Architecture
//!
//! - **[`router`]** - Pattern matcher, parameter rules and route definitions
//! - **[`app`]** - The [`Application`]: registration of routes, rules, mounts and hooks
//! - **[`dispatcher`]** - The request lifecycle state machine behind [`Application::run`]
//! - **[`handlers`]** - Controller, filter and hook capabilities and the callback [`Context`]
//! - **[`server`]** - Request, response and output buffer types
//! - **[`templates`]** - `minijinja` rendering with header/footer templates and error pages
//! - **[`cors`]** - Cross-origin policy applied to responses
//! - **[`manifest`]** - Declarative YAML site definitions
//! - **[`runtime_config`]** - Application settings from files and environment
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - The `fastsite` command-line tool
//!
//! ### Request Lifecycle
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host
//!     participant App as Application::run
//!     participant Hooks
//!     participant Router
//!     participant Controller
//!
//!     Host->>App: Request
//!     App->>Hooks: before hooks
//!     alt OPTIONS
//!         App->>Router: collect allowed methods
//!         App-->>Host: 200 + Allow
//!     else routed
//!         loop routes in registration order
//!             App->>Router: match pattern + method
//!             App->>Controller: filters, then controller
//!         end
//!         App->>Hooks: not-found hooks (if nothing answered)
//!         App->>Hooks: before-send hooks
//!     end
//!     App->>Hooks: after hooks
//!     App-->>Host: Emitted
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fastsite::{Application, Reply, Request};
//!
//! let mut app = Application::new();
//! app.get("/", |_ctx, _params| Ok(Reply::Text("Home".into())));
//! app.get("/news/:year?/:month?", |_ctx, params| {
//!     let year = params.first().map_or("all".to_string(), |p| p.to_string());
//!     Ok(Reply::Text(format!("News for {year}")))
//! });
//!
//! assert_eq!(app.run(&Request::get("/")).body_text(), "Home");
//! assert_eq!(app.run(&Request::get("/news/2024")).body_text(), "News for 2024");
//! assert_eq!(app.run(&Request::get("/news")).body_text(), "News for all");
//! ```
//!
//! ## Error Handling
//!
//! Definition mistakes (bad patterns, duplicate parameter rules) are
//! [`ConfigError`]s. Everything that goes wrong while a request is dispatched
//! is a [`DispatchError`] and ends in a 500 page; `run` always returns a
//! response.

pub mod app;
pub mod cli;
pub mod cors;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod logging;
pub mod manifest;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod templates;

pub use app::Application;
pub use error::{ConfigError, DispatchError, TemplateError};
pub use handlers::{Context, FilterOutcome, Handler, Reply};
pub use router::{match_pattern, MatchOptions, ParamValue};
pub use runtime_config::AppConfig;
pub use server::{Emitted, Request, Response};
