//! # Handlers Module
//!
//! Capability types for everything the application calls back into:
//! controllers ([`Handler`]), route filters ([`Filter`]) and lifecycle hooks.
//! Controllers are resolved when they are registered; nothing is looked up by
//! name at dispatch time.
//!
//! A controller returns a [`Reply`], a tagged union of the three response
//! shapes the dispatcher knows how to normalize.
//!
//! ```rust
//! use fastsite::app::Application;
//! use fastsite::handlers::{FilterOutcome, Reply};
//! use fastsite::server::Request;
//!
//! let mut app = Application::new();
//! app.get("/hello/:name", |_ctx, params| {
//!     Ok(Reply::Text(format!("Hello {}", params[0])))
//! })
//! .filter(|ctx| Ok(FilterOutcome::from(ctx.request().header("X-Block").is_none())));
//!
//! let emitted = app.run(&Request::get("/hello/World"));
//! assert_eq!(emitted.body_text(), "Hello World");
//! ```

mod types;

pub use types::{
    AfterHook, BeforeHook, BeforeSendHook, Context, ErrorHook, ErrorInfo, Filter, FilterOutcome,
    Handler, NotFoundHook, RenderHook, Reply,
};
