//! # Server Module
//!
//! Request and response types exchanged with the hosting web server.
//!
//! The framework does not listen on sockets. A host adapter builds a
//! [`Request`], calls [`Application::run`](crate::app::Application::run) and
//! writes the returned [`Emitted`] response to the wire. While a request is
//! dispatched, [`Output`] plays the role of the host's output stream and
//! enforces the headers-then-body ordering.

pub mod request;
pub mod response;

use std::sync::Arc;

use smallvec::SmallVec;

pub use request::{parse_cookies, parse_query_string, Request};
pub use response::{
    status_reason, Emitted, Output, Response, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON,
    CONTENT_TYPE_TEXT,
};

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Header storage; names keep their original case, lookups ignore it
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;
