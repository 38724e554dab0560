use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use super::HeaderVec;

/// Incoming request as handed over by the hosting web server.
///
/// The path never includes the query string; [`Request::new`] splits a
/// `path?query` target and parses the query with `url::form_urlencoded`.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path without query string
    pub path: String,
    /// Parsed query string parameters
    pub query_params: HashMap<String, String>,
    /// HTTP headers as received
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HashMap<String, String>,
    /// Raw request body
    pub body: Vec<u8>,
}

impl Request {
    /// Create a request from a method and a `path[?query]` target
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query_params: query.map(parse_query_string).unwrap_or_default(),
            headers: HeaderVec::new(),
            cookies: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Shorthand for a GET request
    #[must_use]
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// Add a header; a `Cookie` header also populates [`Request::cookies`]
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("cookie") {
            self.cookies.extend(parse_cookies(value));
        }
        self.headers.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Body decoded as UTF-8 text (lossy)
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    ///
    /// # Errors
    ///
    /// Returns the parse error when the body is not valid JSON.
    pub fn body_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Parse a `Cookie` header value into name/value pairs
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((name.to_string(), value))
        })
        .collect()
}

/// Parse a query string (without the leading `?`), URL-decoding names and values
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    debug!(count = params.len(), "Parsed query string");
    params
}
