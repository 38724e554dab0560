use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::HeaderVec;
use crate::error::{ConfigError, DispatchError};

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=UTF-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=UTF-8";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Standard reason phrase for the status codes the framework produces
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        205 => "Reset Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn remove_header(headers: &mut HeaderVec, name: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
}

fn find_header<'h>(headers: &'h HeaderVec, name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Response object with its own status, headers and body.
///
/// Returned from a controller as [`Reply::Response`](crate::handlers::Reply)
/// or from a filter to short-circuit routing. The object emits itself through
/// [`Response::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Empty `200` response without a content type
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// HTML response (`text/html; charset=UTF-8`)
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::new()
            .header("Content-Type", CONTENT_TYPE_HTML)
            .body(body)
    }

    /// Plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::new()
            .header("Content-Type", CONTENT_TYPE_TEXT)
            .body(body)
    }

    /// JSON response
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self::new()
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(value.to_string())
    }

    /// JSON response from any serializable value
    ///
    /// # Errors
    ///
    /// Returns the serialization error.
    pub fn json_from<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::new()
            .header("Content-Type", CONTENT_TYPE_JSON)
            .body(serde_json::to_vec(value)?))
    }

    /// Redirect to `url`.
    ///
    /// # Errors
    ///
    /// `status` must be one of 301, 302, 303, 307 or 308.
    pub fn redirect(url: &str, status: u16) -> Result<Self, ConfigError> {
        if !matches!(status, 301 | 302 | 303 | 307 | 308) {
            return Err(ConfigError::InvalidRedirectStatus { status });
        }
        Ok(Self::new().status(status).header("Location", url))
    }

    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any existing header with the same name
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn content_type(self, value: &str) -> Self {
        self.header("Content-Type", value)
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Headers that prevent browser and proxy caching
    #[must_use]
    pub fn no_cache(self) -> Self {
        self.header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("Expires", "-1")
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        remove_header(&mut self.headers, name);
        self.headers.push((Arc::from(name), value.to_string()));
    }

    /// Add a header without replacing existing ones (e.g. `Set-Cookie`)
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers.push((Arc::from(name), value.to_string()));
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Emit status, headers and body into `out`.
    ///
    /// When output has already started only the body can still be written;
    /// the status and headers are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Propagates [`DispatchError::HeadersAlreadySent`] from the output.
    pub fn send(self, out: &mut Output) -> Result<(), DispatchError> {
        if out.has_started() {
            warn!(
                status = self.status,
                headers = self.headers.len(),
                "Output already started; response headers were not sent"
            );
        } else {
            out.set_status(self.status)?;
            for (name, _) in &self.headers {
                remove_header(&mut out.headers, name);
            }
            out.headers.extend(self.headers);
            out.commit();
        }
        out.write(&self.body);
        Ok(())
    }
}

/// Emission buffer standing in for the host's output stream.
///
/// Status and headers stay pending until the first body byte is written or
/// the headers are committed; after that they are frozen.
#[derive(Debug, Clone)]
pub struct Output {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    headers_sent: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Vec::new(),
            headers_sent: false,
        }
    }

    /// Whether headers have been sent (any body output counts)
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.headers_sent
    }

    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn set_status(&mut self, status: u16) -> Result<(), DispatchError> {
        if self.headers_sent {
            return Err(DispatchError::HeadersAlreadySent);
        }
        self.status = status;
        Ok(())
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set a pending header, replacing any with the same name.
    ///
    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), DispatchError> {
        if self.headers_sent {
            return Err(DispatchError::HeadersAlreadySent);
        }
        remove_header(&mut self.headers, name);
        self.headers.push((Arc::from(name), value.to_string()));
        Ok(())
    }

    /// # Errors
    ///
    /// [`DispatchError::HeadersAlreadySent`] once output has started.
    pub fn remove_header(&mut self, name: &str) -> Result<(), DispatchError> {
        if self.headers_sent {
            return Err(DispatchError::HeadersAlreadySent);
        }
        remove_header(&mut self.headers, name);
        Ok(())
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Freeze status and headers
    pub fn commit(&mut self) {
        self.headers_sent = true;
    }

    /// Append body bytes, committing headers first
    pub fn write(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.headers_sent = true;
        self.body.extend_from_slice(bytes);
    }

    /// Bytes written so far
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Drop the body but keep status and headers (HEAD responses)
    pub fn discard_body(&mut self) {
        self.body.clear();
    }

    /// Discard everything buffered, as if nothing had been emitted
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn to_emitted(&self) -> Emitted {
        Emitted {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    #[must_use]
    pub fn into_emitted(self) -> Emitted {
        Emitted {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Final response produced by one run of the application
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl Emitted {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Status line as it would appear on the wire (`HTTP/1.1 404 Not Found`)
    #[must_use]
    pub fn status_line(&self) -> String {
        format!("HTTP/1.1 {} {}", self.status, status_reason(self.status))
    }
}
