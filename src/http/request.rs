//! The request as seen by the routing core.
//!
//! # Responsibilities
//! - Carry method, path, headers and the buffered body into a dispatch pass
//! - Mark requests that are being redispatched to an error page
//!
//! # Design Decisions
//! - The transport adapter builds this once per request; the core never sees
//!   axum types beyond the `http` primitives
//! - The error-redispatch flag lives on the request, not in global state

use axum::http::header::ACCEPT;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Vec<u8>,
    in_error_redispatch: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            in_error_redispatch: false,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_accept(self, accept: HeaderValue) -> Self {
        self.with_header(ACCEPT, accept)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Every `Accept` header joined into one list, `None` when there is none.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than dropped, so
    /// an unreadable header still restricts negotiation.
    pub fn accept(&self) -> Option<String> {
        let mut values = self.headers.get_all(ACCEPT).iter().peekable();
        values.peek()?;
        let joined = values
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        Some(joined)
    }

    pub fn is_error_redispatch(&self) -> bool {
        self.in_error_redispatch
    }

    /// A copy of this request aimed at an error page, flagged so that it is
    /// never redispatched again.
    pub(crate) fn redirected(&self, path: &str) -> Self {
        Self {
            method: self.method.clone(),
            path: path.to_string(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            in_error_redispatch: true,
        }
    }
}
