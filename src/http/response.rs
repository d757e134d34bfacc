//! Response sinks.
//!
//! # Responsibilities
//! - Define the surface the dispatcher writes responses through
//! - Provide the buffered response used by the router and the axum adapter
//!
//! # Design Decisions
//! - A finalized response is frozen for the routing core: entries refuse to
//!   touch it, and the fallback is skipped
//! - Bodies are buffered in memory so error pages can replace them

use std::io::{self, Write};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Where the routing core writes a response.
pub trait ResponseSink {
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// The output stream.
    fn body(&mut self) -> &mut dyn Write;

    /// Discard whatever was written to the body so far.
    fn clear_body(&mut self);

    /// Drop every header set so far.
    fn clear_headers(&mut self);

    fn is_finalized(&self) -> bool;

    /// Freeze the response; later entries will not handle the request.
    fn finalize(&mut self);
}

/// An in-memory response.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    finalized: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            finalized: false,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as text (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for BufferedResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.body
    }

    fn clear_body(&mut self) {
        self.body.clear();
    }

    fn clear_headers(&mut self) {
        self.headers.clear();
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let (status, headers, body) = self.into_parts();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

/// Write a line of text to a sink's body.
pub(crate) fn write_line(sink: &mut dyn ResponseSink, text: &str) -> io::Result<()> {
    let out = sink.body();
    out.write_all(text.as_bytes())?;
    out.write_all(b"\n")
}
