//! Error pages: status codes mapped to paths that render them.
//!
//! # Data Flow
//! ```text
//! final response status (>= 400)
//!     → ErrorPages::path_for(status)
//!     → request.redirected(path)        (flagged: never redispatched twice)
//!     → Dispatcher::dispatch into a StatusObserver
//!     → observer saw 200? copy headers + body over the original
//! ```
//!
//! # Design Decisions
//! - Two layers: pages registered in code, and pages from configuration.
//!   A configured page wins for its status; a reload swaps the configured
//!   layer whole (`ArcSwap`) and never touches pages registered in code
//! - Only statuses >= 400 are redispatched; lower codes can be mapped but
//!   never fire
//! - The original error status stays on the wire; only the body and headers
//!   of the error page are taken over
//! - A failed or unhandled error page leaves the original response untouched

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::error::RegistrationError;
use crate::http::request::RequestContext;
use crate::http::response::{BufferedResponse, ResponseSink};
use crate::observability::metrics;
use crate::routing::dispatcher::Dispatcher;
use crate::routing::path;

/// Lowest status code an error page may be registered for.
pub const MIN_STATUS: u16 = 100;
/// Highest status code an error page may be registered for.
pub const MAX_STATUS: u16 = 599;

/// Check `low..=high` against the valid status code bounds.
pub fn verify_range(low: u16, high: u16) -> Result<(), RegistrationError> {
    for code in [low, high] {
        if !(MIN_STATUS..=MAX_STATUS).contains(&code) {
            return Err(RegistrationError::StatusOutOfRange(code));
        }
    }
    if low > high {
        return Err(RegistrationError::InvertedStatusRange { low, high });
    }
    Ok(())
}

/// Lowest status that triggers a redispatch.
pub const FIRST_ERROR_STATUS: u16 = 400;

type PageTable = HashMap<u16, Arc<str>>;

/// Status code → error page path.
#[derive(Debug)]
pub struct ErrorPages {
    registered: ArcSwap<PageTable>,
    configured: ArcSwap<PageTable>,
}

impl ErrorPages {
    pub fn new() -> Self {
        Self {
            registered: ArcSwap::from_pointee(HashMap::new()),
            configured: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Map `status` to `path`. Statuses below 400 are accepted but never
    /// redispatched.
    pub fn register(&self, status: u16, path: &str) -> Result<(), RegistrationError> {
        self.register_range(status, status, path)
    }

    /// Map every status in `low..=high` to `path`, replacing older mappings
    /// registered in code. Statuses below 400 never fire.
    pub fn register_range(&self, low: u16, high: u16, path: &str) -> Result<(), RegistrationError> {
        verify_range(low, high)?;
        let target: Arc<str> = Arc::from(path::normalize(path));
        if low < FIRST_ERROR_STATUS {
            tracing::warn!(low, high, path = %target, "Error pages below 400 are never redispatched");
        }

        self.registered.rcu(|current| {
            let mut next = HashMap::clone(current);
            for code in low..=high {
                next.insert(code, Arc::clone(&target));
            }
            next
        });
        tracing::info!(low, high, path = %target, "Error page registered");
        Ok(())
    }

    /// Replace the configured layer. Pages registered in code stay; nothing
    /// changes if any range is invalid.
    pub fn replace<'a, I>(&self, ranges: I) -> Result<(), RegistrationError>
    where
        I: IntoIterator<Item = (u16, u16, &'a str)>,
    {
        let next = build_table(ranges)?;
        let mapped = next.len();
        self.configured.store(Arc::new(next));
        tracing::info!(mapped, "Configured error pages replaced");
        Ok(())
    }

    pub fn path_for(&self, status: StatusCode) -> Option<Arc<str>> {
        let code = status.as_u16();
        if let Some(page) = self.configured.load().get(&code) {
            return Some(Arc::clone(page));
        }
        self.registered.load().get(&code).cloned()
    }

    /// Forget both layers.
    pub fn clear(&self) {
        self.registered.store(Arc::new(HashMap::new()));
        self.configured.store(Arc::new(HashMap::new()));
    }

    /// Number of mapped status codes across both layers.
    pub fn len(&self) -> usize {
        let configured = self.configured.load();
        let registered = self.registered.load();
        configured.len()
            + registered
                .keys()
                .filter(|code| !configured.contains_key(code))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorPages {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate and expand ranges into a table. Later ranges win on overlap.
fn build_table<'a, I>(ranges: I) -> Result<PageTable, RegistrationError>
where
    I: IntoIterator<Item = (u16, u16, &'a str)>,
{
    let mut table = HashMap::new();
    for (low, high, page) in ranges {
        verify_range(low, high)?;
        let target: Arc<str> = Arc::from(path::normalize(page));
        for code in low..=high {
            table.insert(code, Arc::clone(&target));
        }
    }
    Ok(table)
}

/// What an error redispatch attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redispatch {
    /// No page is mapped for the status.
    NotMapped,
    /// The request is itself an error page request.
    AlreadyRedispatching,
    /// The error page answered; its body replaced the original.
    Recovered,
    /// The error page did not answer with 200; the original stays.
    StillError,
}

impl Redispatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotMapped => "not_mapped",
            Self::AlreadyRedispatching => "already_redispatching",
            Self::Recovered => "recovered",
            Self::StillError => "still_error",
        }
    }
}

/// Runs the dispatcher a second time for a mapped error page.
pub struct ErrorRedispatcher<'a> {
    dispatcher: &'a Dispatcher,
    pages: &'a ErrorPages,
}

impl<'a> ErrorRedispatcher<'a> {
    pub fn new(dispatcher: &'a Dispatcher, pages: &'a ErrorPages) -> Self {
        Self { dispatcher, pages }
    }

    pub fn on_status(&self, request: &RequestContext, response: &mut dyn ResponseSink) -> Redispatch {
        let status = response.status();
        if request.is_error_redispatch() {
            return Redispatch::AlreadyRedispatching;
        }
        let Some(page) = self.pages.path_for(status) else {
            return Redispatch::NotMapped;
        };

        let redirected = request.redirected(&page);
        let mut observer = StatusObserver::new(status);
        let result = match self.dispatcher.dispatch(&redirected, &mut observer) {
            Ok(_) if observer.saw_ok => {
                if let Err(e) = observer.copy_into(response) {
                    tracing::warn!(page = %page, error = %e, "Failed to copy error page body");
                }
                Redispatch::Recovered
            }
            Ok(outcome) => {
                tracing::debug!(
                    page = %page,
                    status = status.as_u16(),
                    outcome = outcome.as_str(),
                    "Error page did not answer"
                );
                Redispatch::StillError
            }
            Err(e) => {
                tracing::warn!(page = %page, status = status.as_u16(), error = %e, "Error page failed");
                Redispatch::StillError
            }
        };

        metrics::record_error_redispatch(result.as_str());
        result
    }
}

/// Buffers an error page response and remembers whether it was set to 200.
///
/// The status itself never changes; the original error status is what the
/// client sees.
struct StatusObserver {
    inner: BufferedResponse,
    saw_ok: bool,
}

impl StatusObserver {
    fn new(status: StatusCode) -> Self {
        let mut inner = BufferedResponse::new();
        inner.set_status(status);
        Self {
            inner,
            saw_ok: false,
        }
    }

    fn copy_into(self, response: &mut dyn ResponseSink) -> std::io::Result<()> {
        let (_, headers, body) = self.inner.into_parts();
        copy_headers(headers, response);
        response.clear_body();
        response.body().write_all(&body)
    }
}

fn copy_headers(headers: HeaderMap, response: &mut dyn ResponseSink) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in headers {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            response.set_header(name.clone(), value);
        }
    }
}

impl ResponseSink for StatusObserver {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.saw_ok = status == StatusCode::OK;
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.set_header(name, value);
    }

    fn body(&mut self) -> &mut dyn Write {
        self.inner.body()
    }

    fn clear_body(&mut self) {
        self.inner.clear_body();
    }

    fn clear_headers(&mut self) {
        self.inner.clear_headers();
    }

    fn is_finalized(&self) -> bool {
        self.inner.is_finalized()
    }

    fn finalize(&mut self) {
        self.inner.finalize();
    }
}
