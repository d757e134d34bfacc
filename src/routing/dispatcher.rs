//! Ordered filter/handler dispatch over the path trie.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → path::segments (normalize once)
//!     → PathTree::lookup (literal first, backtrack to parameter)
//!     → candidates in order:
//!         arbiter rejects method → skip
//!         RouteEntry::attempt    → Handled (stop) | Passed | NotNegotiable
//!     → DispatchOutcome
//! ```
//!
//! # Design Decisions
//! - Callback failures are not recovered here; they surface as
//!   [`DispatchError::Callback`] and the caller picks the status
//! - An unhandled outcome says why, so the fallback can answer 404 or 405

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::http::HeaderValue;

use crate::codec::{CodecRegistry, PayloadCodec};
use crate::error::{BoxError, DispatchError, RegistrationError};
use crate::http::exchange::Exchange;
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::observability::metrics;
use crate::routing::entry::{Attempt, AttemptContext, Flow, RouteEntry};
use crate::routing::method::MethodArbiter;
use crate::routing::negotiate::{self, Offers};
use crate::routing::path::{self, RoutePath};
use crate::routing::trie::PathTree;

/// How a dispatch pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An entry handled the request.
    Dispatched,
    /// Every candidate declined.
    Unhandled(Unhandled),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Dispatched)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Unhandled(reason) => reason.as_str(),
        }
    }
}

/// Why no entry handled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unhandled {
    /// No handler is registered at the request path.
    NoRoute,
    /// Handlers exist at the path, none for this method.
    MethodNotAccepted,
    /// A handler accepted the method but could not satisfy `Accept`.
    NotNegotiable,
    /// The response was finalized before a handler could run.
    Finalized,
}

impl Unhandled {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRoute => "no_route",
            Self::MethodNotAccepted => "method_not_accepted",
            Self::NotNegotiable => "not_negotiable",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered routes plus the request-time walk over them.
pub struct Dispatcher {
    tree: PathTree<Arc<RouteEntry>>,
    codecs: CodecRegistry,
    max_body_size: usize,
    default_content_type: ArcSwapOption<HeaderValue>,
}

impl Dispatcher {
    /// `codec` serves every media type without a codec of its own.
    pub fn new(codec: Arc<dyn PayloadCodec>, max_body_size: usize) -> Self {
        Self::with_codecs(CodecRegistry::new(codec), max_body_size)
    }

    pub fn with_codecs(codecs: CodecRegistry, max_body_size: usize) -> Self {
        Self {
            tree: PathTree::new(),
            codecs,
            max_body_size,
            default_content_type: ArcSwapOption::empty(),
        }
    }

    /// Register a handler.
    ///
    /// `offered` is a comma-separated list of concrete content types; `None`
    /// or `*/*` accepts everything and skips negotiation.
    pub fn register<F>(
        &self,
        pattern: &str,
        arbiter: MethodArbiter,
        offered: Option<&str>,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Exchange<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let path = RoutePath::parse(pattern)?;
        let offers = Offers::parse(offered)?;
        let default_content_type = self.default_content_type.load_full().map(|v| (*v).clone());

        tracing::info!(
            pattern = %path,
            method = %arbiter,
            offered = offered.unwrap_or(negotiate::ANY),
            "Route registered"
        );

        let entry = RouteEntry::handler(
            arbiter,
            offers,
            path.param_positions(),
            default_content_type,
            Arc::new(handler),
        );
        self.tree.insert(&path, Arc::new(entry), false);
        metrics::record_registration("handler");
        Ok(())
    }

    /// Register a handler that accepts every content type.
    pub fn on<F>(&self, arbiter: MethodArbiter, pattern: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Exchange<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.register(pattern, arbiter, None, handler)
    }

    /// Register a filter ahead of every entry already at `pattern`.
    pub fn register_filter<F>(&self, pattern: &str, filter: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Exchange<'_>) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        let path = RoutePath::parse(pattern)?;
        tracing::info!(pattern = %path, "Filter registered");

        let entry = RouteEntry::filter(path.param_positions(), Arc::new(filter));
        self.tree.insert(&path, Arc::new(entry), true);
        metrics::record_registration("filter");
        Ok(())
    }

    /// Remove every entry at `pattern` whose arbiter accepts `arbiter`.
    ///
    /// Returns `true` if anything was removed. An unparsable pattern removes
    /// nothing.
    pub fn remove(&self, arbiter: &MethodArbiter, pattern: &str) -> bool {
        let path = match RoutePath::parse(pattern) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Ignoring removal for invalid pattern");
                return false;
            }
        };

        let removed = self
            .tree
            .remove_where(&path, |entry| entry.arbiter().accepts_arbiter(arbiter));
        tracing::info!(pattern = %path, method = %arbiter, removed, "Routes removed");
        removed > 0
    }

    /// Drop every registered route.
    pub fn clear(&self) {
        self.tree.clear();
        tracing::info!("Routes cleared");
    }

    /// Set the content type applied to unrestricted handlers registered
    /// from now on. `None` stops setting one.
    pub fn set_default_content_type(&self, content_type: Option<&str>) -> Result<(), RegistrationError> {
        let value = content_type.map(parse_default_content_type).transpose()?;
        tracing::debug!(default_content_type = ?content_type, "Default content type updated");
        self.default_content_type.store(value.map(Arc::new));
        Ok(())
    }

    pub fn default_content_type(&self) -> Option<HeaderValue> {
        self.default_content_type.load_full().map(|v| (*v).clone())
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Number of registered entries, filters included.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Every registered entry, depth first.
    pub fn entries(&self) -> Vec<Arc<RouteEntry>> {
        self.tree.entries()
    }

    /// Human readable rendering of the route tree.
    pub fn tree_summary(&self) -> String {
        self.tree.to_string()
    }

    /// Run one request through the candidates registered for its path.
    pub fn dispatch(
        &self,
        request: &RequestContext,
        response: &mut dyn ResponseSink,
    ) -> Result<DispatchOutcome, DispatchError> {
        let segments = path::segments(request.path());
        let candidates = self.tree.lookup(&segments);
        let cx = AttemptContext {
            request,
            segments: &segments,
            codecs: &self.codecs,
            max_body_size: self.max_body_size,
        };

        let mut saw_handler = false;
        let mut method_accepted = false;
        let mut not_negotiable = false;

        for entry in candidates.iter() {
            let is_filter = entry.is_filter();
            saw_handler |= !is_filter;

            if !entry.arbiter().accepts(request.method()) {
                continue;
            }
            method_accepted |= !is_filter;

            let attempt = entry
                .attempt(&cx, response)
                .map_err(|source| DispatchError::Callback {
                    method: request.method().to_string(),
                    path: request.path().to_string(),
                    source,
                })?;

            match attempt {
                Attempt::Handled => {
                    tracing::debug!(
                        method = %request.method(),
                        path = request.path(),
                        filter = is_filter,
                        "Request dispatched"
                    );
                    return Ok(DispatchOutcome::Dispatched);
                }
                Attempt::Passed => {}
                Attempt::NotNegotiable => not_negotiable = true,
                Attempt::Refused => {
                    return Ok(DispatchOutcome::Unhandled(Unhandled::Finalized));
                }
            }
        }

        let reason = if !saw_handler {
            Unhandled::NoRoute
        } else if !method_accepted {
            Unhandled::MethodNotAccepted
        } else if not_negotiable {
            Unhandled::NotNegotiable
        } else {
            Unhandled::NoRoute
        };
        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            candidates = candidates.len(),
            reason = %reason,
            "Request unhandled"
        );
        Ok(DispatchOutcome::Unhandled(reason))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.tree.len())
            .field("codecs", &self.codecs)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

pub(crate) fn parse_default_content_type(raw: &str) -> Result<HeaderValue, RegistrationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RegistrationError::InvalidContentType {
            content_type: raw.to_string(),
            reason: "empty content type",
        });
    }
    HeaderValue::from_str(trimmed).map_err(|_| RegistrationError::InvalidContentType {
        content_type: raw.to_string(),
        reason: "not a valid header value",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlainTextCodec;
    use crate::http::response::BufferedResponse;
    use axum::http::{Method, StatusCode};
    use std::sync::Mutex;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(PlainTextCodec), 1024)
    }

    fn run(dispatcher: &Dispatcher, request: &RequestContext) -> (DispatchOutcome, BufferedResponse) {
        let mut response = BufferedResponse::new();
        let outcome = dispatcher.dispatch(request, &mut response).unwrap();
        (outcome, response)
    }

    fn get(path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path)
    }

    #[test]
    fn test_literal_route_dispatches() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/a/b", |ex| {
            ex.send("ab")?;
            Ok(())
        })
        .unwrap();

        let (outcome, response) = run(&d, &get("/a/b"));
        assert!(outcome.is_handled());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text(), "ab\n");

        let (outcome, _) = run(&d, &get("/a"));
        assert_eq!(outcome, DispatchOutcome::Unhandled(Unhandled::NoRoute));
    }

    #[test]
    fn test_literal_beats_param_and_param_catches_rest() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/:id", |ex| {
            let line = format!("param {}", ex.param("id").unwrap_or_default());
            ex.send(&line)?;
            Ok(())
        })
        .unwrap();
        d.on(MethodArbiter::GET, "/fixed", |ex| {
            ex.send("literal")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(run(&d, &get("/fixed")).1.text(), "literal\n");
        assert_eq!(run(&d, &get("/other")).1.text(), "param other\n");
    }

    #[test]
    fn test_param_names_are_per_entry() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/users/:id", |ex| {
            let line = format!("id={}", ex.param("id").unwrap_or("-"));
            ex.send(&line)?;
            Ok(())
        })
        .unwrap();
        d.on(MethodArbiter::PUT, "/users/:name", |ex| {
            let line = format!("name={}", ex.param("name").unwrap_or("-"));
            ex.send(&line)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(run(&d, &get("/users/7")).1.text(), "id=7\n");
        let put = RequestContext::new(Method::PUT, "/users/ann");
        assert_eq!(run(&d, &put).1.text(), "name=ann\n");
    }

    #[test]
    fn test_method_not_accepted_vs_not_negotiable() {
        let d = dispatcher();
        d.register("/doc", MethodArbiter::GET, Some("application/json"), |ex| {
            ex.send("{}")?;
            Ok(())
        })
        .unwrap();

        let post = RequestContext::new(Method::POST, "/doc");
        assert_eq!(
            run(&d, &post).0,
            DispatchOutcome::Unhandled(Unhandled::MethodNotAccepted)
        );

        let html = get("/doc").with_accept(HeaderValue::from_static("text/html"));
        assert_eq!(
            run(&d, &html).0,
            DispatchOutcome::Unhandled(Unhandled::NotNegotiable)
        );
    }

    #[test]
    fn test_filters_run_most_recent_first() {
        let d = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        d.on(MethodArbiter::GET, "/f", |ex| {
            ex.send("handler")?;
            Ok(())
        })
        .unwrap();
        for name in ["first", "second"] {
            let seen = Arc::clone(&seen);
            d.register_filter("/f", move |_| {
                seen.lock().unwrap().push(name);
                Ok(Flow::Continue)
            })
            .unwrap();
        }

        let (outcome, response) = run(&d, &get("/f"));
        assert!(outcome.is_handled());
        assert_eq!(response.text(), "handler\n");
        assert_eq!(*seen.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn test_filter_can_stop_dispatch() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/guarded", |ex| {
            ex.send("secret")?;
            Ok(())
        })
        .unwrap();
        d.register_filter("/guarded", |ex| {
            ex.set_status(StatusCode::UNAUTHORIZED);
            Ok(Flow::Handled)
        })
        .unwrap();

        let (outcome, response) = run(&d, &get("/guarded"));
        assert!(outcome.is_handled());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.body_bytes().is_empty());
    }

    #[test]
    fn test_finalizing_filter_blocks_handlers() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/x", |ex| {
            ex.send("late")?;
            Ok(())
        })
        .unwrap();
        d.register_filter("/x", |ex| {
            ex.finalize();
            Ok(Flow::Continue)
        })
        .unwrap();

        let (outcome, response) = run(&d, &get("/x"));
        assert_eq!(outcome, DispatchOutcome::Unhandled(Unhandled::Finalized));
        assert!(response.body_bytes().is_empty());
    }

    #[test]
    fn test_remove_any_method_with_get() {
        let d = dispatcher();
        d.on(MethodArbiter::any_method(), "/all", |ex| {
            ex.send("all")?;
            Ok(())
        })
        .unwrap();

        assert!(d.remove(&MethodArbiter::GET, "/all"));
        assert!(!run(&d, &get("/all")).0.is_handled());
        assert!(!d.remove(&MethodArbiter::GET, "/all"));
        assert!(!d.remove(&MethodArbiter::GET, "/never/registered"));
        assert!(!d.remove(&MethodArbiter::GET, "/:"));
    }

    #[test]
    fn test_callback_failure_is_reported() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/boom", |_| Err("kaboom".into()))
            .unwrap();

        let mut response = BufferedResponse::new();
        let err = d.dispatch(&get("/boom"), &mut response).unwrap_err();
        let DispatchError::Callback { method, path, source } = err;
        assert_eq!(method, "GET");
        assert_eq!(path, "/boom");
        assert_eq!(source.to_string(), "kaboom");
    }

    #[test]
    fn test_default_content_type_applies_to_later_routes() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/before", |_| Ok(())).unwrap();
        d.set_default_content_type(Some("text/html")).unwrap();
        d.on(MethodArbiter::GET, "/after", |_| Ok(())).unwrap();

        assert_eq!(run(&d, &get("/before")).1.header("content-type"), None);
        assert_eq!(
            run(&d, &get("/after")).1.header("content-type"),
            Some("text/html")
        );
        assert!(d.set_default_content_type(Some("  ")).is_err());
    }

    #[test]
    fn test_invalid_registrations_fail_fast() {
        let d = dispatcher();
        assert!(d.on(MethodArbiter::GET, "/a/:", |_| Ok(())).is_err());
        assert!(d
            .register("/a", MethodArbiter::GET, Some("text/*"), |_| Ok(()))
            .is_err());
        assert!(d.is_empty());
    }

    #[test]
    fn test_clear_and_entries() {
        let d = dispatcher();
        d.on(MethodArbiter::GET, "/a", |_| Ok(())).unwrap();
        d.on(MethodArbiter::GET, "/a/:b", |_| Ok(())).unwrap();
        d.register_filter("/a", |_| Ok(Flow::Continue)).unwrap();
        assert_eq!(d.len(), 3);
        assert_eq!(d.entries().len(), 3);
        assert!(d.tree_summary().contains("a"));

        d.clear();
        assert!(d.is_empty());
        assert!(!run(&d, &get("/a")).0.is_handled());
    }
}
