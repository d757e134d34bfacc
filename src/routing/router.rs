//! Server-scoped routing facade.
//!
//! # Responsibilities
//! - Own the dispatcher, the error page table and the fallback
//! - Expose the configuration-time API (register, remove, error pages, clear)
//! - Run the per-request pipeline: dispatch, fallback, error redispatch
//!
//! # Design Decisions
//! - Callback failures become 500 here, then go through error pages like any
//!   other error status
//! - Unhandled requests go to a pluggable [`Fallback`]; the default answers
//!   404 whatever the reason, [`MethodAwareFallback`] tells 405 apart
//! - Live reconfiguration touches only the configured error pages and the
//!   default content type; routes and code-registered pages stay

use std::sync::Arc;

use axum::http::StatusCode;

use crate::codec::{CodecRegistry, PayloadCodec, PlainTextCodec};
use crate::config::schema::ServerConfig;
use crate::error::{BoxError, RegistrationError};
use crate::http::exchange::Exchange;
use crate::http::request::RequestContext;
use crate::http::response::{BufferedResponse, ResponseSink};
use crate::observability::metrics;
use crate::routing::dispatcher::{parse_default_content_type, DispatchOutcome, Dispatcher, Unhandled};
use crate::routing::entry::Flow;
use crate::routing::error_pages::{ErrorPages, ErrorRedispatcher, FIRST_ERROR_STATUS};
use crate::routing::method::MethodArbiter;

/// Request bodies above this size are refused unless configured otherwise.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Answers requests that no entry handled.
pub trait Fallback: Send + Sync {
    fn respond(&self, request: &RequestContext, reason: Unhandled, response: &mut dyn ResponseSink);
}

/// 404 for every unhandled request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundFallback;

impl Fallback for NotFoundFallback {
    fn respond(&self, _request: &RequestContext, reason: Unhandled, response: &mut dyn ResponseSink) {
        if reason != Unhandled::Finalized {
            response.set_status(StatusCode::NOT_FOUND);
        }
    }
}

/// Like [`NotFoundFallback`], but answers 405 when handlers exist at the
/// path and none accepts the method.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodAwareFallback;

impl Fallback for MethodAwareFallback {
    fn respond(&self, request: &RequestContext, reason: Unhandled, response: &mut dyn ResponseSink) {
        match reason {
            Unhandled::MethodNotAccepted => response.set_status(StatusCode::METHOD_NOT_ALLOWED),
            other => NotFoundFallback.respond(request, other, response),
        }
    }
}

pub struct Router {
    dispatcher: Dispatcher,
    error_pages: ErrorPages,
    fallback: Box<dyn Fallback>,
}

impl Router {
    /// A router with the plain text codec and default limits.
    pub fn new() -> Self {
        Self::with_codec(Arc::new(PlainTextCodec), DEFAULT_MAX_BODY_SIZE)
    }

    /// `codec` handles media types without a codec of their own; JSON and
    /// text types keep theirs.
    pub fn with_codec(codec: Arc<dyn PayloadCodec>, max_body_size: usize) -> Self {
        Self::with_codecs(CodecRegistry::new(codec), max_body_size)
    }

    pub fn with_codecs(codecs: CodecRegistry, max_body_size: usize) -> Self {
        Self {
            dispatcher: Dispatcher::with_codecs(codecs, max_body_size),
            error_pages: ErrorPages::new(),
            fallback: Box::new(NotFoundFallback),
        }
    }

    /// Build a router from configuration: codec, body limit, default
    /// content type and error pages.
    pub fn from_config(config: &ServerConfig) -> Result<Self, RegistrationError> {
        let router = Self::with_codec(config.routing.codec.build(), config.routing.max_body_size);
        router.apply_config(config)?;
        Ok(router)
    }

    /// Replace the fallback for unhandled requests.
    pub fn with_fallback(mut self, fallback: impl Fallback + 'static) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    /// Apply the live-reloadable parts of a configuration.
    ///
    /// Configured error pages replace the previous configured ones and
    /// override code-registered pages for the same status. Nothing changes
    /// if any part is invalid.
    pub fn apply_config(&self, config: &ServerConfig) -> Result<(), RegistrationError> {
        let default_content_type = config.routing.default_content_type.as_deref();
        if let Some(raw) = default_content_type {
            parse_default_content_type(raw)?;
        }
        self.error_pages.replace(
            config
                .error_pages
                .iter()
                .map(|page| (page.low, page.high(), page.path.as_str())),
        )?;
        self.dispatcher.set_default_content_type(default_content_type)
    }

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
        self.dispatcher.register(pattern, arbiter, offered, handler)
    }

    pub fn on<F>(&self, arbiter: MethodArbiter, pattern: &str, handler: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Exchange<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.dispatcher.on(arbiter, pattern, handler)
    }

    pub fn register_filter<F>(&self, pattern: &str, filter: F) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Exchange<'_>) -> Result<Flow, BoxError> + Send + Sync + 'static,
    {
        self.dispatcher.register_filter(pattern, filter)
    }

    pub fn remove(&self, arbiter: &MethodArbiter, pattern: &str) -> bool {
        self.dispatcher.remove(arbiter, pattern)
    }

    /// Render `path` for responses finishing with `status`.
    ///
    /// Any status in 100..=599 is accepted, but only 400 and above are ever
    /// redispatched.
    pub fn register_error_page(&self, status: u16, path: &str) -> Result<(), RegistrationError> {
        self.error_pages.register(status, path)
    }

    pub fn register_error_page_range(
        &self,
        low: u16,
        high: u16,
        path: &str,
    ) -> Result<(), RegistrationError> {
        self.error_pages.register_range(low, high, path)
    }

    pub fn set_default_content_type(&self, content_type: Option<&str>) -> Result<(), RegistrationError> {
        self.dispatcher.set_default_content_type(content_type)
    }

    /// Forget every route and error page.
    pub fn clear(&self) {
        self.dispatcher.clear();
        self.error_pages.clear();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn error_pages(&self) -> &ErrorPages {
        &self.error_pages
    }

    /// Run the full pipeline for one request into a fresh buffer.
    pub fn handle(&self, request: &RequestContext) -> BufferedResponse {
        let mut response = BufferedResponse::new();
        self.handle_into(request, &mut response);
        response
    }

    /// Run the full pipeline for one request, finalizing `response`.
    pub fn handle_into(&self, request: &RequestContext, response: &mut dyn ResponseSink) {
        let outcome = match self.dispatcher.dispatch(request, response) {
            Ok(DispatchOutcome::Dispatched) => "dispatched",
            Ok(DispatchOutcome::Unhandled(reason)) => {
                if !response.is_finalized() {
                    self.fallback.respond(request, reason, response);
                }
                reason.as_str()
            }
            Err(e) => {
                tracing::error!(error = %e, "Request callback failed");
                response.clear_headers();
                response.clear_body();
                response.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                "callback_error"
            }
        };
        metrics::record_dispatch(outcome);

        if response.status().as_u16() >= FIRST_ERROR_STATUS {
            let result = ErrorRedispatcher::new(&self.dispatcher, &self.error_pages)
                .on_status(request, response);
            tracing::debug!(
                path = request.path(),
                status = response.status().as_u16(),
                result = result.as_str(),
                "Error status observed"
            );
        }
        response.finalize();
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("dispatcher", &self.dispatcher)
            .field("error_pages", &self.error_pages.len())
            .finish()
    }
}
