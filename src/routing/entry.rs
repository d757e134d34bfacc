//! Route entries: one registered handler or filter at a trie node.
//!
//! # Responsibilities
//! - Bind a method arbiter, offered content types, parameter positions and a
//!   callback together
//! - Run the per-candidate acceptance checks and invoke the callback
//!
//! # Design Decisions
//! - Method filtering happens in the dispatcher, before an entry is attempted,
//!   so "wrong method" and "wrong content type" stay distinguishable
//! - Filters say whether dispatch continues through an explicit [`Flow`]
//!   instead of through side effects on the response

use std::fmt;
use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};

use crate::codec::CodecRegistry;
use crate::error::BoxError;
use crate::http::exchange::Exchange;
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::routing::method::MethodArbiter;
use crate::routing::negotiate::{self, Negotiated, Offers};
use crate::routing::path::ParamPositions;

/// A request handler.
pub type Handler = Arc<dyn Fn(&mut Exchange<'_>) -> Result<(), BoxError> + Send + Sync>;

/// A filter run ahead of the handlers registered at the same path.
pub type Filter = Arc<dyn Fn(&mut Exchange<'_>) -> Result<Flow, BoxError> + Send + Sync>;

/// What a filter wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Let the following entries run.
    Continue,
    /// The filter answered the request; stop dispatching.
    Handled,
}

#[derive(Clone)]
enum Callback {
    Handler(Handler),
    Filter(Filter),
}

/// Result of attempting one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Handled,
    /// A filter let the request through.
    Passed,
    /// No offered content type satisfied the `Accept` header.
    NotNegotiable,
    /// The response was already finalized.
    Refused,
}

/// Shared per-dispatch inputs for [`RouteEntry::attempt`].
pub(crate) struct AttemptContext<'a> {
    pub request: &'a RequestContext,
    pub segments: &'a [&'a str],
    pub codecs: &'a CodecRegistry,
    pub max_body_size: usize,
}

#[derive(Clone)]
pub struct RouteEntry {
    arbiter: MethodArbiter,
    offers: Offers,
    params: ParamPositions,
    default_content_type: Option<HeaderValue>,
    callback: Callback,
}

impl RouteEntry {
    pub fn handler(
        arbiter: MethodArbiter,
        offers: Offers,
        params: ParamPositions,
        default_content_type: Option<HeaderValue>,
        handler: Handler,
    ) -> Self {
        Self {
            arbiter,
            offers,
            params,
            default_content_type,
            callback: Callback::Handler(handler),
        }
    }

    /// Filters accept every method and every content type.
    pub fn filter(params: ParamPositions, filter: Filter) -> Self {
        Self {
            arbiter: MethodArbiter::any_method(),
            offers: Offers::Everything,
            params,
            default_content_type: None,
            callback: Callback::Filter(filter),
        }
    }

    pub fn arbiter(&self) -> &MethodArbiter {
        &self.arbiter
    }

    pub fn offers(&self) -> &Offers {
        &self.offers
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.callback, Callback::Filter(_))
    }

    pub(crate) fn attempt(
        &self,
        cx: &AttemptContext<'_>,
        response: &mut dyn ResponseSink,
    ) -> Result<Attempt, BoxError> {
        if response.is_finalized() {
            return Ok(Attempt::Refused);
        }

        let params = self.params.extract(cx.segments);
        match &self.callback {
            Callback::Filter(filter) => {
                let mut exchange = Exchange::new(
                    cx.request,
                    response,
                    params,
                    negotiate::ANY,
                    cx.codecs,
                    cx.max_body_size,
                );
                match filter(&mut exchange)? {
                    Flow::Continue => Ok(Attempt::Passed),
                    Flow::Handled => Ok(Attempt::Handled),
                }
            }
            Callback::Handler(handler) => {
                let accept = cx.request.accept();
                let Some(negotiated) = negotiate::negotiate(&self.offers, accept.as_deref()) else {
                    return Ok(Attempt::NotNegotiable);
                };

                response.set_status(StatusCode::OK);
                match negotiated {
                    Negotiated::Type(media) => {
                        response.set_header(CONTENT_TYPE, media.header_value().clone());
                    }
                    Negotiated::Any => {
                        if let Some(default) = &self.default_content_type {
                            response.set_header(CONTENT_TYPE, default.clone());
                        }
                    }
                }

                let mut exchange = Exchange::new(
                    cx.request,
                    response,
                    params,
                    negotiated.as_str(),
                    cx.codecs,
                    cx.max_body_size,
                );
                handler(&mut exchange)?;
                Ok(Attempt::Handled)
            }
        }
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("arbiter", &self.arbiter.to_string())
            .field("offers", &self.offers)
            .field("params", &self.params)
            .field("filter", &self.is_filter())
            .finish()
    }
}
