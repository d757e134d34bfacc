//! switchyard: request routing and dispatch for HTTP services.
//!
//! Handlers and filters are registered on a [`Router`] by path pattern,
//! method and offered content types. Each request walks a segment trie,
//! negotiates a response content type against `Accept`, runs the first
//! matching entry and, for error statuses, an error page. The
//! [`HttpServer`] adapter serves a router over axum.

pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use codec::{CodecError, CodecKind, CodecRegistry, JsonCodec, PayloadCodec, PlainTextCodec};
pub use config::schema::ServerConfig;
pub use error::{BoxError, DispatchError, RegistrationError};
pub use http::{BufferedResponse, Exchange, HttpServer, RequestContext, ResponseSink};
pub use lifecycle::Shutdown;
pub use routing::{Flow, MethodArbiter, Router};
