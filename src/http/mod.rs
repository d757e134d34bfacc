//! HTTP-facing types and the axum transport adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → request.rs (RequestContext: method, path, headers, body)
//!     → routing::Router::handle
//!         → exchange.rs (what handlers and filters see)
//!         → response.rs (BufferedResponse written through ResponseSink)
//!     → Send to client
//! ```

pub mod exchange;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use exchange::Exchange;
pub use request::{RequestContext, X_REQUEST_ID};
pub use response::{BufferedResponse, ResponseSink};
pub use server::HttpServer;
