//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming RequestContext (method, path, Accept)
//!     → router.rs (per-request pipeline)
//!     → dispatcher.rs
//!         → trie.rs (path segments → ordered candidates)
//!         → method.rs (skip entries rejecting the method)
//!         → entry.rs + negotiate.rs (pick content type, run callback)
//!     → unhandled? fallback (404, or 405 with MethodAwareFallback)
//!     → status >= 400? error_pages.rs (nested dispatch to the mapped page)
//!
//! Registration (any time, also while serving):
//!     pattern → path.rs (parse segments)
//!     → RouteEntry
//!     → trie.rs insert (filters at the front)
//! ```
//!
//! # Design Decisions
//! - Literal segments win over parameters; a dead-end literal branch
//!   backtracks to the parameter branch
//! - Entries run in registration order and the first one that handles the
//!   request stops the walk
//! - Registration and removal never block dispatch: nodes are append-only,
//!   entry lists are copy-on-write

pub mod dispatcher;
pub mod entry;
pub mod error_pages;
pub mod method;
pub mod negotiate;
pub mod path;
pub mod router;
pub mod trie;

pub use dispatcher::{DispatchOutcome, Dispatcher, Unhandled};
pub use entry::{Filter, Flow, Handler, RouteEntry};
pub use error_pages::{ErrorPages, ErrorRedispatcher, Redispatch};
pub use method::MethodArbiter;
pub use negotiate::{MediaType, Negotiated, Offers};
pub use path::{Params, RoutePath};
pub use router::{Fallback, MethodAwareFallback, NotFoundFallback, Router};
