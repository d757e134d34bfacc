//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the HTTP layer into dispatch logs
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
