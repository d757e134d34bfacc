//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber once per process
//! - Configure log level from config, overridable through `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level so operators can raise
//!   verbosity without editing the config file

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives for a configured level, e.g. `switchyard=info,tower_http=info`.
pub fn default_directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    format!("switchyard={level},tower_http={level}")
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
