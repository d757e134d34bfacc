//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl+C (SIGINT)
//! - Translate it into a [`Shutdown`] trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failure to install the handler is logged and treated as a shutdown

use std::sync::Arc;

use crate::lifecycle::shutdown::Shutdown;

/// Trigger `shutdown` when Ctrl+C arrives.
pub async fn shutdown_on_ctrl_c(shutdown: Arc<Shutdown>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
    }
    shutdown.trigger();
}
