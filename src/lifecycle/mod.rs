//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → broadcast → HTTP server stops accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Shutdown::trigger
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_on_ctrl_c;
