//! Error types shared by the routing core.

use thiserror::Error;

/// Error type returned by user callbacks (handlers and filters).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering routes or error pages.
///
/// These never reach request time: a registration either succeeds or fails
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The route pattern could not be parsed.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },

    /// An offered content type is malformed or contains a wildcard.
    #[error("invalid content type `{content_type}`: {reason}")]
    InvalidContentType {
        content_type: String,
        reason: &'static str,
    },

    /// A method arbiter could not be parsed from text.
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    /// A status code lies outside 100..=599.
    #[error("invalid status code {0}: must be within 100..=599")]
    StatusOutOfRange(u16),

    /// The low bound of a status range is larger than the high bound.
    #[error("invalid status range {low}..={high}: low is larger than high")]
    InvertedStatusRange { low: u16, high: u16 },
}

/// Errors surfaced by a dispatch pass.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A user callback failed. The dispatcher does not recover from this;
    /// the caller decides which status to report.
    #[error("callback for {method} {path} failed: {source}")]
    Callback {
        method: String,
        path: String,
        #[source]
        source: BoxError,
    },
}
