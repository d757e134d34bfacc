//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (status codes, timeouts, body limits)
//! - Validate addresses and content types before they reach the router
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::routing::error_pages::verify_range;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: `{value}` is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("routing.default_content_type: `{0}` is not a valid header value")]
    InvalidContentType(String),

    #[error("routing.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,

    #[error("error_pages[{index}]: {reason}")]
    InvalidErrorPage { index: usize, reason: String },

    #[error("observability.log_level: unknown level `{0}`")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(content_type) = &config.routing.default_content_type {
        if crate::routing::dispatcher::parse_default_content_type(content_type).is_err() {
            errors.push(ValidationError::InvalidContentType(content_type.clone()));
        }
    }

    if config.routing.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    for (index, page) in config.error_pages.iter().enumerate() {
        if let Err(e) = verify_range(page.low, page.high()) {
            errors.push(ValidationError::InvalidErrorPage {
                index,
                reason: e.to_string(),
            });
        }
        if page.path.trim().is_empty() {
            errors.push(ValidationError::InvalidErrorPage {
                index,
                reason: "path must not be empty".to_string(),
            });
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
