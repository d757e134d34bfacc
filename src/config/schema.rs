//! Configuration schema definitions.
//!
//! This module defines the configuration structure of a switchyard server.
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};

use crate::codec::CodecKind;
use crate::routing::router::DEFAULT_MAX_BODY_SIZE;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Routing behaviour shared by every route.
    pub routing: RoutingConfig,

    /// Status code ranges redirected to error page routes.
    pub error_pages: Vec<ErrorPageConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Content type set on responses of routes that accept everything.
    pub default_content_type: Option<String>,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Payload codec used by `send` / `receive`.
    pub codec: CodecKind,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_content_type: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            codec: CodecKind::default(),
        }
    }
}

/// One error page mapping: `low..=high` → `path`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorPageConfig {
    /// First status code of the range.
    pub low: u16,

    /// Last status code of the range; a single code when omitted.
    #[serde(default)]
    pub high: Option<u16>,

    /// Route path rendering the error page.
    pub path: String,
}

impl ErrorPageConfig {
    pub fn high(&self) -> u16 {
        self.high.unwrap_or(self.low)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
