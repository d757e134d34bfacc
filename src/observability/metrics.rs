//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_dispatch_total` (counter): requests by dispatch `outcome`
//! - `switchyard_error_redispatch_total` (counter): error page attempts by `result`
//! - `switchyard_registrations_total` (counter): registrations by `kind`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder the calls are no-ops
//! - The Prometheus exporter serves its own scrape endpoint

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const DISPATCH_TOTAL: &str = "switchyard_dispatch_total";
pub const ERROR_REDISPATCH_TOTAL: &str = "switchyard_error_redispatch_total";
pub const REGISTRATIONS_TOTAL: &str = "switchyard_registrations_total";

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    metrics::describe_counter!(DISPATCH_TOTAL, "Requests by dispatch outcome");
    metrics::describe_counter!(ERROR_REDISPATCH_TOTAL, "Error page redispatch attempts");
    metrics::describe_counter!(REGISTRATIONS_TOTAL, "Route and filter registrations");

    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!(DISPATCH_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_error_redispatch(result: &'static str) {
    metrics::counter!(ERROR_REDISPATCH_TOTAL, "result" => result).increment(1);
}

pub fn record_registration(kind: &'static str) {
    metrics::counter!(REGISTRATIONS_TOTAL, "kind" => kind).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_recorded() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_dispatch("dispatched");
            record_dispatch("dispatched");
            record_registration("filter");
            record_error_redispatch("recovered");
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"switchyard_dispatch_total{outcome="dispatched"} 2"#));
        assert!(rendered.contains(r#"switchyard_registrations_total{kind="filter"} 1"#));
        assert!(rendered.contains(r#"switchyard_error_redispatch_total{result="recovered"} 1"#));
    }
}
