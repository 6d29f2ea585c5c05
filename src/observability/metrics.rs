//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (request count, latency, panics)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `chat_history_requests_total` (counter): requests by method, route, status
//! - `chat_history_request_duration_seconds` (histogram): latency by method, route
//! - `chat_history_panics_total` (counter): panics caught by the recoverer
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for method, route pattern, status code
//! - Recording without an installed exporter is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "chat_history_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "chat_history_request_duration_seconds";
pub const PANICS_TOTAL: &str = "chat_history_panics_total";

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Total HTTP requests handled");
    ::metrics::describe_histogram!(
        REQUEST_DURATION_SECONDS,
        ::metrics::Unit::Seconds,
        "Request latency from pipeline entry to response"
    );
    ::metrics::describe_counter!(PANICS_TOTAL, "Handler panics converted to 500 responses");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let route = route.to_string();
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION_SECONDS, "method" => method, "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Record a panic caught while handling a request.
pub fn record_panic() {
    ::metrics::counter!(PANICS_TOTAL).increment(1);
}
