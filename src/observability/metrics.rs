//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): finished requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_retries_total` (counter): retry attempts by operation
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `gateway_breaker_transitions_total` (counter): transitions by target state
//! - `gateway_probe_failures_total` (counter): failed monitor probes
//! - `gateway_channel_rebuilds_total` (counter): channel replacements
//!
//! # Design Decisions
//! - The `metrics` facade keeps updates cheap; without an installed recorder
//!   every call is a no-op, so library code never pays for disabled metrics
//! - Routes are labeled with the matched pattern, not the raw path, to keep
//!   cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter. Call once, inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Count one finished HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_retry(operation: &'static str) {
    counter!("gateway_retries_total", "operation" => operation).increment(1);
}

pub fn record_breaker_transition(to: &'static str) {
    counter!("gateway_breaker_transitions_total", "to" => to).increment(1);
}

pub fn set_breaker_state(state: &'static str) {
    let value = match state {
        "open" => 1.0,
        "half_open" => 2.0,
        _ => 0.0,
    };
    gauge!("gateway_breaker_state").set(value);
}

pub fn record_probe_failure() {
    counter!("gateway_probe_failures_total").increment(1);
}

pub fn record_channel_rebuild() {
    counter!("gateway_channel_rebuilds_total").increment(1);
}
