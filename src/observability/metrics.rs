//! Dispatch metrics.
//!
//! # Metrics
//! - `route_kernel_requests_total` (counter): requests by method, outcome, status
//! - `route_kernel_request_duration_seconds` (histogram): dispatch latency by
//!   method and outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the library installs no exporter,
//!   so the calls are no-ops until the embedding binary installs a recorder
//! - Outcomes are `matched`, `not_found` and `redirect`

use std::time::Instant;

use axum::http::StatusCode;

pub const REQUESTS_TOTAL: &str = "route_kernel_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "route_kernel_request_duration_seconds";

/// Record one dispatched request.
pub fn record_dispatch(method: &str, outcome: &'static str, status: StatusCode, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();

    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .record(elapsed);
}
