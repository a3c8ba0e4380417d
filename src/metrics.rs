//! Prometheus metrics registration

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and describe the metrics this service
/// emits. Called once at startup.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    describe_counter!(
        "http_requests_total",
        "Total HTTP requests by method, path and status"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency by method and path"
    );
    describe_counter!(
        "bidding_sessions_created_total",
        "Bidding sessions opened"
    );
    describe_counter!(
        "bidding_bids_placed_total",
        "Accepted bids by kind (manual or auto)"
    );
    describe_counter!(
        "bidding_sessions_finalized_total",
        "Sessions settled with a winner, by finalization reason"
    );
    describe_counter!(
        "bidding_sessions_expired_total",
        "Sessions that timed out with no bids"
    );
    describe_counter!(
        "bidding_sessions_cancelled_total",
        "Sessions aborted by an administrator"
    );

    handle
}
