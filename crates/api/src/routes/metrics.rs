//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — returns Prometheus-formatted selection metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

/// Registers descriptions for the metrics emitted by the selection crate.
pub fn describe() {
    metrics::describe_counter!("trip_selections_total", "Trip selections received");
    metrics::describe_counter!("trip_selections_completed", "Trip selections that completed");
    metrics::describe_counter!(
        "trip_selections_failed",
        "Trip selections that failed, by error code"
    );
    metrics::describe_counter!(
        "trip_selections_rejected_total",
        "Trip selections rejected as duplicates of one in flight"
    );
    metrics::describe_counter!("cart_recoveries_total", "Cart recovery attempts, by leg");
    metrics::describe_histogram!(
        "trip_selection_duration_seconds",
        metrics::Unit::Seconds,
        "Wall-clock duration of admitted selections"
    );
}
