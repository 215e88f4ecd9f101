//! `GET /metrics` in Prometheus text format, rendered from the recorder
//! handle kept in the router state.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
}

/// Scrape endpoint; public like `/health`.
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> Response {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.handle.render()).into_response()
}
