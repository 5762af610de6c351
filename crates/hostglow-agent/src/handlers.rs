//! HTTP request handlers: exposition endpoint and health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use hostglow_core::registry::MetricRegistry;
use hostglow_core::render;

// ============================================================
// Health
// ============================================================

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Metrics
// ============================================================

/// GET /metrics: renders the registry snapshot in the Prometheus text
/// format. The content type carries the format version.
pub(crate) async fn handle_metrics(
    State(registry): State<Arc<MetricRegistry>>,
) -> impl IntoResponse {
    let body = render::render(&registry.snapshot());
    ([(header::CONTENT_TYPE, render::CONTENT_TYPE)], body)
}
