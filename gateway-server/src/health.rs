use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// `GET /health` — always 200 while the process is up.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /health/live` — liveness probe, never checks dependencies.
pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

/// `GET /health/ready` — 200 only if both stores answer their health probe.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let session_ok = state.session_store.is_healthy().await;
    let rate_limit_ok = state.rate_limit_store.is_healthy().await;

    if session_ok && rate_limit_ok {
        (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response()
    } else {
        let reason = match (session_ok, rate_limit_ok) {
            (false, false) => "session store and rate limit store unavailable",
            (false, true) => "session store unavailable",
            (true, false) => "rate limit store unavailable",
            (true, true) => unreachable!(),
        };
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not_ready", "reason": reason }))).into_response()
    }
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = gateway_observability::prometheus_exporter::render_metrics(&state.metrics);
    ([("content-type", "text/plain; version=0.0.4")], body)
}
