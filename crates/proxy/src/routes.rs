use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use crate::{proxy::proxy_handler, state::AppState};

pub fn routes() -> Router<AppState> {
    // Edge self-endpoints live under a prefix the origin never serves
    Router::new()
        .route("/_edge/health", get(health))
        .route("/_edge/ready", get(readiness))
        .fallback(proxy_handler)
}

async fn readiness() -> impl IntoResponse {
    (StatusCode::OK, "ready")
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}
