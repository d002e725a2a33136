/*
 * Responsibility
 * - GET /health, GET /ping (liveness; public paths, the gate is skipped)
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn ping() -> &'static str {
    "pong"
}
