use axum::{response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

/// Liveness check. Does not touch the database.
#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "time": Utc::now().to_rfc3339(),
    }))
}
