//! Liveness endpoint.

use axum::Json;

/// Health check.
///
/// # Returns
/// - 200 OK: `{"status": "healthy", "version": "..."}`
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
