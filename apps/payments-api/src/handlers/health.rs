//! Health check endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::AppState;

/// Reports whether the database answers and its schema is current.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let migrations = if state.db.health_check().await {
        state.db.migration_status().await.ok()
    } else {
        None
    };

    match migrations {
        Some((total, applied)) if applied >= total => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "payments-api",
                "version": env!("CARGO_PKG_VERSION"),
                "migrations": { "applied": applied, "total": total }
            })),
        ),
        Some((total, applied)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "migrations_pending",
                "service": "payments-api",
                "migrations": { "applied": applied, "total": total }
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "service": "payments-api" })),
        ),
    }
}
