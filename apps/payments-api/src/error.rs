//! Error types for the Payments API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use boukii_db::DbError;
use boukii_payrexx::PaymentError;

/// Payments API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Payment(PaymentError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Database(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Payment(e) if e.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Payment(PaymentError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Payment(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
