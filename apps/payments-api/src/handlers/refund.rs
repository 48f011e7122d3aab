//! Refund endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use boukii_core::Money;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// Major units, e.g. `40.00`.
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refunded: bool,
}

/// Refunds part or all of a booking's payment. A refund the gateway
/// accepted is then recorded on the stored transaction snapshot.
pub async fn refund_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let amount = Money::from_decimal(request.amount).ok_or_else(|| {
        ApiError::InvalidRequest(format!("amount {} is not a valid money value", request.amount))
    })?;

    let booking = state
        .db
        .bookings()
        .get_by_id(booking_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Booking {}", booking_id)))?;

    let refunded = state.refunds.refund(&booking, amount).await;

    if refunded {
        // The gateway already moved the money; a failed write is logged, not undone
        if let Err(e) = state.refunds.record_refund(&booking, amount).await {
            error!(booking_id, error = %e, "Refund accepted but not recorded");
        }
    }

    Ok(Json(RefundResponse { refunded }))
}
