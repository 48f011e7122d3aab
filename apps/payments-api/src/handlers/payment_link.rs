//! Payment link endpoints.
//!
//! Links are advisory: when one cannot be created the response carries an
//! empty `url` and the booking flow continues without it.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use boukii_core::basket::PriceBreakdown;
use boukii_core::Buyer;
use boukii_payrexx::RedirectTarget;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BookingLinkRequest {
    pub breakdown: PriceBreakdown,
    #[serde(default)]
    pub buyer: Option<Buyer>,
    #[serde(default)]
    pub redirect: RedirectTarget,
}

#[derive(Debug, Deserialize)]
pub struct VoucherLinkRequest {
    #[serde(default)]
    pub buyer: Option<Buyer>,
    #[serde(default)]
    pub redirect: RedirectTarget,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentLinkResponse {
    /// Hosted payment page, or `""`.
    pub url: String,
}

pub async fn booking_payment_link(
    State(state): State<AppState>,
    Path(booking_id): Path<i64>,
    Json(request): Json<BookingLinkRequest>,
) -> Json<PaymentLinkResponse> {
    let url = state
        .sessions
        .booking_payment_link(booking_id, &request.breakdown, request.buyer, &request.redirect)
        .await;

    Json(PaymentLinkResponse { url })
}

pub async fn voucher_payment_link(
    State(state): State<AppState>,
    Path(voucher_id): Path<i64>,
    Json(request): Json<VoucherLinkRequest>,
) -> Json<PaymentLinkResponse> {
    let url = state
        .sessions
        .voucher_payment_link(voucher_id, request.buyer, &request.redirect)
        .await;

    Json(PaymentLinkResponse { url })
}
