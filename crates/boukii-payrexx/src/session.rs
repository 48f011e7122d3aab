//! # Gateway Session Service
//!
//! Turns a booking or voucher checkout into a hosted payment page URL.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_booking_session(booking_id, breakdown, buyer, redirect)         │
//! │       │                                                                 │
//! │       ├── school credentials ────────── missing ──► MissingCredentials  │
//! │       ├── BasketBuilder::from_breakdown ─ drift ──► BasketMismatch      │
//! │       ├── basket total ≠ booking price ─────────► BasketMismatch      │
//! │       │                                  (no outbound call made)        │
//! │       ├── ensure_reference("Boukii #42")  (generated once, then reused) │
//! │       ├── redirect target ──► success / failed / cancel URLs            │
//! │       ▼                                                                 │
//! │  GatewayClient::create_session ──► link                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `booking_payment_link` / `voucher_payment_link` wrap the typed calls and
//! return an empty string on any failure, after logging it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::error::{PaymentError, PaymentResult};
use crate::gateway::{GatewayClient, RedirectUrls, SessionRequest};
use boukii_core::basket::{BasketBuilder, PriceBreakdown};
use boukii_core::reference::{booking_reference, voucher_reference};
use boukii_core::validation::{validate_currency, validate_redirect_url};
use boukii_core::{Buyer, GatewayCredentials, School};
use boukii_db::Database;

// =============================================================================
// Redirects
// =============================================================================

/// Which front-end the buyer returns to after the hosted page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectTarget {
    /// Back-office panel.
    Panel,
    /// Mobile app.
    App,
    /// Caller-supplied page; `?status=` is appended.
    Custom(String),
    #[default]
    None,
}

/// Base URLs of the front-ends.
#[derive(Debug, Clone, Default)]
pub struct RedirectConfig {
    pub panel_url: Option<String>,
    pub app_url: Option<String>,
}

const OUTCOMES: [&str; 3] = ["success", "failed", "cancel"];

impl RedirectTarget {
    /// Resolves the three redirect URLs.
    ///
    /// ```text
    /// Panel        ──► {panel_url}/payment/success | failed | cancel
    /// App          ──► {app_url}/payment/success | failed | cancel
    /// Custom(url)  ──► {url}?status=success | failed | cancel
    /// None         ──► no redirects (gateway default pages)
    /// ```
    pub fn resolve(&self, config: &RedirectConfig) -> PaymentResult<RedirectUrls> {
        let urls: Option<[String; 3]> = match self {
            RedirectTarget::Panel => config.panel_url.as_deref().map(Self::under_payment),
            RedirectTarget::App => config.app_url.as_deref().map(Self::under_payment),
            RedirectTarget::Custom(url) => {
                validate_redirect_url(url)?;
                let separator = if url.contains('?') { '&' } else { '?' };
                Some(OUTCOMES.map(|o| format!("{}{}status={}", url, separator, o)))
            }
            RedirectTarget::None => None,
        };

        Ok(match urls {
            Some([success, failed, cancel]) => RedirectUrls {
                success: Some(success),
                failed: Some(failed),
                cancel: Some(cancel),
            },
            None => RedirectUrls::default(),
        })
    }

    fn under_payment(base: &str) -> [String; 3] {
        let base = base.trim_end_matches('/');
        OUTCOMES.map(|o| format!("{}/payment/{}", base, o))
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct GatewaySessionService {
    db: Database,
    gateway: Arc<dyn GatewayClient>,
    redirects: RedirectConfig,
    span: Span,
}

impl GatewaySessionService {
    pub fn new(db: Database, gateway: Arc<dyn GatewayClient>, redirects: RedirectConfig) -> Self {
        GatewaySessionService {
            db,
            gateway,
            redirects,
            span: info_span!("payments", component = "session"),
        }
    }

    /// Creates the hosted payment page for a booking.
    pub async fn create_booking_session(
        &self,
        booking_id: i64,
        breakdown: &PriceBreakdown,
        buyer: Option<Buyer>,
        redirect: &RedirectTarget,
    ) -> PaymentResult<String> {
        async {
            let booking = self
                .db
                .bookings()
                .get_by_id(booking_id)
                .await?
                .ok_or_else(|| PaymentError::not_found("Booking", booking_id))?;
            let (school, credentials) = self.school_credentials(booking.school_id).await?;

            validate_currency(&booking.currency)?;
            let basket = BasketBuilder::from_breakdown(breakdown)?;
            // The breakdown comes from the caller; the booking row decides the charge
            if basket.total != booking.price_total() {
                return Err(PaymentError::BasketMismatch {
                    expected: booking.price_total(),
                    actual: basket.total,
                });
            }
            let redirects = redirect.resolve(&self.redirects)?;

            let reference = self
                .db
                .bookings()
                .ensure_reference(booking_id, &booking_reference(booking_id))
                .await?;

            let request = SessionRequest {
                purpose: Some(format!("{} - {}", school.name, reference)),
                reference_id: reference,
                amount: basket.total,
                currency: booking.currency.clone(),
                basket: basket.lines,
                buyer,
                redirects,
                vat_rate: school.vat_rate_percent(),
                terms_url: school.terms_url.clone(),
            };

            let session = self.gateway.create_session(&credentials, &request).await?;

            info!(
                booking_id,
                reference = %request.reference_id,
                amount = %request.amount,
                "Payment link created"
            );
            Ok(session.link)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Creates the hosted payment page for a voucher purchase.
    pub async fn create_voucher_session(
        &self,
        voucher_id: i64,
        buyer: Option<Buyer>,
        redirect: &RedirectTarget,
    ) -> PaymentResult<String> {
        async {
            let voucher = self
                .db
                .vouchers()
                .get_by_id(voucher_id)
                .await?
                .ok_or_else(|| PaymentError::not_found("Voucher", voucher_id))?;
            let (school, credentials) = self.school_credentials(voucher.school_id).await?;

            validate_currency(&school.currency)?;
            let label = format!("Voucher {}", voucher.code);
            let basket = BasketBuilder::for_voucher(&label, voucher.quantity())?;
            let redirects = redirect.resolve(&self.redirects)?;

            let reference = self
                .db
                .vouchers()
                .ensure_reference(voucher_id, &voucher_reference(voucher_id))
                .await?;

            let request = SessionRequest {
                purpose: Some(format!("{} - {}", school.name, label)),
                reference_id: reference,
                amount: basket.total,
                currency: school.currency.clone(),
                basket: basket.lines,
                buyer,
                redirects,
                vat_rate: None,
                terms_url: school.terms_url.clone(),
            };

            let session = self.gateway.create_session(&credentials, &request).await?;

            info!(
                voucher_id,
                reference = %request.reference_id,
                amount = %request.amount,
                "Voucher payment link created"
            );
            Ok(session.link)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Degrading form of [`Self::create_booking_session`]: `""` on failure.
    pub async fn booking_payment_link(
        &self,
        booking_id: i64,
        breakdown: &PriceBreakdown,
        buyer: Option<Buyer>,
        redirect: &RedirectTarget,
    ) -> String {
        match self
            .create_booking_session(booking_id, breakdown, buyer, redirect)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                let _guard = self.span.enter();
                warn!(booking_id, error = %e, "No payment link available");
                String::new()
            }
        }
    }

    /// Degrading form of [`Self::create_voucher_session`]: `""` on failure.
    pub async fn voucher_payment_link(
        &self,
        voucher_id: i64,
        buyer: Option<Buyer>,
        redirect: &RedirectTarget,
    ) -> String {
        match self.create_voucher_session(voucher_id, buyer, redirect).await {
            Ok(link) => link,
            Err(e) => {
                let _guard = self.span.enter();
                warn!(voucher_id, error = %e, "No voucher payment link available");
                String::new()
            }
        }
    }

    async fn school_credentials(&self, school_id: i64) -> PaymentResult<(School, GatewayCredentials)> {
        let school = self
            .db
            .schools()
            .get_by_id(school_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("School", school_id))?;
        let credentials = school
            .gateway_credentials()
            .ok_or(PaymentError::MissingCredentials { school_id })?;
        Ok((school, credentials))
    }
}

// =============================================================================
// Tests
// =============================================================================
