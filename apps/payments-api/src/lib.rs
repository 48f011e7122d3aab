//! # Boukii Payments API
//!
//! HTTP server for Payrexx payments: webhook reconciliation, payment links
//! and refunds.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Payments API Routes                             │
//! │                                                                         │
//! │  POST /payrexx/webhook             ──► WebhookReconciler   (always OK)  │
//! │  POST /bookings/{id}/payment-link  ──► GatewaySessionService            │
//! │  POST /vouchers/{id}/payment-link  ──► GatewaySessionService            │
//! │  POST /bookings/{id}/refund        ──► RefundService                    │
//! │  GET  /health                      ──► Database                         │
//! │                                                                         │
//! │  background: NotificationDispatcher ──► Mailer                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HTTP_PORT` - HTTP server port (default: 8080)
//! - `DATABASE_PATH` - SQLite database file (default: ./boukii-payments.db)
//! - `PAYREXX_API_DOMAIN` - Payrexx API domain (default: payrexx.com)
//! - `GATEWAY_TIMEOUT_MS` - Bound on every gateway call (default: 5000)
//! - `PANEL_URL` / `APP_URL` - Redirect bases after payment
//! - `OUTBOX_POLL_INTERVAL_SECS` / `OUTBOX_BATCH_SIZE` - Mail dispatch
//! - `MAIL_FROM` - Sender address

pub mod config;
pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use boukii_db::Database;
use boukii_payrexx::{
    Clock, GatewayClient, GatewaySessionService, RedirectConfig, RefundService, WebhookReconciler,
};

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<GatewaySessionService>,
    pub reconciler: Arc<WebhookReconciler>,
    pub refunds: Arc<RefundService>,
}

impl AppState {
    /// Wires the payment services around one gateway client and clock.
    pub fn new(
        db: Database,
        gateway: Arc<dyn GatewayClient>,
        clock: Arc<dyn Clock>,
        config: &ApiConfig,
    ) -> Self {
        let redirects = RedirectConfig {
            panel_url: config.panel_url.clone(),
            app_url: config.app_url.clone(),
        };

        AppState {
            sessions: Arc::new(GatewaySessionService::new(
                db.clone(),
                gateway.clone(),
                redirects,
            )),
            reconciler: Arc::new(WebhookReconciler::new(
                db.clone(),
                gateway.clone(),
                clock.clone(),
                config.gateway_timeout(),
            )),
            refunds: Arc::new(RefundService::new(db.clone(), gateway, clock)),
            db,
        }
    }
}

/// Builds the router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/payrexx/webhook", post(handlers::webhook::payrexx_webhook))
        .route(
            "/bookings/{id}/payment-link",
            post(handlers::payment_link::booking_payment_link),
        )
        .route(
            "/vouchers/{id}/payment-link",
            post(handlers::payment_link::voucher_payment_link),
        )
        .route("/bookings/{id}/refund", post(handlers::refund::refund_booking))
        .route("/health", get(handlers::health::health))
        .with_state(state)
}
