//! # Payment Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Payment Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Preconditions  │  │    Gateway      │  │    Reconciliation       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Missing        │  │  Transport      │  │  TransactionFetch       │ │
//! │  │   Credentials   │  │  Timeout        │  │  ReconciliationTarget   │ │
//! │  │  BasketMismatch │  │  Api            │  │   NotFound              │ │
//! │  │  NoTransaction  │  │  Decode         │  │  RefundRejected         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session creation and refunds also expose degrading wrappers that turn any
//! of these into `""` / `false` after logging.

use std::time::Duration;
use thiserror::Error;

use boukii_core::{CoreError, Money, TransactionStatus, ValidationError};
use boukii_db::DbError;

/// Result type alias for payment service operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

// =============================================================================
// Gateway Error
// =============================================================================

/// Failures talking to the gateway's HTTP API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, TLS or protocol failure.
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// No response within the configured bound.
    #[error("Gateway request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The gateway answered but refused the request.
    #[error("Gateway error (HTTP {status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected gateway response: {0}")]
    Decode(String),

    /// A success envelope without data.
    #[error("Gateway returned no data")]
    EmptyResponse,

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    /// The API key could not be used to sign the request.
    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidUrl(err.to_string())
    }
}

impl GatewayError {
    /// Maps a reqwest error, keeping timeouts distinct.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(timeout)
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

// =============================================================================
// Payment Error
// =============================================================================

/// Payment service error taxonomy.
#[derive(Debug, Error)]
pub enum PaymentError {
    // =========================================================================
    // Preconditions
    // =========================================================================
    /// The school has no gateway instance or key configured.
    #[error("School {school_id} is not configured for Payrexx")]
    MissingCredentials { school_id: i64 },

    /// The basket does not reconcile with the total beyond tolerance.
    #[error("Basket total {actual} does not match expected {expected}")]
    BasketMismatch { expected: Money, actual: Money },

    /// Any other basket rule (empty basket, missing total, negative line).
    #[error("Invalid basket: {0}")]
    Basket(CoreError),

    /// The booking has no stored transaction to refund.
    #[error("Booking {booking_id} has no gateway transaction")]
    NoTransaction { booking_id: i64 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Reconciliation
    // =========================================================================
    /// The authoritative re-fetch failed or did not confirm.
    #[error("Transaction {transaction_id} could not be verified: {reason}")]
    TransactionFetch {
        transaction_id: String,
        reason: String,
    },

    /// The reference matches neither a booking nor a voucher.
    #[error("No booking or voucher for reference '{reference}'")]
    ReconciliationTargetNotFound { reference: String },

    /// The gateway did not report the refund as done.
    #[error("Refund rejected with status {status}")]
    RefundRejected { status: TransactionStatus },

    // =========================================================================
    // Wrapped
    // =========================================================================
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<CoreError> for PaymentError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BasketMismatch { expected, actual } => {
                PaymentError::BasketMismatch { expected, actual }
            }
            CoreError::Validation(v) => PaymentError::Validation(v),
            other => PaymentError::Basket(other),
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::Serialization(err.to_string())
    }
}

impl PaymentError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        PaymentError::NotFound { entity, id }
    }

    /// Returns true for caller-side problems (bad input, unconfigured
    /// school) as opposed to gateway or storage failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaymentError::MissingCredentials { .. }
                | PaymentError::BasketMismatch { .. }
                | PaymentError::Basket(_)
                | PaymentError::NoTransaction { .. }
                | PaymentError::NotFound { .. }
                | PaymentError::Validation(_)
        )
    }
}
