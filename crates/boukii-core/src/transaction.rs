//! # Gateway Transaction Types
//!
//! Shapes of what the gateway sends (webhook body) and returns (authoritative
//! transaction fetch), plus the normalised snapshot stored on bookings,
//! vouchers and payments.
//!
//! ## Flow
//! ```text
//! webhook body ──► WebhookPayload.transaction ──► {id, status, referenceId, amount}
//!                                                   │ (never trusted alone)
//!                                                   ▼
//! retrieve_transaction(id) ──► GatewayTransaction {status, time, invoice, payment}
//!                                                   │
//!                                                   ▼
//!                          TransactionSnapshot {id, time, totalAmount, refundedAmount,
//!                                               currency, brand, referenceId}
//! ```
//!
//! Form-encoded webhooks deliver every scalar as a string, so ids and amounts
//! accept either JSON numbers or numeric strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Transaction Status
// =============================================================================

/// Transaction status as reported by Payrexx.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionStatus {
    Waiting,
    Confirmed,
    Cancelled,
    Declined,
    Authorized,
    Reserved,
    Refunded,
    PartiallyRefunded,
    RefundPending,
    Chargeback,
    Error,
    Uncaptured,
    /// Any status this crate does not know about.
    Unknown(String),
}

impl TransactionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionStatus::Waiting => "waiting",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Declined => "declined",
            TransactionStatus::Authorized => "authorized",
            TransactionStatus::Reserved => "reserved",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::PartiallyRefunded => "partially-refunded",
            TransactionStatus::RefundPending => "refund_pending",
            TransactionStatus::Chargeback => "chargeback",
            TransactionStatus::Error => "error",
            TransactionStatus::Uncaptured => "uncaptured",
            TransactionStatus::Unknown(raw) => raw,
        }
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionStatus::Confirmed)
    }

    /// Whether a refund request went through (fully or partially).
    #[inline]
    pub fn is_refund_success(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Refunded | TransactionStatus::PartiallyRefunded
        )
    }
}

impl From<String> for TransactionStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "waiting" => TransactionStatus::Waiting,
            "confirmed" => TransactionStatus::Confirmed,
            "cancelled" => TransactionStatus::Cancelled,
            "declined" => TransactionStatus::Declined,
            "authorized" => TransactionStatus::Authorized,
            "reserved" => TransactionStatus::Reserved,
            "refunded" => TransactionStatus::Refunded,
            "partially-refunded" => TransactionStatus::PartiallyRefunded,
            "refund_pending" => TransactionStatus::RefundPending,
            "chargeback" => TransactionStatus::Chargeback,
            "error" => TransactionStatus::Error,
            "uncaptured" => TransactionStatus::Uncaptured,
            _ => TransactionStatus::Unknown(raw),
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(raw: &str) -> Self {
        TransactionStatus::from(raw.to_string())
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Lenient scalar decoding
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Str(String),
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|v| match v {
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => format!("{}", f),
            Scalar::Str(s) => s.trim().to_string(),
        })
        .filter(|s| !s.is_empty()))
}

fn lenient_minor_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Scalar::Int(i) => Some(i),
        Scalar::Float(f) if f.is_finite() => Some(f.round() as i64),
        Scalar::Float(_) => None,
        Scalar::Str(s) => s.trim().parse::<i64>().ok(),
    }))
}

// =============================================================================
// Webhook Payload
// =============================================================================

/// Inbound webhook body. Only the `transaction` object matters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub transaction: Option<WebhookTransaction>,
}

/// The claims a webhook makes. Used to locate the target and the
/// transaction id, never to decide the outcome.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookTransaction {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Minor units.
    #[serde(default, deserialize_with = "lenient_minor_amount")]
    pub amount: Option<i64>,
}

impl WebhookTransaction {
    pub fn claims_confirmed(&self) -> bool {
        self.status
            .as_ref()
            .map(TransactionStatus::is_confirmed)
            .unwrap_or(false)
    }
}

// =============================================================================
// Authoritative Transaction
// =============================================================================

/// A transaction as returned by the gateway's retrieve endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayTransaction {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub status: TransactionStatus,
    /// Gateway-local timestamp, kept verbatim.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub invoice: Option<TransactionInvoice>,
    #[serde(default)]
    pub payment: Option<TransactionPayment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInvoice {
    #[serde(default, deserialize_with = "lenient_minor_amount")]
    pub total_amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_minor_amount")]
    pub refunded_amount: Option<i64>,
    #[serde(default)]
    pub currency_alpha3: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayment {
    #[serde(default)]
    pub brand: Option<String>,
}

// =============================================================================
// Snapshot
// =============================================================================

/// Normalised facts about a confirmed transaction. Settlement stores it
/// wholesale; refunds only bump `refundedAmount` in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSnapshot {
    pub id: String,
    pub time: String,
    /// Minor units.
    pub total_amount: i64,
    /// Minor units.
    pub refunded_amount: i64,
    pub currency: Option<String>,
    pub brand: Option<String>,
    pub reference_id: String,
}

impl TransactionSnapshot {
    /// Builds the snapshot from the authoritative transaction.
    ///
    /// The webhook's own `amount` is used only when the fetched invoice has
    /// no total. A missing gateway time falls back to `now`.
    pub fn normalize(
        tx: &GatewayTransaction,
        transaction_id: &str,
        reference_id: &str,
        webhook_amount: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        let invoice = tx.invoice.clone().unwrap_or_default();

        TransactionSnapshot {
            id: tx.id.clone().unwrap_or_else(|| transaction_id.to_string()),
            time: tx
                .time
                .clone()
                .unwrap_or_else(|| now.format("%Y-%m-%d %H:%M:%S").to_string()),
            total_amount: invoice.total_amount.or(webhook_amount).unwrap_or(0),
            refunded_amount: invoice.refunded_amount.unwrap_or(0),
            currency: invoice.currency_alpha3,
            brand: tx.payment.as_ref().and_then(|p| p.brand.clone()),
            reference_id: reference_id.to_string(),
        }
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount)
    }

    #[inline]
    pub fn refunded(&self) -> Money {
        Money::from_cents(self.refunded_amount)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
