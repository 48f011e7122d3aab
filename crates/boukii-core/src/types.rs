//! # Domain Types
//!
//! Entities the payment subsystem reads and writes.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     School      │   │     Booking     │   │   BookingUser   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  payrexx creds  │◄──│  school_id      │◄──│  booking_id     │       │
//! │  │  vat_rate_bps   │   │  price_total    │   │  lifecycle      │       │
//! │  │  terms_url      │   │  paid / total   │   └─────────────────┘       │
//! │  └─────────────────┘   │  reference      │                              │
//! │                        │  lifecycle      │   ┌─────────────────┐       │
//! │  ┌─────────────────┐   └────────┬────────┘   │     Payment     │       │
//! │  │     Voucher     │            │            │  (append-only)  │       │
//! │  │  ─────────────  │   ┌────────▼────────┐   │  booking_id     │       │
//! │  │  quantity       │◄──│   VoucherLog    │   │  amount         │       │
//! │  │  remaining      │   │  amount, status │   │  snapshot       │       │
//! │  │  payed          │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Money columns are integer minor units (`*_cents`); the accessors hand out
//! [`Money`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{BookingStatus, Lifecycle};
use crate::money::Money;
use crate::transaction::TransactionSnapshot;

// =============================================================================
// Payment Method
// =============================================================================

/// How a booking is paid. Stored as its integer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i64)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the school desk.
    Cash = 1,
    /// Web checkout: vouchers are reserved first, the gateway charges the
    /// remainder.
    BoukiiPay = 2,
    /// Payment link sent to the client, paid on the gateway page.
    Online = 3,
    /// Settled outside the system (bank transfer, invoice).
    Other = 4,
    /// Nothing to pay (fully covered or free).
    NoPayment = 5,
}

impl PaymentMethod {
    /// Methods whose confirmation arrives through the gateway webhook.
    pub const fn is_gateway_routed(&self) -> bool {
        matches!(self, PaymentMethod::BoukiiPay | PaymentMethod::Online)
    }

    /// Whether a confirmed payment should also clear the booking's pending
    /// voucher reservations.
    pub const fn settles_pending_vouchers(&self, source: BookingSource) -> bool {
        matches!(self, PaymentMethod::BoukiiPay) && matches!(source, BookingSource::Web)
    }
}

// =============================================================================
// Booking Source
// =============================================================================

/// Channel a booking was created through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum BookingSource {
    /// Public booking page.
    Web,
    /// School back-office.
    Panel,
    /// Monitor/client mobile app.
    App,
}

// =============================================================================
// Gateway Credentials
// =============================================================================

/// Per-school Payrexx credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub instance: String,
    pub api_key: String,
}

impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("instance", &self.instance)
            .field("api_key", &"***")
            .finish()
    }
}

// =============================================================================
// School
// =============================================================================

/// A ski school. Owns the gateway account its bookings are paid into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct School {
    pub id: i64,
    pub name: String,
    /// ISO 4217 code (CHF, EUR).
    pub currency: String,
    #[serde(skip_serializing)]
    pub payrexx_instance: Option<String>,
    #[serde(skip_serializing)]
    pub payrexx_key: Option<String>,
    /// VAT rate in basis points (810 = 8.1%).
    pub vat_rate_bps: i64,
    /// Legal terms shown on the hosted payment page.
    pub terms_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl School {
    /// Returns the credentials when both instance and key are set and
    /// non-blank.
    pub fn gateway_credentials(&self) -> Option<GatewayCredentials> {
        let instance = self.payrexx_instance.as_deref().map(str::trim)?;
        let api_key = self.payrexx_key.as_deref().map(str::trim)?;
        if instance.is_empty() || api_key.is_empty() {
            return None;
        }
        Some(GatewayCredentials {
            instance: instance.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// VAT rate as a percentage for the gateway (810 bps → 8.1).
    pub fn vat_rate_percent(&self) -> Option<f64> {
        if self.vat_rate_bps <= 0 {
            None
        } else {
            Some(self.vat_rate_bps as f64 / 100.0)
        }
    }
}

// =============================================================================
// Client / Buyer
// =============================================================================

/// A school client (the person who books and pays).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    /// ISO 3166 alpha-2.
    pub country: Option<String>,
}

/// Contact fields prefilled on the hosted payment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub forename: String,
    pub surname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postcode: Option<String>,
    pub place: Option<String>,
    pub country: Option<String>,
}

impl From<&Client> for Buyer {
    fn from(client: &Client) -> Self {
        Buyer {
            forename: client.first_name.clone(),
            surname: client.last_name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            street: client.address.clone(),
            postcode: client.zip.clone(),
            place: client.city.clone(),
            country: client.country.clone(),
        }
    }
}

// =============================================================================
// Booking
// =============================================================================

/// Aggregate purchase root.
///
/// ## Invariants
/// - `payrexx_reference` is generated once and never changes
/// - `paid` only moves false → true
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Booking {
    pub id: i64,
    pub school_id: i64,
    pub client_main_id: i64,
    pub price_total_cents: i64,
    pub currency: String,
    pub paid: bool,
    /// Accumulated across partial payments.
    pub paid_total_cents: i64,
    pub payment_method_id: PaymentMethod,
    pub payrexx_reference: Option<String>,
    /// JSON [`TransactionSnapshot`] of the last confirmed transaction.
    pub payrexx_transaction: Option<String>,
    pub source: BookingSource,
    pub status: BookingStatus,
    pub lifecycle: Lifecycle,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[inline]
    pub fn price_total(&self) -> Money {
        Money::from_cents(self.price_total_cents)
    }

    #[inline]
    pub fn paid_total(&self) -> Money {
        Money::from_cents(self.paid_total_cents)
    }

    /// Parses the stored snapshot. A malformed blob reads as absent.
    pub fn transaction_snapshot(&self) -> Option<TransactionSnapshot> {
        self.payrexx_transaction
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.lifecycle == Lifecycle::Cancelled
    }
}

/// One participant slot within a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BookingUser {
    pub id: i64,
    pub booking_id: i64,
    pub client_id: i64,
    pub lifecycle: Lifecycle,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Voucher
// =============================================================================

/// A prepaid credit note.
///
/// ## Invariant
/// `remaining_balance = quantity - Σ cleared debits`, so it never exceeds
/// `quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    /// Face value.
    pub quantity_cents: i64,
    pub remaining_balance_cents: i64,
    pub payed: bool,
    pub client_id: Option<i64>,
    pub school_id: i64,
    pub payrexx_reference: Option<String>,
    pub payrexx_transaction: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    #[inline]
    pub fn quantity(&self) -> Money {
        Money::from_cents(self.quantity_cents)
    }

    #[inline]
    pub fn remaining_balance(&self) -> Money {
        Money::from_cents(self.remaining_balance_cents)
    }

    pub fn transaction_snapshot(&self) -> Option<TransactionSnapshot> {
        self.payrexx_transaction
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Settlement state of a voucher log. A cleared log stores `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum VoucherLogStatus {
    /// Reserved against the voucher, not yet settled.
    Pending,
}

/// One debit/credit against a voucher, tied to a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VoucherLog {
    pub id: i64,
    pub voucher_id: i64,
    pub booking_id: i64,
    /// Debits are negative.
    pub amount_cents: i64,
    pub status: Option<VoucherLogStatus>,
    pub created_at: DateTime<Utc>,
}

impl VoucherLog {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == Some(VoucherLogStatus::Pending)
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
}

/// Settlement record, written once per confirmed monetary event and never
/// updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub school_id: i64,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub payrexx_reference: String,
    /// JSON [`TransactionSnapshot`].
    pub payrexx_transaction: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Notification Outbox
// =============================================================================

/// Kind of deferred notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmation,
    VoucherConfirmation,
}

/// A notification queued in the same transaction as the settlement that
/// caused it, delivered later by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct NotificationOutboxEntry {
    pub id: String,
    pub kind: NotificationKind,
    pub recipient: String,
    /// JSON body handed to the mailer.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// A notification to enqueue (id and bookkeeping are assigned on insert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub payload: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
