//! # boukii-core: Pure Payment Logic for Boukii
//!
//! Everything the payment flows decide without touching a database or the
//! network: basket math, lifecycle rules, references, gateway payload shapes
//! and snapshot normalisation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Boukii Payments Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    payments-api (axum)                          │   │
//! │  │   /payrexx/webhook   /bookings/{id}/payment-link   /refund      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    boukii-payrexx (services)                    │   │
//! │  │   GatewaySessionService  WebhookReconciler  RefundService       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ boukii-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  basket   │  │ lifecycle │  │transaction│  │   │
//! │  │   │  Booking  │  │  Builder  │  │ resurrect │  │ Snapshot  │  │   │
//! │  │   │  Voucher  │  │ tolerance │  │  status   │  │  Webhook  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    boukii-db (Database Layer)                   │   │
//! │  │          SQLite queries, migrations, settlement transaction     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities (Booking, Voucher, Payment, School, ...)
//! - [`money`] - Integer minor-unit money
//! - [`basket`] - Price breakdown → gateway basket
//! - [`lifecycle`] - Cancellation state and derived booking status
//! - [`reference`] - Gateway reference format and normalisation
//! - [`transaction`] - Webhook / gateway transaction shapes, snapshots
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use boukii_core::basket::{BasketBuilder, PriceBreakdown, PriceComponent};
//! use rust_decimal::Decimal;
//!
//! let breakdown = PriceBreakdown {
//!     price_base: Some(PriceComponent::new("Private lesson", 1, Decimal::new(11995, 2))),
//!     price_total: Some(Decimal::new(12000, 2)),
//!     ..Default::default()
//! };
//!
//! // 5 minor units of drift are absorbed into the first line
//! let basket = BasketBuilder::from_breakdown(&breakdown).unwrap();
//! assert_eq!(basket.lines_total().cents(), 12000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod basket;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod reference;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{BookingStatus, Lifecycle};
pub use money::Money;
pub use transaction::{GatewayTransaction, TransactionSnapshot, TransactionStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest basket drift, in minor units, silently absorbed into the first
/// basket line.
///
/// Matches the gateway's observed rounding. Anything larger is a
/// `CoreError::BasketMismatch`.
pub const BASKET_DRIFT_TOLERANCE_CENTS: i64 = 10;
