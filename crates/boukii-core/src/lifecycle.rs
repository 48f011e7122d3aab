//! # Lifecycle Module
//!
//! Cancellation state of bookings and booking users, and the booking status
//! derived from it.
//!
//! ## State Axes
//! ```text
//! Payment axis:     Unreferenced ──► PendingPayment ──► Paid
//!                   (no reference)   (reference set)    (paid = true, final)
//!
//! Lifecycle axis:   Active ◄──────────────► Cancelled
//!                     ▲      cancel()          │
//!                     └──── resurrect() ───────┘   (late confirmed payment)
//!
//! Derived status (from the booking users):
//!   all users cancelled              → AllCancelled  (3)
//!   booking active, some cancelled   → SomeCancelled (2)
//!   booking active, none cancelled   → Confirmed     (0)
//!   anything else                    → unchanged
//! ```

use serde::{Deserialize, Serialize};

/// Cancellation state of a booking or booking user.
///
/// `Unknown` covers rows whose state could not be established (legacy data);
/// it is neither counted as cancelled nor as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Active,
    Cancelled,
    Unknown,
}

impl Lifecycle {
    /// Cancels an active row. Other states are left alone.
    pub const fn cancel(self) -> Self {
        match self {
            Lifecycle::Active => Lifecycle::Cancelled,
            other => other,
        }
    }

    /// Brings a row back after a payment confirmed it. Always ends `Active`.
    pub const fn resurrect(self) -> Self {
        Lifecycle::Active
    }

    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Lifecycle::Cancelled)
    }

    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// Booking status as seen by the back-office, stored as its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i64)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed = 0,
    SomeCancelled = 2,
    AllCancelled = 3,
}

/// Derives the booking status from the booking's own lifecycle and those of
/// its users.
///
/// Pure and idempotent: applying it twice to the same inputs gives the same
/// result as applying it once.
///
/// ## Example
/// ```rust
/// use boukii_core::lifecycle::{derive_booking_status, BookingStatus, Lifecycle};
///
/// let users = [Lifecycle::Active, Lifecycle::Cancelled];
/// let status = derive_booking_status(BookingStatus::Confirmed, Lifecycle::Active, &users);
/// assert_eq!(status, BookingStatus::SomeCancelled);
/// ```
pub fn derive_booking_status(
    current: BookingStatus,
    booking: Lifecycle,
    users: &[Lifecycle],
) -> BookingStatus {
    let cancelled = users.iter().filter(|u| u.is_cancelled()).count();

    if !users.is_empty() && cancelled == users.len() {
        return BookingStatus::AllCancelled;
    }

    if booking.is_active() {
        return if cancelled > 0 {
            BookingStatus::SomeCancelled
        } else {
            BookingStatus::Confirmed
        };
    }

    current
}

// =============================================================================
// Unit Tests
// =============================================================================
