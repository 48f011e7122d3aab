//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Price breakdowns arrive in major units:                                │
//! │    base 85.10 + care 4.90 + tva 6.93 + insurance 23.07                  │
//! │                                                                         │
//! │  Summed as f64 and multiplied by 100 they drift by a cent here and     │
//! │  there, and the gateway rejects a basket that does not match the       │
//! │  charge amount.                                                         │
//! │                                                                         │
//! │  OUR SOLUTION: decimal in, integer minor units out                      │
//! │    "85.10" ──► Decimal ──► 8510 (exactly once, at the boundary)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use boukii_core::money::Money;
//!
//! let price = Money::from_cents(12000); // 120.00
//! let doubled = price * 2;
//! assert_eq!(doubled.cents(), 24000);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (centimes for CHF).
///
/// ## Design Decisions
/// - **i64 (signed)**: bonuses and reductions are negative basket lines,
///   voucher debits are negative log amounts
/// - **No currency field**: every amount in a booking shares the school's
///   currency, carried next to the amount where it matters
///
/// ## Where Money is Used
/// ```text
/// PriceBreakdown (major units) ──► BasketLine.unit_amount ──► Basket.total
///                                                                  │
/// Booking.price_total_cents ◄── must match ────────────────────────┘
///
/// Gateway invoice totalAmount ──► Payment.amount_cents
///                             └─► Booking.paid_total_cents (accumulated)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use boukii_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a major-unit decimal into minor units.
    ///
    /// Rounds half away from zero to two decimals first, so `10.005`
    /// becomes `1001`. Returns `None` when the value does not fit in i64.
    ///
    /// ## Example
    /// ```rust
    /// use boukii_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let amount = Money::from_decimal(Decimal::new(8510, 2)).unwrap(); // 85.10
    /// assert_eq!(amount.cents(), 8510);
    /// ```
    pub fn from_decimal(major: Decimal) -> Option<Self> {
        let minor = major
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .checked_mul(Decimal::ONE_HUNDRED)?;
        minor.to_i64().map(Money)
    }

    /// Returns the amount as a major-unit decimal (`12050` → `120.50`).
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    ///
    /// ## Example
    /// ```rust
    /// use boukii_core::money::Money;
    ///
    /// let debit = Money::from_cents(-2500);
    /// assert_eq!(debit.abs().cents(), 2500);
    /// ```
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// `self + other`, or `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `self - other`, or `None` on overflow.
    #[inline]
    pub const fn checked_sub(self, other: Money) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Unit price times quantity, or `None` on overflow.
    ///
    /// ```rust
    /// use boukii_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(3333).checked_mul(3), Some(Money::from_cents(9999)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul(2), None);
    /// ```
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================
//
// Operators saturate at the i64 bounds. Amounts from requests go through the
// checked_* methods instead, which report overflow.

/// Shows the amount in major units without a currency symbol (`120.50`).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
