//! # Core Errors
//!
//! Rule violations found before any I/O happens. Higher layers wrap these:
//! `PaymentError` lifts [`CoreError::BasketMismatch`] and
//! [`CoreError::Validation`] into its own variants, and the HTTP layer maps
//! them to `422`.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while building baskets or converting
/// amounts.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The itemised basket does not add up to the amount to charge.
    ///
    /// ## When This Occurs
    /// ```text
    /// price_total = 120.00
    /// Σ lines     = 119.50   diff = 50 minor units
    ///      │
    ///      ▼
    /// |diff| > tolerance (10) ──► BasketMismatch { expected: 120.00, actual: 119.50 }
    /// ```
    /// Small rounding drift is absorbed instead; see `basket`.
    #[error("Basket total {actual} does not match expected {expected}")]
    BasketMismatch { expected: Money, actual: Money },

    /// Every component was zero or absent.
    #[error("Basket has no chargeable lines")]
    EmptyBasket,

    /// The breakdown carries no usable total.
    #[error("Price breakdown has no total")]
    MissingTotal,

    /// A component carried a negative amount where only magnitudes are
    /// accepted (bonuses and reductions are negated by the builder).
    #[error("Component {component} has a negative amount")]
    NegativeComponent { component: String },

    /// A major-unit amount does not fit in minor units.
    #[error("Amount for {component} is out of range")]
    AmountOutOfRange { component: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rejected input (redirect URLs, currency codes, refund amounts).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
