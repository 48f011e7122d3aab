//! # Validation Module
//!
//! Input validation for the payment flows.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum)                                          │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── Path ids                                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Payment services                                             │
//! │  └── THIS MODULE: amounts, currency codes, redirect URLs,             │
//! │                   gateway transaction ids                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE payrexx_reference                                          │
//! │  └── CHECK remaining_balance_cents <= quantity_cents                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use url::Url;

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest transaction id accepted from a webhook.
pub const MAX_TRANSACTION_ID_LEN: usize = 20;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an ISO 4217 currency code.
///
/// ## Example
/// ```rust
/// use boukii_core::validation::validate_currency;
///
/// assert!(validate_currency("CHF").is_ok());
/// assert!(validate_currency("chf").is_err());
/// assert!(validate_currency("").is_err());
/// ```
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(())
}

/// Validates a gateway transaction id taken from a webhook body.
///
/// Payrexx ids are numeric. Anything else is refused before it can reach a
/// request path.
///
/// ```rust
/// use boukii_core::validation::validate_transaction_id;
///
/// assert!(validate_transaction_id("555").is_ok());
/// assert!(validate_transaction_id("../Gateway/9").is_err());
/// ```
pub fn validate_transaction_id(id: &str) -> ValidationResult<()> {
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "transaction id".to_string(),
        });
    }

    if id.len() > MAX_TRANSACTION_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "transaction id".to_string(),
            max: MAX_TRANSACTION_ID_LEN,
        });
    }

    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "transaction id".to_string(),
            reason: "must contain digits only".to_string(),
        });
    }

    Ok(())
}

/// Validates a redirect target supplied by a caller.
///
/// ## Rules
/// - Must not be empty
/// - Must be an absolute http(s) URL
pub fn validate_redirect_url(url: &str) -> ValidationResult<()> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::Required {
            field: "redirect url".to_string(),
        });
    }

    let invalid = || ValidationError::InvalidFormat {
        field: "redirect url".to_string(),
        reason: "must be an absolute http(s) URL".to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a refund amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed what is still refundable (paid minus already refunded)
pub fn validate_refund_amount(amount: Money, refundable: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "refund amount".to_string(),
        });
    }

    if amount > refundable {
        return Err(ValidationError::InvalidFormat {
            field: "refund amount".to_string(),
            reason: format!("exceeds refundable amount {}", refundable),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
