//! # Basket Module
//!
//! Turns a priced breakdown into the itemised basket sent to the gateway.
//!
//! ## Build Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PriceBreakdown (major units, Decimal)                                 │
//! │    price_base, bonus.bonuses[], reduction, tva, boukii_care,           │
//! │    cancellation_insurance, extras.extras[], price_total                │
//! │           │                                                             │
//! │           ▼  negative input? ──► NegativeComponent                     │
//! │  BasketLine { name, quantity, unit_amount (minor units) }              │
//! │    bonuses and reduction become negative lines                         │
//! │    zero-priced / zero-quantity components are skipped                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  diff = price_total - Σ(unit × qty)                                    │
//! │    0           ──► done                                                 │
//! │    1..=10      ──► absorbed into the first line                        │
//! │    otherwise   ──► BasketMismatch (no session is created)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The 1-10 band mirrors the gateway's rounding behaviour and is kept exactly
//! as observed, including that larger drift is an error rather than spread
//! across lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::BASKET_DRIFT_TOLERANCE_CENTS;

// =============================================================================
// Price Breakdown (input)
// =============================================================================

fn default_quantity() -> i64 {
    1
}

/// One named, priced component in major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComponent {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub price: Decimal,
}

impl PriceComponent {
    pub fn new(name: impl Into<String>, quantity: i64, price: Decimal) -> Self {
        PriceComponent {
            name: name.into(),
            quantity,
            price,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BonusList {
    #[serde(default)]
    pub bonuses: Vec<PriceComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtrasList {
    #[serde(default)]
    pub extras: Vec<PriceComponent>,
}

/// Price breakdown of a booking as computed by the booking flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    #[serde(default)]
    pub price_base: Option<PriceComponent>,
    #[serde(default)]
    pub bonus: Option<BonusList>,
    #[serde(default)]
    pub reduction: Option<PriceComponent>,
    #[serde(default)]
    pub tva: Option<PriceComponent>,
    #[serde(default)]
    pub boukii_care: Option<PriceComponent>,
    #[serde(default)]
    pub cancellation_insurance: Option<PriceComponent>,
    #[serde(default)]
    pub extras: Option<ExtrasList>,
    #[serde(default)]
    pub price_total: Option<Decimal>,
}

// =============================================================================
// Basket (output)
// =============================================================================

/// One gateway basket line. `unit_amount` is in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub name: String,
    pub quantity: i64,
    pub unit_amount: Money,
}

impl BasketLine {
    /// Line amount. The builder only accepts lines whose amount fits.
    #[inline]
    pub fn amount(&self) -> Money {
        self.unit_amount * self.quantity
    }
}

/// A basket whose lines sum exactly to `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Basket {
    pub lines: Vec<BasketLine>,
    pub total: Money,
}

impl Basket {
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(BasketLine::amount).sum()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates basket lines and reconciles them against the target total.
///
/// ## Example
/// ```rust
/// use boukii_core::basket::{BasketBuilder, PriceComponent};
/// use boukii_core::money::Money;
/// use rust_decimal::Decimal;
///
/// let mut builder = BasketBuilder::new();
/// builder.add("Private lesson", &PriceComponent::new("", 1, Decimal::new(12000, 2))).unwrap();
/// let basket = builder.build(Money::from_cents(12000)).unwrap();
/// assert_eq!(basket.lines_total().cents(), 12000);
/// ```
#[derive(Debug, Default)]
pub struct BasketBuilder {
    lines: Vec<BasketLine>,
}

impl BasketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the basket for a booking breakdown.
    pub fn from_breakdown(breakdown: &PriceBreakdown) -> CoreResult<Basket> {
        let target = match breakdown.price_total {
            Some(total) => Money::from_decimal(total).ok_or_else(|| CoreError::AmountOutOfRange {
                component: "price_total".to_string(),
            })?,
            None => return Err(CoreError::MissingTotal),
        };

        let mut builder = BasketBuilder::new();

        if let Some(base) = &breakdown.price_base {
            builder.add("price_base", base)?;
        }
        if let Some(bonus) = &breakdown.bonus {
            for b in &bonus.bonuses {
                builder.add_discount("bonus", b)?;
            }
        }
        if let Some(reduction) = &breakdown.reduction {
            builder.add_discount("reduction", reduction)?;
        }
        if let Some(tva) = &breakdown.tva {
            builder.add("tva", tva)?;
        }
        if let Some(care) = &breakdown.boukii_care {
            builder.add("boukii_care", care)?;
        }
        if let Some(insurance) = &breakdown.cancellation_insurance {
            builder.add("cancellation_insurance", insurance)?;
        }
        if let Some(extras) = &breakdown.extras {
            for extra in &extras.extras {
                builder.add("extra", extra)?;
            }
        }

        builder.build(target)
    }

    /// Single-line basket for a voucher purchase: the voucher at face value.
    pub fn for_voucher(label: &str, face_value: Money) -> CoreResult<Basket> {
        if face_value.is_negative() {
            return Err(CoreError::NegativeComponent {
                component: "voucher".to_string(),
            });
        }

        let mut builder = BasketBuilder::new();
        builder.push_line(label, 1, face_value);
        builder.build(face_value)
    }

    /// Adds a chargeable component.
    pub fn add(&mut self, component: &str, item: &PriceComponent) -> CoreResult<()> {
        let unit = Self::unit_amount(component, item)?;
        Self::line_amount(component, unit, item.quantity)?;
        self.push_line(Self::line_name(component, item), item.quantity, unit);
        Ok(())
    }

    /// Adds a bonus or reduction. The input is a magnitude; the line is
    /// negative.
    pub fn add_discount(&mut self, component: &str, item: &PriceComponent) -> CoreResult<()> {
        let unit = Self::unit_amount(component, item)?;
        Self::line_amount(component, unit, item.quantity)?;
        self.push_line(Self::line_name(component, item), item.quantity, -unit);
        Ok(())
    }

    /// Reconciles the lines with `target` and returns the basket.
    pub fn build(mut self, target: Money) -> CoreResult<Basket> {
        if !target.is_positive() {
            return Err(CoreError::MissingTotal);
        }
        if self.lines.is_empty() {
            return Err(CoreError::EmptyBasket);
        }

        let out_of_range = || CoreError::AmountOutOfRange {
            component: "basket".to_string(),
        };
        let actual = self
            .lines
            .iter()
            .try_fold(Money::zero(), |acc, line| {
                line.unit_amount
                    .checked_mul(line.quantity)
                    .and_then(|amount| acc.checked_add(amount))
            })
            .ok_or_else(out_of_range)?;
        let diff = target.checked_sub(actual).ok_or_else(out_of_range)?.cents();

        if diff != 0 {
            if diff.abs() > BASKET_DRIFT_TOLERANCE_CENTS {
                return Err(CoreError::BasketMismatch {
                    expected: target,
                    actual,
                });
            }

            let first = &mut self.lines[0];
            if first.quantity > 1 {
                first.unit_amount = first.amount();
                first.quantity = 1;
            }
            first.unit_amount = first
                .unit_amount
                .checked_add(Money::from_cents(diff))
                .ok_or_else(out_of_range)?;
        }

        Ok(Basket {
            lines: self.lines,
            total: target,
        })
    }

    fn unit_amount(component: &str, item: &PriceComponent) -> CoreResult<Money> {
        if item.price < Decimal::ZERO || item.quantity < 0 {
            return Err(CoreError::NegativeComponent {
                component: component.to_string(),
            });
        }
        Money::from_decimal(item.price).ok_or_else(|| CoreError::AmountOutOfRange {
            component: component.to_string(),
        })
    }

    fn line_amount(component: &str, unit: Money, quantity: i64) -> CoreResult<Money> {
        unit.checked_mul(quantity)
            .ok_or_else(|| CoreError::AmountOutOfRange {
                component: component.to_string(),
            })
    }

    fn line_name<'a>(component: &'a str, item: &'a PriceComponent) -> &'a str {
        let name = item.name.trim();
        if name.is_empty() {
            component
        } else {
            name
        }
    }

    fn push_line(&mut self, name: &str, quantity: i64, unit_amount: Money) {
        if quantity == 0 || unit_amount.is_zero() {
            return;
        }
        self.lines.push(BasketLine {
            name: name.to_string(),
            quantity,
            unit_amount,
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
