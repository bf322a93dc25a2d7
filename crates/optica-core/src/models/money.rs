//! Money arithmetic.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::LineItem;

/// Highest unit price a product or a price override may carry.
pub const MAX_PRICE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);

/// An amount left the range [`Decimal`] can represent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Amount out of range")]
pub struct AmountOverflow;

/// True when `amount` has no fraction of a cent.
pub fn is_whole_cents(amount: Decimal) -> bool {
    round_money(amount) == amount
}

/// Round an amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a float from the UI shell into an exact amount (cents).
pub fn money_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(round_money)
}

/// Convert a tax rate from the UI shell (e.g. `0.15`).
pub fn rate_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Decimal::from_f64(value).map(|rate| rate.round_dp(4))
}

/// Lossy conversion for display in the UI shell.
pub fn money_to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// Derived sale amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
        }
    }
}

impl Totals {
    /// Recompute from scratch: subtotal is the sum of line totals,
    /// tax = round(subtotal × rate), total = round(subtotal + tax).
    pub fn compute(items: &[LineItem], tax_rate: Decimal) -> Result<Self, AmountOverflow> {
        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.total))
            .ok_or(AmountOverflow)?;
        let tax = round_money(subtotal.checked_mul(tax_rate).ok_or(AmountOverflow)?);
        let total = round_money(subtotal.checked_add(tax).ok_or(AmountOverflow)?);
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}
