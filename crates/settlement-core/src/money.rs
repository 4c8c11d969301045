//! Currency arithmetic
//!
//! Amounts are `Decimal` values in the currency of record. The only rounding
//! rule in the crate is round half up to a whole currency unit; amounts are
//! never negative once sanitized, so "midpoint away from zero" and "half up"
//! coincide.
//!
//! Every amount is capped at [`MAX_AMOUNT_UNITS`] whole units once
//! sanitized, and arithmetic on amounts saturates instead of overflowing.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

/// Upper bound of a coverage percentage
pub const MAX_PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Largest amount accepted for a single line or bill
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000_000;

pub fn max_amount() -> Decimal {
    Decimal::from(MAX_AMOUNT_UNITS)
}

/// Round half up to a whole currency unit
pub fn round_half_up(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Replace negative amounts with zero and cap oversized ones
pub fn sanitize_amount(amount: Decimal) -> Decimal {
    if amount.is_sign_negative() && !amount.is_zero() {
        warn!(%amount, "negative amount treated as zero");
        Decimal::ZERO
    } else if amount.is_zero() {
        // normalizes -0
        Decimal::ZERO
    } else if amount > max_amount() {
        warn!(%amount, max = MAX_AMOUNT_UNITS, "amount above maximum, capping");
        max_amount()
    } else {
        amount
    }
}

/// Sanitize then round to a whole currency unit
pub fn whole_units(amount: Decimal) -> Decimal {
    round_half_up(sanitize_amount(amount))
}

/// Convert a float coming from an untyped source
///
/// NaN, infinities and negative values become zero.
pub fn amount_from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        warn!(value, "non-finite amount treated as zero");
        return Decimal::ZERO;
    }
    sanitize_amount(Decimal::from_f64(value).unwrap_or(Decimal::ZERO))
}

/// Clamp a coverage percentage into [0, 100]
pub fn clamp_percent(percent: Decimal) -> Decimal {
    if percent < Decimal::ZERO {
        warn!(%percent, "coverage percent below 0, clamping");
        Decimal::ZERO
    } else if percent > MAX_PERCENT {
        warn!(%percent, "coverage percent above 100, clamping");
        MAX_PERCENT
    } else {
        percent
    }
}

/// Value of `quantity` units at `unit_price`, in whole currency units
pub fn extend(unit_price: Decimal, quantity: u32) -> Decimal {
    let unit_price = sanitize_amount(unit_price);
    match unit_price.checked_mul(Decimal::from(quantity)) {
        Some(value) => whole_units(value),
        None => {
            warn!(%unit_price, quantity, "line value overflowed, capping");
            max_amount()
        }
    }
}

/// `percent` % of `amount`, rounded to a whole currency unit
///
/// `amount` is expected sanitized and `percent` clamped; the share never
/// exceeds `amount`.
pub fn share(amount: Decimal, percent: Decimal) -> Decimal {
    match amount
        .checked_mul(percent)
        .and_then(|v| v.checked_div(MAX_PERCENT))
    {
        Some(value) => round_half_up(value).min(amount),
        None => {
            warn!(%amount, %percent, "coverage share overflowed, covering the full amount");
            amount
        }
    }
}

/// Add two amounts, saturating at `Decimal::MAX`
pub fn add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        warn!(%a, %b, "amount sum overflowed, saturating");
        Decimal::MAX
    })
}
