//! Lenient numeric deserializers
//!
//! Records arrive from form posts and untyped query rows, where an amount may
//! be a number, a numeric string (`"10 000,50"`), `null`, or garbage. These
//! helpers never fail on the value itself: anything that is not a usable
//! non-negative number becomes zero.
//!
//! Use with `#[serde(default, deserialize_with = "lenient::amount")]`.

use crate::money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Monetary amount; negative or non-numeric becomes zero
pub fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(amount_from_value).unwrap_or(Decimal::ZERO))
}

/// Percentage; non-numeric becomes zero, range is left to the calculator
pub fn percent<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value).unwrap_or(Decimal::ZERO))
}

/// Item quantity; negative or non-numeric becomes zero, fractions truncate
pub fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(quantity_from_value).unwrap_or(0))
}

/// Interpret an untyped value as an amount
pub fn amount_from_value(value: &Value) -> Decimal {
    match decimal_from_value(value) {
        Some(d) => money::sanitize_amount(d),
        None => {
            warn!(%value, "non-numeric amount treated as zero");
            Decimal::ZERO
        }
    }
}

/// Interpret an untyped value as a quantity
pub fn quantity_from_value(value: &Value) -> u32 {
    let parsed = match decimal_from_value(value) {
        Some(d) => d,
        None => {
            warn!(%value, "non-numeric quantity treated as zero");
            return 0;
        }
    };
    if parsed.is_sign_negative() {
        return 0;
    }
    parsed.trunc().to_u32().unwrap_or(u32::MAX)
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().map(money::amount_from_f64)
            }
        }
        Value::String(s) => parse_localized(s),
        _ => None,
    }
}

/// Parse "1234.5", "1 234,50" or "1234,5"
fn parse_localized(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}
