//! Money arithmetic.
//!
//! Amounts are whole currency units (the launch currency has no minor
//! unit). Percentage math rounds to the nearest unit.

/// Total for a line: `quantity × unit_price`, reduced by `discount_pct`
/// percent and rounded to the nearest currency unit.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn discounted_total(quantity: u32, unit_price: i64, discount_pct: f64) -> i64 {
    let gross = f64::from(quantity) * unit_price as f64;
    (gross * (1.0 - discount_pct / 100.0)).round() as i64
}

/// The given percentage of `amount`, rounded to the nearest currency unit.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn percentage_of(amount: i64, pct: f64) -> i64 {
    (amount as f64 * pct / 100.0).round() as i64
}
