//! Monetary rounding
//!
//! Every monetary value the engine produces goes through [`round_money`]
//! right after the multiplication or division that created it. Regime totals
//! are sums of individually rounded items, so the granularity matters.

use rust_decimal::{Decimal, RoundingStrategy};

/// Quantize to two fractional digits, rounding half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        // Drop a negative sign left over from values like -0.001
        return Decimal::new(0, 2);
    }
    let mut rounded = rounded;
    rounded.rescale(2);
    rounded
}

/// Apply a percentage rate (e.g. `15.00` for 15%) without rounding.
pub fn percent_of(value: Decimal, rate_pct: Decimal) -> Decimal {
    value * (rate_pct / Decimal::ONE_HUNDRED)
}

/// Render a rounded amount as `"1234.56"`.
pub fn format_money(value: Decimal) -> String {
    format!("{:.2}", round_money(value))
}

/// Sum already-rounded items and round the result.
pub fn sum_money<'a, I>(values: I) -> Decimal
where
    I: IntoIterator<Item = &'a Decimal>,
{
    round_money(values.into_iter().copied().sum())
}
