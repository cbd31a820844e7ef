//! Shared helpers for monetary calculations.

use rust_decimal::Decimal;

/// Rounds a decimal value to exactly two decimal places using half-up
/// rounding (midpoints go away from zero), the convention used on Italian
/// fiscal documents.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use fattura_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(45.764)), dec!(45.76));
/// assert_eq!(round_half_up(dec!(45.765)), dec!(45.77));
/// assert_eq!(round_half_up(dec!(-45.765)), dec!(-45.77)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}
