//! Decimal helpers shared by the scoring and tax modules

use bigdecimal::{BigDecimal, RoundingMode};

/// Build a decimal from integer units and a scale, e.g. `decimal(65, 2)` is `0.65`
pub fn decimal(units: i64, scale: i64) -> BigDecimal {
    BigDecimal::new(units.into(), scale)
}

/// Round to whole cents, half away from zero
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// `max(0, value)`
pub fn non_negative(value: BigDecimal) -> BigDecimal {
    value.max(BigDecimal::from(0))
}
