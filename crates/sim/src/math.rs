//! Shared fixed-point helpers and protocol-wide scaling constants.
//!
//! Raw ledger amounts are `u128` and exchange prices are scaled by
//! [`EXCHANGE_PRICES_PRECISION`]. Products of a tick ratio (up to ~1.3e25)
//! and a raw amount do not fit in 128 bits, so the mul-div helpers run
//! through a 256-bit intermediate.

use alloy_primitives::U256;

use crate::error::EngineError;

/// Exchange price scale: a price of `1e12` converts raw amounts 1:1.
pub const EXCHANGE_PRICES_PRECISION: u128 = 1_000_000_000_000;

/// Percentage scale used throughout the protocol: 10000 = 100%.
pub const FOUR_DECIMALS: u128 = 10_000;

/// Seconds in a (365-day) year, the interest accrual period base.
pub const SECONDS_PER_YEAR: u128 = 31_536_000;

/// `floor(value * numerator / denominator)` over a 256-bit intermediate.
pub fn mul_div_floor(value: u128, numerator: u128, denominator: u128) -> Result<u128, EngineError> {
    if denominator == 0 {
        return Err(EngineError::ZeroDivisor);
    }
    let wide = U256::from(value) * U256::from(numerator) / U256::from(denominator);
    u128::try_from(wide).map_err(|_| EngineError::ValueOverflow)
}

/// `ceil(value * numerator / denominator)` over a 256-bit intermediate.
pub fn mul_div_ceil(value: u128, numerator: u128, denominator: u128) -> Result<u128, EngineError> {
    if denominator == 0 {
        return Err(EngineError::ZeroDivisor);
    }
    let product = U256::from(value) * U256::from(numerator);
    let divisor = U256::from(denominator);
    let mut quotient = product / divisor;
    if product % divisor != U256::ZERO {
        quotient += U256::from(1u64);
    }
    u128::try_from(quotient).map_err(|_| EngineError::ValueOverflow)
}

/// `ceil(value / divisor)` for in-width values. `divisor` must be non-zero.
pub fn ceil_div(value: u128, divisor: u128) -> u128 {
    debug_assert!(divisor != 0);
    value / divisor + u128::from(value % divisor != 0)
}

/// Checked `u128` multiplication, mirroring the on-chain safe math: overflow
/// is a fault, not a saturation.
pub fn checked_mul(a: u128, b: u128) -> Result<u128, EngineError> {
    a.checked_mul(b).ok_or(EngineError::ValueOverflow)
}

/// Checked `u128` addition.
pub fn checked_add(a: u128, b: u128) -> Result<u128, EngineError> {
    a.checked_add(b).ok_or(EngineError::ValueOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_floor_rounds_down() {
        assert_eq!(mul_div_floor(10, 10, 3).unwrap(), 33);
        assert_eq!(mul_div_floor(0, 10, 3).unwrap(), 0);
    }

    #[test]
    fn mul_div_ceil_rounds_up() {
        assert_eq!(mul_div_ceil(10, 10, 3).unwrap(), 34);
        assert_eq!(mul_div_ceil(10, 10, 5).unwrap(), 20);
    }

    #[test]
    fn mul_div_uses_wide_intermediate() {
        // u128::MAX * 2 / 4 would overflow a 128-bit product
        assert_eq!(mul_div_floor(u128::MAX, 2, 4).unwrap(), u128::MAX / 2);
    }

    #[test]
    fn mul_div_rejects_zero_denominator() {
        assert_eq!(mul_div_floor(1, 1, 0), Err(EngineError::ZeroDivisor));
        assert_eq!(mul_div_ceil(1, 1, 0), Err(EngineError::ZeroDivisor));
    }

    #[test]
    fn mul_div_detects_overflowing_result() {
        assert_eq!(
            mul_div_floor(u128::MAX, u128::MAX, 1),
            Err(EngineError::ValueOverflow)
        );
    }

    #[test]
    fn ceil_div_exact_and_inexact() {
        assert_eq!(ceil_div(10, 5), 2);
        assert_eq!(ceil_div(11, 5), 3);
        assert_eq!(ceil_div(0, 5), 0);
    }
}
