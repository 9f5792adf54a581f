//! Packed big-number codec for debt and connection factors.
//!
//! Liquidation compounds a position's debt through an arbitrary number of
//! multiplicative events. Storing those factors as plain integers would
//! overflow (or vanish) quickly, so the ledger packs them into a 50-bit
//! floating-point format carried in a `u64`:
//!
//! ```text
//! bits 49..15: 35-bit coefficient, top bit set (canonical form)
//! bits 14..0 : 15-bit exponent, biased by 16384
//! ```
//!
//! The represented value is `(coefficient / 2^34) * 2^(exponent - 16384)`,
//! giving ~2^-35 relative precision over a dynamic range of roughly
//! `2^-16383` to `2^16383`. Exponents 1..=16384 cover realization factors
//! (at most ~2); composed connection factors can use the full 1..=32767
//! range. The all-ones pattern [`BigNumber::MAX_MASK`] is reserved to mean
//! "effectively 100% liquidated".
//!
//! Every operation here reproduces the on-chain program's arithmetic
//! exactly, including renormalization thresholds and rounding. These are
//! contractual, not implementation details.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

const COEFFICIENT_BITS: u32 = 35;
const EXPONENT_BITS: u32 = 15;
const EXPONENT_MASK: u64 = (1 << EXPONENT_BITS) - 1;
const COEFFICIENT_TOP_BIT: u64 = 1 << (COEFFICIENT_BITS - 1);
const EXPONENT_BIAS: i64 = 16384;
const EXPONENT_MAX: i64 = (1 << EXPONENT_BITS) - 1;

const TWO_POW_69_MINUS_1: u128 = (1 << 69) - 1;
const TWO_POW_84_MINUS_1: u128 = (1 << 84) - 1;

/// A packed 50-bit coefficient+exponent factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BigNumber(u64);

impl BigNumber {
    /// The zero sentinel (all bits clear).
    pub const ZERO: BigNumber = BigNumber(0);

    /// The factor 1.0: coefficient `2^34`, exponent at the bias.
    pub const ONE: BigNumber = BigNumber((COEFFICIENT_TOP_BIT << EXPONENT_BITS) | 16384);

    /// "Effectively 100% liquidated": all 50 bits set.
    pub const MAX_MASK: BigNumber = BigNumber((1 << (COEFFICIENT_BITS + EXPONENT_BITS)) - 1);

    /// Builds a big number from its parts, validating canonical form.
    pub fn new(coefficient: u64, exponent: u16) -> Result<Self, EngineError> {
        let packed = (coefficient << EXPONENT_BITS) | u64::from(exponent);
        if coefficient & COEFFICIENT_TOP_BIT == 0
            || coefficient >> COEFFICIENT_BITS != 0
            || exponent == 0
            || i64::from(exponent) > EXPONENT_MAX
        {
            return Err(EngineError::NonCanonical { value: packed });
        }
        Ok(BigNumber(packed))
    }

    /// Reinterprets a raw packed value, accepting only the zero sentinel or
    /// a canonical number.
    pub fn from_raw(raw: u64) -> Result<Self, EngineError> {
        if raw == 0 {
            return Ok(Self::ZERO);
        }
        Self::new(raw >> EXPONENT_BITS, (raw & EXPONENT_MASK) as u16)
    }

    /// The raw packed representation.
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_max_mask(self) -> bool {
        self == Self::MAX_MASK
    }

    /// Coefficient and exponent of a canonical non-zero value.
    fn parts(self) -> Result<(u64, i64), EngineError> {
        let coefficient = self.0 >> EXPONENT_BITS;
        let exponent = (self.0 & EXPONENT_MASK) as i64;
        if coefficient & COEFFICIENT_TOP_BIT == 0 || exponent == 0 {
            return Err(EngineError::NonCanonical { value: self.0 });
        }
        Ok((coefficient, exponent))
    }

    fn pack(coefficient: u64, exponent: i64) -> Self {
        debug_assert!(coefficient & COEFFICIENT_TOP_BIT != 0);
        debug_assert!((1..=EXPONENT_MAX).contains(&exponent));
        BigNumber((coefficient << EXPONENT_BITS) | exponent as u64)
    }
}

/// `normal * bn1 / bn2` as an ordinary integer.
///
/// The divisor's exponent must be at least the dividend's; a gap of 129 or
/// more puts the result below representable precision and yields 0. The
/// result is contractually bounded to 64 bits.
pub fn mul_div_normal(
    normal: u128,
    bn1: BigNumber,
    bn2: BigNumber,
) -> Result<u128, EngineError> {
    if bn2.is_zero() {
        return Err(EngineError::ZeroDivisor);
    }
    if bn1.is_zero() || normal == 0 {
        return Ok(0);
    }
    let (c1, e1) = bn1.parts()?;
    let (c2, e2) = bn2.parts()?;
    if e2 < e1 {
        return Err(EngineError::ExponentOrder {
            dividend_exponent: e1 as u16,
            divisor_exponent: e2 as u16,
        });
    }
    let net_exponent = (e2 - e1) as usize;
    if net_exponent >= 129 {
        return Ok(0);
    }
    let result = U256::from(normal) * U256::from(c1) / (U256::from(c2) << net_exponent);
    if result > U256::from(u64::MAX) {
        return Err(EngineError::ValueOverflow);
    }
    Ok(result.to::<u128>())
}

/// `bn * normal / 2^64` as a big number.
///
/// `normal` is a Q64 multiplier (at most `2^64`). The raw coefficient
/// product is renormalized to 35 bits from its most-significant-bit
/// position, probed with two fast-path thresholds before the exact
/// bit-length scan.
pub fn mul_div_big_number(bn: BigNumber, normal: u128) -> Result<BigNumber, EngineError> {
    if bn.is_zero() || normal == 0 {
        return Ok(BigNumber::ZERO);
    }
    let (coefficient, exponent) = bn.parts()?;
    let product = u128::from(coefficient)
        .checked_mul(normal)
        .ok_or(EngineError::ValueOverflow)?;

    let most_significant_bit = if product > TWO_POW_84_MINUS_1 {
        85 + bit_length((product >> 85) as u64)
    } else if product > TWO_POW_69_MINUS_1 {
        70 + bit_length((product >> 70) as u64)
    } else {
        35 + bit_length((product >> 35) as u64)
    };

    let shift = most_significant_bit - COEFFICIENT_BITS;
    let new_coefficient = (product >> shift) as u64;
    let new_exponent = exponent + i64::from(most_significant_bit) - 99;
    if new_exponent < 1 {
        return Err(EngineError::ExponentUnderflow {
            exponent: new_exponent,
        });
    }
    if new_exponent > EXPONENT_MAX {
        return Err(EngineError::ExponentOverflow {
            exponent: new_exponent,
        });
    }
    Ok(BigNumber::pack(new_coefficient, new_exponent))
}

/// `bn1 * bn2` as a big number.
///
/// Exponent overflow saturates to [`BigNumber::MAX_MASK`]: a connection
/// factor past the representable range means the debt was compounded away
/// entirely, which is a valid outcome of repeated liquidation, not a fault.
/// Exponent underflow remains a hard error.
pub fn mul_big_number(bn1: BigNumber, bn2: BigNumber) -> Result<BigNumber, EngineError> {
    if bn1.is_zero() || bn2.is_zero() {
        return Ok(BigNumber::ZERO);
    }
    let (c1, e1) = bn1.parts()?;
    let (c2, e2) = bn2.parts()?;
    let product = u128::from(c1) * u128::from(c2);
    let (coefficient, overflow) = if product > TWO_POW_69_MINUS_1 {
        ((product >> 35) as u64, 1)
    } else {
        ((product >> 34) as u64, 0)
    };
    let exponent = e1 + e2 + overflow - EXPONENT_BIAS;
    if exponent < 1 {
        return Err(EngineError::ExponentUnderflow { exponent });
    }
    if exponent > EXPONENT_MAX {
        tracing::debug!(exponent, "debt factor exponent overflow, saturating");
        return Ok(BigNumber::MAX_MASK);
    }
    Ok(BigNumber::pack(coefficient, exponent))
}

/// `bn1 / bn2` as a big number.
pub fn div_big_number(bn1: BigNumber, bn2: BigNumber) -> Result<BigNumber, EngineError> {
    if bn2.is_zero() {
        return Err(EngineError::ZeroDivisor);
    }
    if bn1.is_zero() {
        return Ok(BigNumber::ZERO);
    }
    let (c1, e1) = bn1.parts()?;
    let (c2, e2) = bn2.parts()?;
    let quotient = (u128::from(c1) << COEFFICIENT_BITS) / u128::from(c2);
    let (coefficient, overflow) = if quotient >> COEFFICIENT_BITS != 0 {
        ((quotient >> 1) as u64, 1)
    } else {
        (quotient as u64, 0)
    };
    let exponent = e1 - e2 + (EXPONENT_BIAS - 1) + overflow;
    if exponent < 1 {
        return Err(EngineError::ExponentUnderflow { exponent });
    }
    if exponent > EXPONENT_MAX {
        return Err(EngineError::ExponentOverflow { exponent });
    }
    Ok(BigNumber::pack(coefficient, exponent))
}

/// Bit length of a value known to fit the probed window.
fn bit_length(value: u64) -> u32 {
    64 - value.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF: BigNumber = BigNumber(562_949_953_437_695);
    const THREE_QUARTERS: BigNumber = BigNumber(844_424_930_148_351);

    fn canonical(bn: BigNumber) -> bool {
        bn.is_zero() || (bn.raw() >> EXPONENT_BITS) & COEFFICIENT_TOP_BIT != 0
    }

    #[test]
    fn constants_are_canonical() {
        assert_eq!(BigNumber::ONE.raw(), 562_949_953_437_696);
        assert_eq!(BigNumber::MAX_MASK.raw(), (1 << 50) - 1);
        assert!(canonical(BigNumber::ONE));
        assert!(canonical(BigNumber::MAX_MASK));
        assert_eq!(BigNumber::new(1 << 34, 16383).unwrap(), HALF);
    }

    #[test]
    fn new_rejects_non_canonical() {
        // top coefficient bit clear
        assert!(BigNumber::new(1 << 30, 16384).is_err());
        // coefficient too wide
        assert!(BigNumber::new(1 << 35, 16384).is_err());
        // zero exponent
        assert!(BigNumber::new(1 << 34, 0).is_err());
        assert!(BigNumber::from_raw(16384).is_err());
        assert_eq!(BigNumber::from_raw(0).unwrap(), BigNumber::ZERO);
    }

    #[test]
    fn mul_identity_and_halving() {
        assert_eq!(mul_big_number(BigNumber::ONE, BigNumber::ONE).unwrap(), BigNumber::ONE);
        assert_eq!(mul_big_number(BigNumber::ONE, HALF).unwrap(), HALF);
        assert_eq!(mul_big_number(HALF, BigNumber::ONE).unwrap(), HALF);
    }

    #[test]
    fn mul_saturates_to_max_mask_on_exponent_overflow() {
        let tiny = BigNumber::new(1 << 34, 30000).unwrap();
        assert_eq!(mul_big_number(tiny, tiny).unwrap(), BigNumber::MAX_MASK);
    }

    #[test]
    fn mul_underflow_is_an_error() {
        let huge = BigNumber::new(1 << 34, 1).unwrap();
        assert!(matches!(
            mul_big_number(huge, huge),
            Err(EngineError::ExponentUnderflow { .. })
        ));
    }

    #[test]
    fn div_inverse_of_half_is_two() {
        let two = div_big_number(BigNumber::ONE, HALF).unwrap();
        assert_eq!(two, BigNumber::new(1 << 34, 16385).unwrap());
        assert_eq!(div_big_number(BigNumber::ONE, BigNumber::ONE).unwrap(), BigNumber::ONE);
    }

    #[test]
    fn div_rejects_zero_divisor_and_passes_zero_dividend() {
        assert_eq!(
            div_big_number(BigNumber::ONE, BigNumber::ZERO),
            Err(EngineError::ZeroDivisor)
        );
        assert_eq!(div_big_number(BigNumber::ZERO, BigNumber::ONE).unwrap(), BigNumber::ZERO);
    }

    #[test]
    fn mul_div_normal_basics() {
        assert_eq!(mul_div_normal(1000, BigNumber::ONE, BigNumber::ONE).unwrap(), 1000);
        assert_eq!(mul_div_normal(1000, HALF, BigNumber::ONE).unwrap(), 500);
        assert_eq!(mul_div_normal(1000, HALF, THREE_QUARTERS).unwrap(), 666);
        assert_eq!(mul_div_normal(0, HALF, BigNumber::ONE).unwrap(), 0);
    }

    #[test]
    fn mul_div_normal_requires_exponent_order() {
        assert!(matches!(
            mul_div_normal(1000, BigNumber::ONE, HALF),
            Err(EngineError::ExponentOrder { .. })
        ));
    }

    #[test]
    fn mul_div_normal_vanishes_past_exponent_gap() {
        let far = BigNumber::new(1 << 34, 16384 + 129).unwrap();
        assert_eq!(mul_div_normal(u128::from(u64::MAX), BigNumber::ONE, far).unwrap(), 0);
        // one below the gap still yields a value path (here rounded to zero)
        let near = BigNumber::new(1 << 34, 16384 + 128).unwrap();
        assert_eq!(mul_div_normal(1000, BigNumber::ONE, near).unwrap(), 0);
    }

    #[test]
    fn mul_div_normal_bounds_result_to_64_bits() {
        let wide = BigNumber::new((1 << 35) - 1, 16384).unwrap();
        assert_eq!(
            mul_div_normal(u128::from(u64::MAX), wide, BigNumber::ONE),
            Err(EngineError::ValueOverflow)
        );
        assert_eq!(
            mul_div_normal(u128::MAX, BigNumber::ONE, BigNumber::ONE),
            Err(EngineError::ValueOverflow)
        );
    }

    #[test]
    fn mul_div_big_number_q64_identity() {
        assert_eq!(
            mul_div_big_number(BigNumber::ONE, 1u128 << 64).unwrap(),
            BigNumber::ONE
        );
        assert_eq!(mul_div_big_number(BigNumber::ONE, 1u128 << 63).unwrap(), HALF);
        assert_eq!(
            mul_div_big_number(BigNumber::ONE, 3u128 << 62).unwrap(),
            THREE_QUARTERS
        );
        assert_eq!(mul_div_big_number(BigNumber::ZERO, 1u128 << 64).unwrap(), BigNumber::ZERO);
        assert_eq!(mul_div_big_number(BigNumber::ONE, 0).unwrap(), BigNumber::ZERO);
    }

    #[test]
    fn operations_preserve_canonical_form() {
        let samples = [
            BigNumber::ONE,
            HALF,
            THREE_QUARTERS,
            BigNumber::new((1 << 34) | 12345, 16000).unwrap(),
            BigNumber::new((1 << 35) - 1, 17000).unwrap(),
        ];
        for a in samples {
            for b in samples {
                let product = mul_big_number(a, b).unwrap();
                assert!(canonical(product), "mul {a:?} {b:?}");
                let quotient = div_big_number(a, b).unwrap();
                assert!(canonical(quotient), "div {a:?} {b:?}");
            }
            let scaled = mul_div_big_number(a, (3u128 << 62) + 987_654_321).unwrap();
            assert!(canonical(scaled), "mul_div {a:?}");
        }
    }
}
