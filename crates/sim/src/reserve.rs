//! Exchange price compounding, utilization and protocol revenue.
//!
//! A token reserve tracks supply and borrow in raw units split into
//! with-interest and interest-free sides. Exchange prices convert raw units
//! into asset amounts and compound per second from the stored borrow rate:
//! all yield paid by with-interest borrowers flows to with-interest
//! suppliers, so the supply rate is the borrow rate scaled by utilization
//! and by each side's with-interest/interest-free ratio.
//!
//! Worked example (mirrored from the on-chain program's documentation):
//! supply 80 raw with interest + 20 interest free, borrow 50 raw with
//! interest + 10 interest free, borrow rate 40%, fee 10%, half a year
//! elapsed. Utilization is 60%, the supply ratio is 25%, the borrow ratio
//! works out to 83.333% of borrowers paying yield, so
//! `ratioSupplyYield = 60% * 83.333% * 125% = 62.5%` and the supply rate is
//! `40% * 90% * 62.5% = 22.5%`. The supply price moves 1 -> 1.1125 while
//! the borrow price moves 1 -> 1.2.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::math::{self, EXCHANGE_PRICES_PRECISION, FOUR_DECIMALS, SECONDS_PER_YEAR};

/// Intermediate precision the yield-ratio pipeline runs in (1e17).
const RATE_OUTPUT_PRECISION: u128 = 100_000_000_000_000_000;

/// Current supply and borrow exchange prices (1e12-scaled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePrices {
    pub supply_exchange_price: u128,
    pub borrow_exchange_price: u128,
}

/// Snapshot of a token reserve record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSnapshot {
    /// Supply exchange price, 1e12-scaled.
    pub supply_exchange_price: u128,
    /// Borrow exchange price, 1e12-scaled.
    pub borrow_exchange_price: u128,
    /// Borrow rate in 1e2 percent (10000 = 100%).
    pub borrow_rate: u16,
    /// Fee taken on interest, in 1e2 percent.
    pub fee_on_interest: u16,
    /// Utilization stored at the last update, in 1e2 percent.
    pub last_utilization: u16,
    pub last_update_timestamp: u64,
    /// Maximum allowed utilization, in 1e2 percent.
    pub max_utilization: u16,
    pub total_supply_with_interest: u128,
    pub total_supply_interest_free: u128,
    pub total_borrow_with_interest: u128,
    pub total_borrow_interest_free: u128,
}

/// Utilization-to-borrow-rate curve; all points in 1e2 percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateModel {
    /// Single-kink curve.
    V1 {
        rate_at_zero: u16,
        kink: u16,
        rate_at_kink: u16,
        rate_at_max: u16,
    },
    /// Double-kink curve.
    V2 {
        rate_at_zero: u16,
        kink1: u16,
        rate_at_kink1: u16,
        kink2: u16,
        rate_at_kink2: u16,
        rate_at_max: u16,
    },
}

impl RateModel {
    /// Borrow rate at the given utilization (1e2 percent), interpolated
    /// linearly between curve points. Above 100% utilization the final
    /// segment extrapolates, saturating at `u16::MAX`.
    pub fn borrow_rate_at(&self, utilization: u128) -> Result<u16, EngineError> {
        let rate = match *self {
            RateModel::V1 {
                rate_at_zero,
                kink,
                rate_at_kink,
                rate_at_max,
            } => {
                if kink == 0 || u128::from(kink) >= FOUR_DECIMALS {
                    return Err(EngineError::InvalidRateCurve);
                }
                if utilization <= u128::from(kink) {
                    interpolate(utilization, 0, rate_at_zero, u128::from(kink), rate_at_kink)
                } else {
                    interpolate(
                        utilization,
                        u128::from(kink),
                        rate_at_kink,
                        FOUR_DECIMALS,
                        rate_at_max,
                    )
                }
            }
            RateModel::V2 {
                rate_at_zero,
                kink1,
                rate_at_kink1,
                kink2,
                rate_at_kink2,
                rate_at_max,
            } => {
                if kink1 == 0 || kink2 <= kink1 || u128::from(kink2) >= FOUR_DECIMALS {
                    return Err(EngineError::InvalidRateCurve);
                }
                if utilization <= u128::from(kink1) {
                    interpolate(utilization, 0, rate_at_zero, u128::from(kink1), rate_at_kink1)
                } else if utilization <= u128::from(kink2) {
                    interpolate(
                        utilization,
                        u128::from(kink1),
                        rate_at_kink1,
                        u128::from(kink2),
                        rate_at_kink2,
                    )
                } else {
                    interpolate(
                        utilization,
                        u128::from(kink2),
                        rate_at_kink2,
                        FOUR_DECIMALS,
                        rate_at_max,
                    )
                }
            }
        };
        Ok(rate)
    }
}

/// Linear interpolation between two curve points, clamped to `u16`.
fn interpolate(utilization: u128, x0: u128, y0: u16, x1: u128, y1: u16) -> u16 {
    debug_assert!(x1 > x0);
    let slope_num = i128::from(y1) - i128::from(y0);
    let rate = i128::from(y0)
        + slope_num * (utilization as i128 - x0 as i128) / (x1 as i128 - x0 as i128);
    rate.clamp(0, i128::from(u16::MAX)) as u16
}

/// Compounds both exchange prices from the snapshot to `now`.
///
/// Borrow compounding rounds up (borrowers never under-pay); supply
/// compounding rounds down (lenders never over-receive). Returns the stored
/// prices unchanged when no time passed, the borrow rate is zero, or no
/// with-interest borrow exists.
pub fn advance_prices(
    snapshot: &ReserveSnapshot,
    now: u64,
) -> Result<ExchangePrices, EngineError> {
    let mut supply_exchange_price = snapshot.supply_exchange_price;
    let mut borrow_exchange_price = snapshot.borrow_exchange_price;
    if supply_exchange_price == 0 || borrow_exchange_price == 0 {
        return Err(EngineError::ExchangePriceZero);
    }
    if now < snapshot.last_update_timestamp {
        return Err(EngineError::TimestampRegression {
            now,
            last_update: snapshot.last_update_timestamp,
        });
    }
    let elapsed = u128::from(now - snapshot.last_update_timestamp);
    let borrow_rate = u128::from(snapshot.borrow_rate);

    if elapsed == 0 || borrow_rate == 0 || snapshot.total_borrow_with_interest == 0 {
        return Ok(ExchangePrices {
            supply_exchange_price,
            borrow_exchange_price,
        });
    }

    borrow_exchange_price = math::checked_add(
        borrow_exchange_price,
        math::ceil_div(
            math::checked_mul(math::checked_mul(borrow_exchange_price, borrow_rate)?, elapsed)?,
            SECONDS_PER_YEAR * FOUR_DECIMALS,
        ),
    )?;

    if snapshot.total_supply_with_interest == 0 {
        // no raw supply earning interest: borrow side only
        return Ok(ExchangePrices {
            supply_exchange_price,
            borrow_exchange_price,
        });
    }

    let supply_ratio = with_interest_vs_free_ratio(
        snapshot.total_supply_with_interest,
        snapshot.total_supply_interest_free,
    )?;
    let utilization = u128::from(snapshot.last_utilization);

    let mut ratio_supply_yield =
        if snapshot.total_supply_with_interest < snapshot.total_supply_interest_free {
            if supply_ratio == 0 {
                // with-interest supply is negligible next to interest-free:
                // nobody to credit the yield to
                return Ok(ExchangePrices {
                    supply_exchange_price,
                    borrow_exchange_price,
                });
            }
            // ratio is withInterest / interestFree; invert into 1e17 scale
            let inverted = RATE_OUTPUT_PRECISION * FOUR_DECIMALS / supply_ratio;
            math::checked_mul(utilization, RATE_OUTPUT_PRECISION + inverted)? / FOUR_DECIMALS
        } else {
            math::checked_mul(
                math::checked_mul(utilization, RATE_OUTPUT_PRECISION)?,
                FOUR_DECIMALS + supply_ratio,
            )? / (FOUR_DECIMALS * FOUR_DECIMALS)
        };

    let borrow_ratio = with_interest_vs_free_ratio(
        snapshot.total_borrow_with_interest,
        snapshot.total_borrow_interest_free,
    )?;
    // share of total borrowers actually paying yield, in 1e17 scale
    let borrow_yield_share =
        if snapshot.total_borrow_with_interest < snapshot.total_borrow_interest_free {
            borrow_ratio * RATE_OUTPUT_PRECISION / (FOUR_DECIMALS + borrow_ratio)
        } else {
            RATE_OUTPUT_PRECISION
                - borrow_ratio * RATE_OUTPUT_PRECISION / (FOUR_DECIMALS + borrow_ratio)
        };

    ratio_supply_yield =
        math::mul_div_floor(ratio_supply_yield, borrow_yield_share, RATE_OUTPUT_PRECISION)?
            * FOUR_DECIMALS
            / RATE_OUTPUT_PRECISION;

    let fee_remainder = FOUR_DECIMALS
        .checked_sub(u128::from(snapshot.fee_on_interest))
        .ok_or(EngineError::ValueOverflow)?;
    let supply_rate =
        math::checked_mul(math::checked_mul(borrow_rate, ratio_supply_yield)?, fee_remainder)?;

    supply_exchange_price = math::checked_add(
        supply_exchange_price,
        math::checked_mul(math::checked_mul(supply_exchange_price, supply_rate)?, elapsed)?
            / (SECONDS_PER_YEAR * FOUR_DECIMALS)
            / (FOUR_DECIMALS * FOUR_DECIMALS),
    )?;

    Ok(ExchangePrices {
        supply_exchange_price,
        borrow_exchange_price,
    })
}

/// Refreshes the whole snapshot to `now`: compounded prices, recomputed
/// utilization, and the borrow rate the model yields for it.
pub fn advance(
    snapshot: &ReserveSnapshot,
    rate_model: &RateModel,
    now: u64,
) -> Result<ReserveSnapshot, EngineError> {
    let prices = advance_prices(snapshot, now)?;
    let new_utilization = utilization(snapshot, &prices)?;
    let borrow_rate = rate_model.borrow_rate_at(u128::from(new_utilization))?;
    Ok(ReserveSnapshot {
        supply_exchange_price: prices.supply_exchange_price,
        borrow_exchange_price: prices.borrow_exchange_price,
        borrow_rate,
        last_utilization: new_utilization,
        last_update_timestamp: now,
        ..snapshot.clone()
    })
}

/// Utilization over exchange-price-scaled totals, in 1e2 percent.
pub fn utilization(
    snapshot: &ReserveSnapshot,
    prices: &ExchangePrices,
) -> Result<u16, EngineError> {
    let scaled_supply = math::checked_add(
        math::checked_mul(snapshot.total_supply_with_interest, prices.supply_exchange_price)?,
        math::checked_mul(snapshot.total_supply_interest_free, EXCHANGE_PRICES_PRECISION)?,
    )?;
    if scaled_supply == 0 {
        return Ok(0);
    }
    let scaled_borrow = math::checked_add(
        math::checked_mul(snapshot.total_borrow_with_interest, prices.borrow_exchange_price)?,
        math::checked_mul(snapshot.total_borrow_interest_free, EXCHANGE_PRICES_PRECISION)?,
    )?;
    let utilization = math::mul_div_floor(scaled_borrow, FOUR_DECIMALS, scaled_supply)?;
    u16::try_from(utilization).map_err(|_| EngineError::ValueOverflow)
}

/// Protocol revenue claimable from the reserve at `now`.
///
/// With outstanding supply, revenue is whatever the pool balance plus
/// outstanding borrowings exceeds the suppliers' claims by, floored at
/// zero. With no supply left the whole balance is revenue so no funds
/// strand.
pub fn revenue(
    snapshot: &ReserveSnapshot,
    liquidity_balance: u128,
    now: u64,
) -> Result<u128, EngineError> {
    let prices = advance_prices(snapshot, now)?;
    let total_supply = math::checked_add(
        snapshot.total_supply_interest_free,
        math::mul_div_ceil(
            snapshot.total_supply_with_interest,
            prices.supply_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?,
    )?;
    if total_supply == 0 {
        return Ok(liquidity_balance);
    }
    let total_borrow = math::checked_add(
        snapshot.total_borrow_interest_free,
        math::mul_div_floor(
            snapshot.total_borrow_with_interest,
            prices.borrow_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?,
    )?;
    Ok(math::checked_add(liquidity_balance, total_borrow)?.saturating_sub(total_supply))
}

/// Ratio of the smaller side to the larger, in 1e2 percent; 1e4 when the
/// sides match exactly and are non-zero, 0 when both are zero.
fn with_interest_vs_free_ratio(
    with_interest: u128,
    interest_free: u128,
) -> Result<u128, EngineError> {
    if with_interest > interest_free {
        Ok(math::checked_mul(interest_free, FOUR_DECIMALS)? / with_interest)
    } else if with_interest < interest_free {
        Ok(math::checked_mul(with_interest, FOUR_DECIMALS)? / interest_free)
    } else if with_interest > 0 {
        Ok(FOUR_DECIMALS)
    } else {
        Ok(0)
    }
}
