//! Position valuation and operate simulation.
//!
//! A position stores raw (exchange-price-denominated) amounts plus the tick
//! its debt was recorded on and a per-tick sequence id. Valuing it means
//! recomputing the debt the tick ratio implies and, when the tick's record
//! shows a liquidation passed over it, realizing the remainder through the
//! branch graph. `operate` simulates the supply/withdraw/borrow/payback
//! state transition with the program's exact rounding directions.

use serde::{Deserialize, Serialize};

use crate::bignum::BigNumber;
use crate::branch::{self, Branch};
use crate::error::EngineError;
use crate::math::{self, EXCHANGE_PRICES_PRECISION, FOUR_DECIMALS};
use crate::reserve::ExchangePrices;
use crate::tick::{self, INIT_TICK, MAX_TICK, MIN_TICK, ZERO_TICK_SCALED_RATIO};

/// Sentinel delta requesting a full withdrawal (collateral) or full payback
/// (debt): the exact recorded amount is recomputed instead of converting a
/// magnitude.
pub const FULL_AMOUNT: i128 = i128::MIN;

/// Debt margin applied before deriving a position's tick: one part in 1e9.
const TICK_MARGIN_DIVISOR: u128 = 1_000_000_000;

/// Snapshot of a stored position record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Tick the debt was recorded on, or [`INIT_TICK`] if never touched.
    pub tick: i32,
    /// Value of the tick's sequence counter when the position last touched
    /// it; a larger counter in the tick record means a liquidation passed.
    pub tick_id: u32,
    pub raw_supply: u128,
    /// Residual debt excluded from the net position debt.
    pub raw_dust_debt: u128,
    pub is_supply_only: bool,
}

/// Snapshot of a per-tick aggregate record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRecord {
    pub total_ids: u32,
    pub is_liquidated: bool,
    pub raw_debt: u128,
}

/// Branch lineage stamped on a tick (or tick-id generation) when it was
/// liquidated: the entry point for [`branch::resolve`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationSource {
    pub branch_id: u32,
    pub connection_factor: BigNumber,
}

/// A position's realized state at the supplied snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionState {
    pub raw_collateral: u128,
    /// Net raw debt (dust already excluded).
    pub raw_debt: u128,
    pub tick: i32,
    pub is_supply_only: bool,
    /// Whether a liquidation touched this position since it was stored.
    pub was_liquidated: bool,
}

/// Result of an `operate` simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperateOutcome {
    pub raw_collateral: u128,
    pub raw_debt: u128,
    pub tick: i32,
    pub is_supply_only: bool,
    /// Token amount actually moved on the collateral side (signed).
    pub collateral_amount: i128,
    /// Token amount actually moved on the debt side (signed).
    pub debt_amount: i128,
}

/// Asset-denominated view of a realized position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub supply: u128,
    pub debt: u128,
    pub tick: i32,
    pub is_liquidated: bool,
    pub is_supply_only: bool,
}

/// Computes a position's current realized collateral and debt.
///
/// `liquidation_source` must be supplied whenever the tick record shows the
/// position's generation was liquidated (`is_liquidated`, or `total_ids`
/// past the position's `tick_id`); the on-chain program stamps it into the
/// tick and tick-id records at liquidation time.
pub fn current_state(
    position: &Position,
    tick_record: &TickRecord,
    liquidation_source: Option<&LiquidationSource>,
    branches: &[Branch],
) -> Result<PositionState, EngineError> {
    if position.is_supply_only || position.tick == INIT_TICK {
        return Ok(PositionState {
            raw_collateral: position.raw_supply,
            raw_debt: 0,
            tick: MIN_TICK,
            is_supply_only: true,
            was_liquidated: false,
        });
    }

    // gross debt the tick ratio implies for this collateral, rounded up
    let ratio = tick::ratio_at_tick(position.tick)?;
    let raw_debt =
        math::mul_div_floor(ratio, position.raw_supply + 1, ZERO_TICK_SCALED_RATIO)? + 1;

    let liquidated = tick_record.is_liquidated || tick_record.total_ids > position.tick_id;
    if !liquidated {
        return Ok(PositionState {
            raw_collateral: position.raw_supply,
            raw_debt: raw_debt.saturating_sub(position.raw_dust_debt),
            tick: position.tick,
            is_supply_only: false,
            was_liquidated: false,
        });
    }

    let source = liquidation_source.ok_or(EngineError::MissingLiquidationSource {
        tick: position.tick,
    })?;
    let resolved = branch::resolve(branches, source.branch_id, source.connection_factor, raw_debt)?;
    if resolved.raw_debt > position.raw_dust_debt {
        Ok(PositionState {
            raw_collateral: resolved.raw_collateral,
            raw_debt: resolved.raw_debt - position.raw_dust_debt,
            tick: resolved.tick,
            is_supply_only: false,
            was_liquidated: true,
        })
    } else {
        // liquidated out entirely; the dust goes with it
        Ok(PositionState {
            raw_collateral: 0,
            raw_debt: 0,
            tick: MIN_TICK,
            is_supply_only: true,
            was_liquidated: true,
        })
    }
}

/// Simulates an operate call against a realized position state.
///
/// Rounding always favors the protocol: deposits record the floor of the
/// converted amount, withdrawals remove the ceiling, borrows add the
/// ceiling plus a ceiled fee, paybacks credit one unit under the floor.
/// [`FULL_AMOUNT`] deltas settle the exact recorded amount instead.
pub fn operate(
    state: &PositionState,
    collateral_change: i128,
    debt_change: i128,
    prices: &ExchangePrices,
    borrow_fee_bps: u16,
) -> Result<OperateOutcome, EngineError> {
    if prices.supply_exchange_price == 0 || prices.borrow_exchange_price == 0 {
        return Err(EngineError::ExchangePriceZero);
    }

    let mut raw_collateral = state.raw_collateral;
    let mut raw_debt = state.raw_debt;
    let mut collateral_amount = collateral_change;
    let mut debt_amount = debt_change;

    if collateral_change == FULL_AMOUNT {
        let payoff = math::mul_div_floor(
            raw_collateral,
            prices.supply_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?;
        collateral_amount = -i128::try_from(payoff).map_err(|_| EngineError::ValueOverflow)?;
        raw_collateral = 0;
    } else if collateral_change > 0 {
        let added = math::mul_div_floor(
            collateral_change.unsigned_abs(),
            EXCHANGE_PRICES_PRECISION,
            prices.supply_exchange_price,
        )?;
        raw_collateral = math::checked_add(raw_collateral, added)?;
    } else if collateral_change < 0 {
        let removed = math::mul_div_ceil(
            collateral_change.unsigned_abs(),
            EXCHANGE_PRICES_PRECISION,
            prices.supply_exchange_price,
        )?;
        if removed > raw_collateral {
            return Err(EngineError::InsufficientCollateral {
                requested: removed,
                available: raw_collateral,
            });
        }
        raw_collateral -= removed;
    }

    if debt_change == FULL_AMOUNT {
        let payoff = math::mul_div_ceil(
            raw_debt,
            prices.borrow_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?;
        debt_amount = -i128::try_from(payoff).map_err(|_| EngineError::ValueOverflow)?;
        raw_debt = 0;
    } else if debt_change > 0 {
        let raw_borrow = math::mul_div_ceil(
            debt_change.unsigned_abs(),
            EXCHANGE_PRICES_PRECISION,
            prices.borrow_exchange_price,
        )?;
        let fee = math::mul_div_ceil(raw_borrow, u128::from(borrow_fee_bps), FOUR_DECIMALS)?;
        raw_debt = math::checked_add(raw_debt, math::checked_add(raw_borrow, fee)?)?;
    } else if debt_change < 0 {
        let removed = math::mul_div_floor(
            debt_change.unsigned_abs(),
            EXCHANGE_PRICES_PRECISION,
            prices.borrow_exchange_price,
        )?
        .saturating_sub(1);
        if removed > raw_debt {
            return Err(EngineError::InsufficientDebt {
                requested: removed,
                available: raw_debt,
            });
        }
        raw_debt -= removed;
    }

    // a no-op can only come out of the sentinel paths on an empty position
    if collateral_amount == 0 && debt_amount == 0 {
        return Err(EngineError::InvalidOperateAmount);
    }

    if raw_debt == 0 || raw_collateral == 0 {
        return Ok(OperateOutcome {
            raw_collateral,
            raw_debt,
            tick: MIN_TICK,
            is_supply_only: true,
            collateral_amount,
            debt_amount,
        });
    }

    // fixed +0.0000001% debt margin; the final tick always rounds stricter
    let margin_debt = raw_debt + math::ceil_div(raw_debt, TICK_MARGIN_DIVISOR);
    let ratio = math::mul_div_floor(margin_debt, ZERO_TICK_SCALED_RATIO, raw_collateral)?;
    let final_tick = (tick::tick_at_ratio(ratio)? + 1).clamp(MIN_TICK, MAX_TICK);

    Ok(OperateOutcome {
        raw_collateral,
        raw_debt,
        tick: final_tick,
        is_supply_only: false,
        collateral_amount,
        debt_amount,
    })
}

/// Scales a realized state into asset-denominated balances: supply rounds
/// down, debt rounds up.
pub fn position_view(
    state: &PositionState,
    prices: &ExchangePrices,
) -> Result<PositionView, EngineError> {
    if prices.supply_exchange_price == 0 || prices.borrow_exchange_price == 0 {
        return Err(EngineError::ExchangePriceZero);
    }
    Ok(PositionView {
        supply: math::mul_div_floor(
            state.raw_collateral,
            prices.supply_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?,
        debt: math::mul_div_ceil(
            state.raw_debt,
            prices.borrow_exchange_price,
            EXCHANGE_PRICES_PRECISION,
        )?,
        tick: state.tick,
        is_liquidated: state.was_liquidated,
        is_supply_only: state.is_supply_only,
    })
}
