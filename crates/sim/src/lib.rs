//! Tick Vault Simulation SDK
//!
//! This crate is the off-chain accounting mirror for a tick-indexed,
//! branch-liquidated lending vault and its paired interest-accrual engine.
//! Given snapshots of the on-ledger records it computes, without submitting
//! a transaction, exactly what the on-chain program would compute: current
//! exchange prices, a position's realized collateral and debt after any
//! liquidation that passed over it, and the time-expanding withdraw/borrow
//! limits in force.
//!
//! # Overview
//!
//! - [`bignum`] — the packed 50-bit coefficient+exponent codec debt factors
//!   compound in
//! - [`tick`] — tick index <-> 2^48-scaled price ratio conversion
//! - [`branch`] — liquidation branch graph resolution
//! - [`position`] — position valuation and operate simulation
//! - [`reserve`] — exchange price compounding, rate curves and revenue
//! - [`limit`] — time-expanding withdrawal/borrow limits
//!
//! Every function is a pure transform from an input snapshot to an output
//! value: no I/O, no retained state, and safe to call concurrently as long
//! as each call gets a mutually consistent snapshot. Fetching accounts,
//! decoding them and assembling transactions belong to the layers above.
//!
//! Parity with the on-chain program is bit-for-bit, including rounding
//! directions (always in the protocol's favor) and the defined saturation
//! of debt factors to "fully liquidated".
//!
//! # Example
//!
//! ```rust
//! use tickvault_sim::position::{self, Position, TickRecord};
//! use tickvault_sim::reserve::{self, ExchangePrices};
//! use tickvault_sim::tick::INIT_TICK;
//!
//! // a supply-only position valued at current prices
//! let stored = Position {
//!     tick: INIT_TICK,
//!     tick_id: 0,
//!     raw_supply: 1_000_000,
//!     raw_dust_debt: 0,
//!     is_supply_only: true,
//! };
//! let record = TickRecord { total_ids: 0, is_liquidated: false, raw_debt: 0 };
//! let state = position::current_state(&stored, &record, None, &[]).unwrap();
//!
//! let prices = ExchangePrices {
//!     supply_exchange_price: 1_050_000_000_000,
//!     borrow_exchange_price: 1_100_000_000_000,
//! };
//! let view = position::position_view(&state, &prices).unwrap();
//! assert_eq!(view.supply, 1_050_000);
//! ```

pub mod bignum;
pub mod branch;
pub mod error;
pub mod limit;
pub mod math;
pub mod position;
pub mod reserve;
pub mod tick;

// Re-export commonly used types
pub use error::EngineError;

// Big number exports
pub use bignum::{
    div_big_number, mul_big_number, mul_div_big_number, mul_div_normal, BigNumber,
};

// Tick math exports
pub use tick::{
    ratio_at_tick, ratio_at_tick_partials, tick_at_ratio, INIT_TICK, MAX_RATIO, MAX_TICK,
    MIN_RATIO, MIN_TICK, X30, ZERO_TICK_SCALED_RATIO,
};

// Branch exports
pub use branch::{resolve, Branch, BranchStatus, ResolvedPosition};

// Position exports
pub use position::{
    current_state, operate, position_view, LiquidationSource, OperateOutcome, Position,
    PositionState, PositionView, TickRecord, FULL_AMOUNT,
};

// Reserve exports
pub use reserve::{
    advance, advance_prices, revenue, utilization, ExchangePrices, RateModel, ReserveSnapshot,
};

// Limit exports
pub use limit::{borrow_limit, denormalize, normalize, withdrawal_limit};

// Math exports
pub use math::{EXCHANGE_PRICES_PRECISION, FOUR_DECIMALS, SECONDS_PER_YEAR};
