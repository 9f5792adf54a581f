//! Error types for the vault accounting engine.
//!
//! Errors fall into three classes:
//!
//! - **Invalid input**: the caller supplied a value outside the engine's
//!   domain (out-of-range tick or ratio, non-canonical packed number, zero
//!   divisor, ...). Recoverable by rejecting or re-deriving the input.
//! - **Arithmetic faults**: exponent or value overflow/underflow inside the
//!   fixed-point pipeline. These signal a logic bug or a corrupted snapshot
//!   and must propagate to the caller unhandled. The one deliberate
//!   exception is exponent overflow in [`crate::bignum::mul_big_number`],
//!   which saturates to [`crate::bignum::BigNumber::MAX_MASK`] instead.
//! - **Inconsistent ledger state**: the supplied snapshot is incomplete or
//!   self-contradictory (missing branch, timestamp regression). Computing
//!   further would produce an unverifiable result.

use thiserror::Error;

/// Errors produced by the accounting engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A packed big number is not in canonical form (35-bit coefficient with
    /// the top bit set and a non-zero exponent).
    #[error("non-canonical big number 0x{value:x}")]
    NonCanonical { value: u64 },

    /// `mul_div_normal` requires the divisor's exponent to be at least the
    /// dividend's.
    #[error("big number exponent order violated: dividend {dividend_exponent} > divisor {divisor_exponent}")]
    ExponentOrder {
        dividend_exponent: u16,
        divisor_exponent: u16,
    },

    /// Division by a zero value or zero coefficient.
    #[error("division by zero")]
    ZeroDivisor,

    /// A big number exponent fell below the representable minimum.
    #[error("big number exponent underflow ({exponent})")]
    ExponentUnderflow { exponent: i64 },

    /// A big number exponent exceeded the representable maximum.
    #[error("big number exponent overflow ({exponent})")]
    ExponentOverflow { exponent: i64 },

    /// An intermediate or final value exceeded its contractual width.
    #[error("value overflow")]
    ValueOverflow,

    /// Tick outside [`crate::tick::MIN_TICK`]..=[`crate::tick::MAX_TICK`].
    #[error("tick {tick} out of range")]
    TickOutOfRange { tick: i32 },

    /// Ratio outside the representable tick-ratio domain.
    #[error("ratio {ratio} out of range")]
    RatioOutOfRange { ratio: u128 },

    /// An exchange price of zero means the reserve was never initialized.
    #[error("exchange price is zero")]
    ExchangePriceZero,

    /// The supplied timestamp is older than the snapshot's last update.
    #[error("timestamp {now} is before last update {last_update}")]
    TimestampRegression { now: u64, last_update: u64 },

    /// A referenced branch is absent from the supplied snapshot.
    #[error("branch {branch_id} not found in snapshot")]
    BranchNotFound { branch_id: u32 },

    /// The branch parent chain is longer than the snapshot, i.e. cyclic.
    #[error("branch graph cycle detected starting from branch {start_branch_id}")]
    BranchCycle { start_branch_id: u32 },

    /// The tick record shows the position was liquidated but no liquidation
    /// source record was supplied.
    #[error("liquidation source missing for tick {tick}")]
    MissingLiquidationSource { tick: i32 },

    /// Both operate deltas resolved to zero.
    #[error("operate amounts resolve to zero")]
    InvalidOperateAmount,

    /// Withdrawal larger than the recorded collateral.
    #[error("insufficient collateral: requested {requested}, available {available}")]
    InsufficientCollateral { requested: u128, available: u128 },

    /// Payback larger than the recorded debt.
    #[error("insufficient debt: requested {requested}, available {available}")]
    InsufficientDebt { requested: u128, available: u128 },

    /// Rate curve kinks are not strictly increasing within (0, 100%).
    #[error("invalid rate curve")]
    InvalidRateCurve,
}
