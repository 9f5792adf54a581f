//! Liquidation branch graph and position realization.
//!
//! Every liquidation event is recorded as a branch. Branches merge when a
//! liquidation sweeps past the minima tick of an older branch (the debt
//! factor of a merged branch becomes a connection factor to its parent),
//! and close when their liquidity is fully absorbed. A position that was
//! sitting on a liquidated tick realizes its remaining debt by walking its
//! branch lineage and composing the recorded factors.

use serde::{Deserialize, Serialize};

use crate::bignum::{self, BigNumber};
use crate::error::EngineError;
use crate::math;
use crate::tick::{self, MIN_TICK, ZERO_TICK_SCALED_RATIO};

/// Life cycle of a liquidation branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// Currently accruing liquidations.
    Open,
    /// Liquidated but still holding debt liquidity.
    Liquidated,
    /// Merged into its connected (parent) branch; `debt_factor` is the
    /// connection factor toward that parent.
    Merged,
    /// Terminal: all liquidity absorbed.
    Closed,
}

/// Snapshot of a liquidation branch record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: u32,
    pub status: BranchStatus,
    /// Parent branch this one merged into (meaningful when `Merged`).
    pub connected_branch_id: u32,
    /// Parent's minima tick at merge time, or [`crate::tick::INIT_TICK`].
    pub connected_minima_tick: i32,
    /// Lowest tick this branch liquidated into.
    pub minima_tick: i32,
    /// 30-bit fraction of the minima tick already liquidated.
    pub minima_tick_partials: u64,
    /// Realization factor, or connection factor while `Merged`.
    pub debt_factor: BigNumber,
    /// Raw debt still liquidatable on this branch.
    pub debt_liquidity: u128,
}

/// Outcome of resolving a position through its branch lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPosition {
    pub raw_collateral: u128,
    pub raw_debt: u128,
    pub tick: i32,
}

impl ResolvedPosition {
    const ABSORBED: ResolvedPosition = ResolvedPosition {
        raw_collateral: 0,
        raw_debt: 0,
        tick: MIN_TICK,
    };
}

/// Realizes a position's collateral and debt after liquidation.
///
/// Walks the parent chain from `start_branch_id` while branches are merged,
/// composing `connection_factor` with each branch's stored factor, then
/// realizes `initial_debt` against the terminal branch:
///
/// * a `Closed` terminal branch, or a connection factor saturated to
///   `MAX_MASK`, means the position was fully absorbed;
/// * a realized debt at or below 1% of the initial debt is dust and zeroes
///   out entirely;
/// * otherwise a fixed 0.01% haircut is applied (the liquidation discount
///   the branch already absorbed) and collateral is valued at the branch's
///   partially liquidated minima tick.
///
/// The walk is a bounded loop, not recursion: every step must resolve to a
/// branch inside the snapshot, and a chain longer than the snapshot is
/// reported as a cycle.
pub fn resolve(
    branches: &[Branch],
    start_branch_id: u32,
    connection_factor: BigNumber,
    initial_debt: u128,
) -> Result<ResolvedPosition, EngineError> {
    let mut factor = connection_factor;
    let mut branch = find(branches, start_branch_id)?;
    let mut remaining = branches.len();
    while branch.status == BranchStatus::Merged && !factor.is_max_mask() {
        factor = bignum::mul_big_number(factor, branch.debt_factor)?;
        if factor.is_max_mask() {
            break;
        }
        if remaining == 0 {
            return Err(EngineError::BranchCycle { start_branch_id });
        }
        remaining -= 1;
        branch = find(branches, branch.connected_branch_id)?;
    }

    if branch.status == BranchStatus::Closed || factor.is_max_mask() {
        tracing::debug!(branch_id = branch.id, "position fully absorbed");
        return Ok(ResolvedPosition::ABSORBED);
    }

    let mut realized_debt = bignum::mul_div_normal(initial_debt, branch.debt_factor, factor)?;
    if realized_debt <= initial_debt / 100 {
        // dust threshold: treat as fully liquidated
        realized_debt = 0;
    } else {
        // 0.01% haircut already taken by the branch
        realized_debt = realized_debt * 9_999 / 10_000;
    }
    if realized_debt == 0 {
        return Ok(ResolvedPosition::ABSORBED);
    }

    let tick_ratio = tick::ratio_at_tick(branch.minima_tick)?;
    let ratio = tick::ratio_at_tick_partials(tick_ratio, branch.minima_tick_partials);
    let raw_collateral = math::mul_div_floor(realized_debt, ZERO_TICK_SCALED_RATIO, ratio)?;
    Ok(ResolvedPosition {
        raw_collateral,
        raw_debt: realized_debt,
        tick: branch.minima_tick,
    })
}

fn find(branches: &[Branch], branch_id: u32) -> Result<&Branch, EngineError> {
    branches
        .iter()
        .find(|branch| branch.id == branch_id)
        .ok_or(EngineError::BranchNotFound { branch_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::X30;

    fn branch(id: u32, status: BranchStatus, parent: u32, minima_tick: i32, partials: u64, factor: BigNumber) -> Branch {
        Branch {
            id,
            status,
            connected_branch_id: parent,
            connected_minima_tick: tick::INIT_TICK,
            minima_tick,
            minima_tick_partials: partials,
            debt_factor: factor,
            debt_liquidity: 0,
        }
    }

    fn half() -> BigNumber {
        BigNumber::new(1 << 34, 16383).unwrap()
    }

    fn three_quarters() -> BigNumber {
        BigNumber::new(3 << 33, 16383).unwrap()
    }

    #[test]
    fn resolves_through_a_merged_chain() {
        let branches = [
            branch(3, BranchStatus::Merged, 2, -100, X30, three_quarters()),
            branch(2, BranchStatus::Liquidated, 0, -150, X30 / 2, half()),
        ];
        let resolved = resolve(&branches, 3, BigNumber::ONE, 1_000_000).unwrap();
        // 1e6 * 0.5 / 0.75 = 666666, dust check passes, haircut leaves 666599
        assert_eq!(resolved.raw_debt, 666_599);
        assert_eq!(resolved.raw_collateral, 835_281);
        assert_eq!(resolved.tick, -150);
    }

    #[test]
    fn terminal_branch_without_merge() {
        let branches = [branch(1, BranchStatus::Liquidated, 0, -150, X30 / 2, half())];
        let direct = resolve(&branches, 1, three_quarters(), 1_000_000).unwrap();
        let chained = [
            branch(3, BranchStatus::Merged, 1, -100, X30, three_quarters()),
            branch(1, BranchStatus::Liquidated, 0, -150, X30 / 2, half()),
        ];
        let merged = resolve(&chained, 3, BigNumber::ONE, 1_000_000).unwrap();
        assert_eq!(direct, merged);
    }

    #[test]
    fn closed_branch_absorbs_everything() {
        let branches = [branch(1, BranchStatus::Closed, 0, -10, X30, half())];
        let resolved = resolve(&branches, 1, BigNumber::ONE, 1_000_000).unwrap();
        assert_eq!(resolved, ResolvedPosition::ABSORBED);
        assert_eq!(resolved.tick, MIN_TICK);
    }

    #[test]
    fn max_mask_connection_absorbs_everything() {
        let branches = [branch(1, BranchStatus::Liquidated, 0, -10, X30, half())];
        let resolved = resolve(&branches, 1, BigNumber::MAX_MASK, 1_000_000).unwrap();
        assert_eq!(resolved, ResolvedPosition::ABSORBED);
    }

    #[test]
    fn saturating_composition_absorbs_everything() {
        // two merged branches with near-floor factors push the composed
        // connection factor past the exponent range
        let tiny = BigNumber::new(1 << 34, 30_000).unwrap();
        let branches = [
            branch(3, BranchStatus::Merged, 2, -10, X30, tiny),
            branch(2, BranchStatus::Merged, 1, -20, X30, tiny),
            branch(1, BranchStatus::Liquidated, 0, -30, X30, half()),
        ];
        let resolved = resolve(&branches, 3, tiny, 1_000_000).unwrap();
        assert_eq!(resolved, ResolvedPosition::ABSORBED);
    }

    #[test]
    fn dust_debt_is_zeroed() {
        // factor composition leaves 1% of the debt -> dust rule forces 0
        let branches = [branch(1, BranchStatus::Liquidated, 0, -10, X30, half())];
        let two = BigNumber::new(1 << 34, 16385).unwrap();
        // realized = 100 * 0.5 / 2 = 25 > 1, keep; with initial 10_000 and a
        // deep factor the realized amount falls under initial/100
        let deep = BigNumber::new(1 << 34, 16391).unwrap(); // 2^7 = 128x
        let resolved = resolve(&branches, 1, deep, 10_000).unwrap();
        // 10_000 * 0.5 / 128 = 39 <= 100 -> dust
        assert_eq!(resolved, ResolvedPosition::ABSORBED);
        let kept = resolve(&branches, 1, two, 10_000).unwrap();
        assert_eq!(kept.raw_debt, 10_000 / 4 * 9_999 / 10_000);
    }

    #[test]
    fn resolver_never_increases_debt() {
        let factors = [
            BigNumber::ONE,
            half(),
            three_quarters(),
            BigNumber::new((1 << 35) - 1, 16383).unwrap(),
        ];
        let branches = [branch(1, BranchStatus::Liquidated, 0, -50, X30, half())];
        for connection in factors {
            for initial_debt in [100u128, 12_345, 1_000_000, u128::from(u32::MAX)] {
                let resolved = resolve(&branches, 1, connection, initial_debt).unwrap();
                assert!(resolved.raw_debt <= initial_debt);
            }
        }
    }

    #[test]
    fn missing_branch_is_inconsistent_state() {
        let branches = [branch(3, BranchStatus::Merged, 2, -100, X30, three_quarters())];
        assert_eq!(
            resolve(&branches, 7, BigNumber::ONE, 1_000),
            Err(EngineError::BranchNotFound { branch_id: 7 })
        );
        assert_eq!(
            resolve(&branches, 3, BigNumber::ONE, 1_000),
            Err(EngineError::BranchNotFound { branch_id: 2 })
        );
    }

    #[test]
    fn cyclic_branch_graph_is_detected() {
        let branches = [
            branch(1, BranchStatus::Merged, 2, -10, X30, BigNumber::ONE),
            branch(2, BranchStatus::Merged, 1, -20, X30, BigNumber::ONE),
        ];
        assert_eq!(
            resolve(&branches, 1, BigNumber::ONE, 1_000),
            Err(EngineError::BranchCycle { start_branch_id: 1 })
        );
    }
}
