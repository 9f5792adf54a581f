//! Time-expanding withdrawal and borrow limits.
//!
//! Limits gate how fast a protocol user can move against the pool. After
//! every operation the stored limit sits at its tightest value and then
//! expands linearly over `expand_duration` seconds until it is
//! `expand_percent` away from the position size. The engine computes the
//! limit currently in force from the stored limit and the elapsed time;
//! converting between raw and asset units is the caller's concern and uses
//! the helpers at the bottom.

use crate::math::{EXCHANGE_PRICES_PRECISION, FOUR_DECIMALS};

/// Withdrawal limit currently in force.
///
/// A stored limit of 0 means unrestricted (a fresh position never starts
/// throttled). Otherwise the limit shrinks from `last_limit` toward the
/// fully expanded floor `supply - max_expansion` and never passes it,
/// regardless of how much time elapsed.
pub fn withdrawal_limit(
    last_limit: u128,
    supply: u128,
    expand_percent: u64,
    expand_duration: u64,
    elapsed: u64,
) -> u128 {
    if last_limit == 0 {
        return 0;
    }
    let max_expansion = supply
        .saturating_mul(u128::from(expand_percent))
        / FOUR_DECIMALS;
    let shrink = max_expansion
        .saturating_mul(u128::from(elapsed))
        / u128::from(expand_duration.max(1));
    let expanded = last_limit.saturating_sub(shrink);
    expanded.max(supply.saturating_sub(max_expansion))
}

/// Borrow ceiling currently in force.
///
/// Expands from `last_limit` toward `borrow + max_expansion` and never
/// passes it; the result is raised to at least `base_limit` and capped at
/// `max_limit`. A stored limit of 0 starts fully expanded.
pub fn borrow_limit(
    last_limit: u128,
    borrow: u128,
    expand_percent: u64,
    expand_duration: u64,
    elapsed: u64,
    base_limit: u128,
    max_limit: u128,
) -> u128 {
    let max_expansion = borrow
        .saturating_mul(u128::from(expand_percent))
        / FOUR_DECIMALS;
    let fully_expanded = borrow.saturating_add(max_expansion);
    let expanded = if last_limit == 0 {
        fully_expanded
    } else {
        let growth = max_expansion
            .saturating_mul(u128::from(elapsed))
            / u128::from(expand_duration.max(1));
        last_limit.saturating_add(growth).min(fully_expanded)
    };
    expanded.max(base_limit).min(max_limit)
}

/// Raw units into asset units at the given 1e12-scaled exchange price.
pub fn normalize(raw: u128, exchange_price: u128) -> u128 {
    raw.saturating_mul(exchange_price) / EXCHANGE_PRICES_PRECISION
}

/// Asset units into raw units at the given 1e12-scaled exchange price.
/// `exchange_price` must be non-zero.
pub fn denormalize(amount: u128, exchange_price: u128) -> u128 {
    debug_assert!(exchange_price != 0);
    amount.saturating_mul(EXCHANGE_PRICES_PRECISION) / exchange_price
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL: u128 = 1_000_000_000;
    const PERCENT_20: u64 = 2000;
    const DURATION: u64 = 1000;

    #[test]
    fn zero_stored_limit_is_unrestricted() {
        assert_eq!(withdrawal_limit(0, 5 * SOL, PERCENT_20, DURATION, 0), 0);
        assert_eq!(withdrawal_limit(0, 5 * SOL, PERCENT_20, DURATION, DURATION * 10), 0);
    }

    #[test]
    fn withdrawal_limit_expands_linearly() {
        // 0.9 supply at 20%: after 10% of the duration the 0.8 stored limit
        // has shrunk by 0.018
        let limit = withdrawal_limit(SOL * 8 / 10, SOL * 9 / 10, PERCENT_20, DURATION, 100);
        assert_eq!(limit, 782_000_000);
    }

    #[test]
    fn withdrawal_limit_stops_at_full_expansion() {
        let floor = withdrawal_limit(SOL * 8 / 10, SOL * 9 / 10, PERCENT_20, DURATION, DURATION);
        assert_eq!(floor, 720_000_000); // 0.9 - 20%
        // further elapsed time never goes below the floor
        for elapsed in [DURATION + 1, DURATION * 10, u64::MAX] {
            assert_eq!(
                withdrawal_limit(SOL * 8 / 10, SOL * 9 / 10, PERCENT_20, DURATION, elapsed),
                floor
            );
        }
    }

    #[test]
    fn withdrawal_limit_tolerates_zero_duration() {
        // a zero duration behaves as one second
        let limit = withdrawal_limit(SOL, SOL, PERCENT_20, 0, 1);
        assert_eq!(limit, SOL - SOL * 2 / 10);
    }

    #[test]
    fn borrow_limit_expands_toward_ceiling() {
        let halfway = borrow_limit(SOL, SOL, PERCENT_20, DURATION, 500, SOL / 2, 10 * SOL);
        assert_eq!(halfway, 1_100_000_000);
        let full = borrow_limit(SOL, SOL, PERCENT_20, DURATION, 5000, SOL / 2, 10 * SOL);
        assert_eq!(full, 1_200_000_000);
        // never exceeds borrow + max_expansion no matter the elapsed time
        assert_eq!(
            borrow_limit(SOL, SOL, PERCENT_20, DURATION, u64::MAX, SOL / 2, 10 * SOL),
            1_200_000_000
        );
    }

    #[test]
    fn borrow_limit_honors_base_and_max() {
        // base floor dominates a small position
        assert_eq!(
            borrow_limit(0, SOL / 100, PERCENT_20, DURATION, 0, SOL / 2, 10 * SOL),
            SOL / 2
        );
        // max cap dominates a huge position
        assert_eq!(
            borrow_limit(0, 100 * SOL, PERCENT_20, DURATION, 0, SOL / 2, 10 * SOL),
            10 * SOL
        );
    }

    #[test]
    fn fresh_borrow_limit_starts_fully_expanded() {
        assert_eq!(
            borrow_limit(0, SOL, PERCENT_20, DURATION, 0, 0, 10 * SOL),
            1_200_000_000
        );
    }

    #[test]
    fn conversion_round_trips_at_parity() {
        assert_eq!(normalize(1234, EXCHANGE_PRICES_PRECISION), 1234);
        assert_eq!(denormalize(1234, EXCHANGE_PRICES_PRECISION), 1234);
        assert_eq!(normalize(1000, 1_100_000_000_000), 1100);
        assert_eq!(denormalize(1100, 1_100_000_000_000), 1000);
    }
}
