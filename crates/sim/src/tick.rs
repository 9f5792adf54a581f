//! Tick index to price ratio conversion.
//!
//! The vault prices collateral on a geometric ladder with growth 1.0015 per
//! tick: `ratio(tick) = 1.0015^tick * 2^48`. Conversion runs through binary
//! exponentiation over precomputed per-bit constants; both directions
//! reproduce the on-chain program's integer arithmetic step for step, and
//! round-trip within one tick across the whole domain.

use crate::error::EngineError;

/// Lowest representable tick.
pub const MIN_TICK: i32 = -16383;

/// Highest representable tick.
pub const MAX_TICK: i32 = 16383;

/// "Never touched" sentinel for stored position ticks. Not a valid tick.
pub const INIT_TICK: i32 = i32::MIN;

/// `ratio_at_tick(0)`: the 2^48 scale of all tick ratios.
pub const ZERO_TICK_SCALED_RATIO: u128 = 1 << 48;

/// `ratio_at_tick(MIN_TICK)`, the smallest ratio in the domain.
pub const MIN_RATIO: u128 = 6093;

/// `ratio_at_tick(MAX_TICK)`, the largest ratio in the domain.
pub const MAX_RATIO: u128 = 13_002_088_133_096_036_565_414_295;

/// Scale of a tick's 30-bit partial-liquidation fraction (`2^30` = whole).
pub const X30: u64 = 1 << 30;

/// Q64 identity factor the exponentiation ladder starts from.
const FACTOR_BASE: u128 = 1 << 64;

/// `floor(2^64 / 1.0015^(2^k))` for bit k of the tick magnitude.
const FACTORS: [u128; 14] = [
    18_419_115_400_608_638_658, // 1.0015^1
    18_391_528_108_445_969_703, // 1.0015^2
    18_336_477_419_114_433_395, // 1.0015^4
    18_226_869_890_870_665_592, // 1.0015^8
    18_009_616_477_100_071_088, // 1.0015^16
    17_582_847_377_087_825_313, // 1.0015^32
    16_759_408_633_341_240_198, // 1.0015^64
    15_226_414_841_393_184_936, // 1.0015^128
    12_568_272_644_527_235_156, // 1.0015^256
    8_563_108_841_104_354_676,  // 1.0015^512
    3_975_055_583_337_633_974,  // 1.0015^1024
    856_577_552_520_149_366,    // 1.0015^2048
    39_775_317_560_084_772,     // 1.0015^4096
    85_764_505_686_419,         // 1.0015^8192
];

/// `floor(1.0015^(2^k) * 1e13)`, the descending-search thresholds.
const THRESHOLDS: [u128; 14] = [
    10_015_000_000_000,            // 1.0015^1
    10_030_022_500_000,            // 1.0015^2
    10_060_135_135_050,            // 1.0015^4
    10_120_631_893_548,            // 1.0015^8
    10_242_718_992_470,            // 1.0015^16
    10_491_329_235_870,            // 1.0015^32
    11_006_798_913_543,            // 1.0015^64
    12_114_962_232_318,            // 1.0015^128
    14_677_230_989_050,            // 1.0015^256
    21_542_110_950_595,            // 1.0015^512
    46_406_254_420_776,            // 1.0015^1024
    215_354_044_936_586,           // 1.0015^2048
    4_637_736_467_054_931,        // 1.0015^4096
    2_150_859_953_785_115_391,    // 1.0015^8192
];

/// Scale the threshold search operates in.
const RATIO_SCALE: u128 = 10_000_000_000_000;

/// Returns `1.0015^tick * 2^48`.
pub fn ratio_at_tick(tick: i32) -> Result<u128, EngineError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(EngineError::TickOutOfRange { tick });
    }
    let magnitude = tick.unsigned_abs();
    let mut factor = FACTOR_BASE;
    for (bit, &step) in FACTORS.iter().enumerate() {
        if magnitude & (1 << bit) != 0 {
            factor = (factor * step) >> 64;
        }
    }
    if tick > 0 {
        // the ladder composes negative powers; invert for positive ticks,
        // with a correction bit so truncation never rounds toward zero twice
        let inverse = u128::MAX / factor;
        factor = inverse + u128::from(u128::MAX % factor != 0);
    }
    // the domain bound is the exact real ratio rounded up; the Q64 ladder
    // can overshoot it at the very top tick
    Ok((factor >> 16).min(MAX_RATIO))
}

/// Returns the largest tick whose ratio does not exceed `ratio`, within one
/// tick: `tick_at_ratio(ratio_at_tick(t))` is always in `t-1..=t+1`.
pub fn tick_at_ratio(ratio: u128) -> Result<i32, EngineError> {
    if !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(EngineError::RatioOutOfRange { ratio });
    }
    let (mut factor, inverted) = if ratio >= ZERO_TICK_SCALED_RATIO {
        ((ratio * RATIO_SCALE) >> 48, false)
    } else {
        ((RATIO_SCALE << 48) / ratio, true)
    };
    let mut magnitude: u32 = 0;
    for bit in (0..THRESHOLDS.len()).rev() {
        let threshold = THRESHOLDS[bit];
        if factor >= threshold {
            magnitude |= 1 << bit;
            factor = factor * RATIO_SCALE / threshold;
        }
    }
    let tick = magnitude as i32;
    Ok(if inverted { !tick } else { tick })
}

/// Effective ratio of a partially liquidated tick: interpolates between the
/// tick's ratio and the ratio one spacing below by the 30-bit `partials`
/// fraction.
pub fn ratio_at_tick_partials(tick_ratio: u128, partials: u64) -> u128 {
    let one_below = tick_ratio * 10_000 / 10_015;
    one_below + (tick_ratio - one_below) * u128::from(partials) / u128::from(X30)
}
