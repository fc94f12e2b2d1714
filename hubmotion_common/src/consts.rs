//! System-wide constants for the hubmotion workspace.
//!
//! Single source of truth for time bases, unit scales and limits.
//! Imported by all crates.
//!
//! ## Units
//!
//! | Quantity | Unit |
//! |----------|------|
//! | time | tick (100 µs), wrapping `u32` |
//! | angle | millidegree (mdeg) |
//! | speed | mdeg/s |
//! | acceleration | mdeg/s² |
//! | torque | µNm |
//! | voltage | mV |
//! | duty cycle | ±10000 |

use static_assertions::const_assert;

/// Maximum number of axes (one per motor port on the largest hub).
pub const MAX_AXES: usize = 6;

/// Control ticks per millisecond (1 tick = 100 µs).
pub const TICKS_PER_MS: u32 = 10;

/// Microseconds per control tick.
pub const US_PER_TICK: u32 = 1000 / TICKS_PER_MS;

/// Millidegrees per degree.
pub const MDEG_PER_DEG: i32 = 1000;

/// Period of the servo control loop in milliseconds.
pub const CONTROL_LOOP_TIME_MS: u32 = 5;

/// Period of the servo control loop in ticks.
pub const CONTROL_LOOP_TICKS: u32 = CONTROL_LOOP_TIME_MS * TICKS_PER_MS;

/// Longest finite motion command in milliseconds (30 minutes).
pub const DURATION_MAX_MS: u32 = 30 * 60 * 1000;

/// Longest finite motion command in ticks.
pub const DURATION_MAX_TICKS: u32 = DURATION_MAX_MS * TICKS_PER_MS;

/// Sentinel duration used for commands that never end.
pub const DURATION_FOREVER_TICKS: i32 = i32::MAX;

/// Relative trajectory time after which an unbounded profile is rebased.
pub const REBASE_THRESHOLD_TICKS: i32 = 1 << 30;

/// Lowest speed limit a trajectory can be planned with [mdeg/s].
pub const SPEED_LIMIT_MIN: i32 = 100;

/// Highest speed limit a trajectory can be planned with [mdeg/s].
pub const SPEED_LIMIT_MAX: i32 = 20_000_000;

/// Lowest acceleration or deceleration a trajectory can be planned with
/// [mdeg/s²].
pub const ACCELERATION_MIN: i32 = 1000;

/// Farthest a single angle command can travel [mdeg]: top speed for the
/// longest duration.
pub const ANGLE_MAX: i64 = SPEED_LIMIT_MAX as i64 * DURATION_MAX_MS as i64 / 1000;

/// Full-scale duty cycle magnitude.
pub const MAX_DUTY: i32 = 10_000;

/// Default motor battery voltage of a Powered Up hub [mV].
pub const NOMINAL_BATTERY_MV: i32 = 7_200;

const_assert!(DURATION_MAX_TICKS < REBASE_THRESHOLD_TICKS as u32);
const_assert!(CONTROL_LOOP_TICKS > 0);
const_assert!(DURATION_MAX_MS.checked_mul(TICKS_PER_MS).is_some());
const_assert!(US_PER_TICK * TICKS_PER_MS == 1000);

/// Convert milliseconds to ticks, `None` if the result does not fit.
#[inline]
pub const fn ms_to_ticks(ms: u32) -> Option<u32> {
    ms.checked_mul(TICKS_PER_MS)
}

/// Convert ticks to milliseconds (truncating).
#[inline]
pub const fn ticks_to_ms(ticks: u32) -> u32 {
    ticks / TICKS_PER_MS
}

/// Signed difference `now - then` between two wrapping tick stamps.
#[inline]
pub const fn ticks_since(now: u32, then: u32) -> i32 {
    now.wrapping_sub(then) as i32
}
