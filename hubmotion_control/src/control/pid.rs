//! Integer PID terms in the torque domain.
//!
//! ```text
//! P = kp · position_error / 1000     [µNm/deg · mdeg]
//! I = ki · integral / 1_000_000      [µNm/(deg·s) · mdeg·ms]
//! D = kd · speed_error / 1000        [µNm/(deg/s) · mdeg/s]
//! ```
//!
//! Zero gains disable their term. Saturation is applied by the caller.

use hubmotion_common::settings::ControlSettings;

/// PID gains, extracted from [`ControlSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidGains {
    /// Proportional gain [µNm/deg].
    pub kp: i32,
    /// Integral gain [µNm/(deg·s)].
    pub ki: i32,
    /// Derivative gain [µNm/(deg/s)].
    pub kd: i32,
    /// Output saturation [µNm].
    pub actuation_max: i32,
}

impl From<&ControlSettings> for PidGains {
    fn from(s: &ControlSettings) -> Self {
        Self {
            kp: s.pid_kp,
            ki: s.pid_ki,
            kd: s.pid_kd,
            actuation_max: s.actuation_max,
        }
    }
}

/// Individual PID contributions [µNm], unsaturated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidTerms {
    pub proportional: i64,
    pub integral: i64,
    pub derivative: i64,
}

impl PidTerms {
    /// Sum of all terms clamped to `±actuation_max`.
    #[inline]
    pub fn saturated_total(&self, actuation_max: i32) -> i32 {
        saturate(self.proportional + self.integral + self.derivative, actuation_max)
    }

    /// Whether the proportional term alone is pushing at the limit in the
    /// direction the axis is lagging.
    ///
    /// `speed_error` is reference minus measured; a positive value means the
    /// axis lags in the positive direction.
    #[inline]
    pub fn windup(&self, speed_error: i32, actuation_max: i32) -> bool {
        let max = actuation_max as i64;
        (self.proportional >= max && speed_error > 0) || (self.proportional <= -max && speed_error < 0)
    }
}

/// Clamp a torque to `±limit` and narrow to `i32`.
#[inline]
pub fn saturate(torque: i64, limit: i32) -> i32 {
    let limit = limit.max(0) as i64;
    torque.clamp(-limit, limit) as i32
}

/// Compute the three PID terms.
///
/// # Arguments
/// - `position_error`: reference minus measured position [mdeg].
/// - `integral`: accumulated position error [mdeg·ms], or 0 when the
///   objective has no integral action.
/// - `speed_error`: reference minus measured speed [mdeg/s].
#[inline]
pub fn pid_compute(gains: &PidGains, position_error: i64, integral: i64, speed_error: i32) -> PidTerms {
    PidTerms {
        proportional: gains.kp as i64 * position_error / 1000,
        integral: gains.ki as i64 * integral / 1_000_000,
        derivative: gains.kd as i64 * speed_error as i64 / 1000,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
