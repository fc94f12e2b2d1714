//! Model-based feedforward torque.
//!
//! Torque needed to follow the reference on an unloaded motor:
//!
//! ```text
//! ff = f_low × sign(ω) + k_0·k_2 × ω + k_0·k_1 × α
//! ```
//!
//! with ω in deg/s and α in deg/s². The first term is Coulomb friction, the
//! second back-EMF, the third inertia.

use hubmotion_common::motor::MotorModel;

/// Feedforward coefficients in SI-ish units, extracted from a [`MotorModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedforwardGains {
    /// Torque per volt [Nm/V].
    pub k_0: f32,
    /// Volts per deg/s² [V/(deg/s²)].
    pub k_1: f32,
    /// Volts per deg/s [V/(deg/s)].
    pub k_2: f32,
    /// Coulomb friction [Nm].
    pub f_low: f32,
}

impl From<&MotorModel> for FeedforwardGains {
    fn from(m: &MotorModel) -> Self {
        Self {
            k_0: m.k_0,
            k_1: m.k_1,
            k_2: m.k_2,
            f_low: m.f_low,
        }
    }
}

/// Feedforward torque [µNm] for a reference speed [mdeg/s] and
/// acceleration [mdeg/s²].
#[inline]
pub fn feedforward_compute(gains: &FeedforwardGains, speed_ref: i32, accel_ref: i32) -> i32 {
    let w = speed_ref as f32 / 1000.0;
    let a = accel_ref as f32 / 1000.0;

    let friction = if speed_ref > 0 {
        gains.f_low
    } else if speed_ref < 0 {
        -gains.f_low
    } else {
        0.0
    };
    let torque = friction + gains.k_0 * gains.k_2 * w + gains.k_0 * gains.k_1 * a;

    (torque * 1_000_000.0) as i32
}

// ─── Tests ──────────────────────────────────────────────────────────
