//! Per-axis control settings.
//!
//! All values are stored in control units (mdeg, mdeg/s, mdeg/s², µNm,
//! ticks). Setters take application units where the firmware API does and
//! reject negative inputs with [`MotionError::InvalidArgument`] before
//! touching any field.
//!
//! Settings are set once at setup and are read-only during control ticks.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{
    ACCELERATION_MIN, DURATION_MAX_MS, DURATION_MAX_TICKS, MDEG_PER_DEG, SPEED_LIMIT_MAX,
    SPEED_LIMIT_MIN, ms_to_ticks, ticks_to_ms,
};
use crate::error::MotionError;
use crate::motor::{MotorKind, MotorModel};

/// Per-axis control tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Soft limit on reference speed [mdeg/s].
    pub speed_max: i32,
    /// Ramp-up rate [mdeg/s²].
    pub acceleration: i32,
    /// Ramp-down rate [mdeg/s²].
    pub deceleration: i32,
    /// Upper limit on actuation [µNm].
    pub actuation_max: i32,
    /// Position error feedback [µNm/deg].
    pub pid_kp: i32,
    /// Accumulated position error feedback [µNm/(deg·s)].
    pub pid_ki: i32,
    /// Speed error feedback [µNm/(deg/s)].
    pub pid_kd: i32,
    /// Bound on the error fed to the integrator per update [mdeg].
    pub integral_change_max: i32,
    /// Target error below which the integrator does not grow [mdeg].
    pub integral_deadzone: i32,
    /// Allowed deviation from the target position [mdeg].
    pub position_tolerance: i32,
    /// Speed below which the axis counts as standing still [mdeg/s].
    pub speed_tolerance: i32,
    /// Speed that cannot be reached at full actuation when stalled [mdeg/s].
    pub stall_speed_limit: i32,
    /// Minimum consecutive stall time [ticks].
    pub stall_time: u32,
    /// Use the observer speed instead of the measured speed.
    #[serde(default)]
    pub use_estimated_rate: bool,
    /// Add model feedforward torque to the feedback torque.
    #[serde(default = "default_use_feedforward")]
    pub use_feedforward: bool,
}

fn default_use_feedforward() -> bool {
    true
}

impl ControlSettings {
    /// Derive settings for a motor class.
    ///
    /// Deceleration equals acceleration, `actuation_max` is the stall torque
    /// at `max_voltage_mv` and `pid_ki` makes the integral saturate in about
    /// two seconds when stuck at the position tolerance.
    pub fn for_motor(kind: MotorKind, max_voltage_mv: i32) -> Option<Self> {
        let model = kind.model()?;
        Some(Self::from_model(model, max_voltage_mv))
    }

    /// Derive settings from a calibrated model.
    pub fn from_model(model: &MotorModel, max_voltage_mv: i32) -> Self {
        let d = &model.defaults;
        let actuation_max = model.voltage_to_torque(max_voltage_mv).max(1);
        let position_tolerance = d.position_tolerance * MDEG_PER_DEG;
        Self {
            speed_max: d.speed_max * MDEG_PER_DEG,
            acceleration: d.acceleration * MDEG_PER_DEG,
            deceleration: d.acceleration * MDEG_PER_DEG,
            actuation_max,
            pid_kp: d.pid_kp,
            pid_ki: actuation_max / d.position_tolerance.max(1) / 2,
            pid_kd: d.pid_kd,
            integral_change_max: d.integral_rate * MDEG_PER_DEG,
            integral_deadzone: position_tolerance / 2,
            position_tolerance,
            speed_tolerance: d.speed_tolerance * MDEG_PER_DEG,
            stall_speed_limit: d.stall_speed_limit * MDEG_PER_DEG,
            stall_time: ms_to_ticks(d.stall_time_ms).unwrap_or(DURATION_MAX_TICKS),
            use_estimated_rate: d.use_estimated_rate,
            use_feedforward: true,
        }
    }

    /// Validate parameter bounds.
    ///
    /// # Errors
    ///
    /// Returns `MotionError::InvalidArgument` for negative values, motion
    /// limits the trajectory planner cannot use, or a stall time longer than
    /// the longest command. A zero `pid_ki` is accepted with a warning: the
    /// integral is then unclamped.
    pub fn validate(&self) -> Result<(), MotionError> {
        check_motion_limits(self.speed_max, self.acceleration, self.deceleration)?;
        if self.stall_time > DURATION_MAX_TICKS {
            return Err(MotionError::InvalidArgument("stall time too long"));
        }
        if self.actuation_max < 1 {
            return Err(MotionError::InvalidArgument("actuation_max must be positive"));
        }
        if self.pid_kp < 0 || self.pid_ki < 0 || self.pid_kd < 0 {
            return Err(MotionError::InvalidArgument("PID gains must not be negative"));
        }
        if self.integral_change_max < 0 || self.integral_deadzone < 0 {
            return Err(MotionError::InvalidArgument("integrator limits must not be negative"));
        }
        if self.position_tolerance < 0 || self.speed_tolerance < 0 || self.stall_speed_limit < 0 {
            return Err(MotionError::InvalidArgument("tolerances must not be negative"));
        }
        if self.pid_ki == 0 {
            warn!("pid_ki is zero: integral term disabled and integral unclamped");
        }
        Ok(())
    }

    /// Integral bound `actuation_max / ki` [mdeg·ms], or `None` when
    /// `ki == 0` (no clamp applied).
    #[inline]
    pub fn integral_max(&self) -> Option<i64> {
        if self.pid_ki <= 0 {
            return None;
        }
        Some(self.actuation_max as i64 * 1_000_000 / self.pid_ki as i64)
    }

    /// Target error beyond which proportional control alone saturates
    /// actuation twice over [mdeg], or `None` when `kp == 0`.
    #[inline]
    pub fn integral_window(&self) -> Option<i64> {
        if self.pid_kp <= 0 {
            return None;
        }
        Some(2 * self.actuation_max as i64 * 1000 / self.pid_kp as i64)
    }

    // ─── Application-unit accessors ─────────────────────────────────

    /// Motion limits in application units:
    /// `(speed [deg/s], acceleration, deceleration [deg/s²], actuation [mNm])`.
    pub fn limits(&self) -> (i32, i32, i32, i32) {
        (
            self.speed_max / MDEG_PER_DEG,
            self.acceleration / MDEG_PER_DEG,
            self.deceleration / MDEG_PER_DEG,
            self.actuation_max / 1000,
        )
    }

    /// Set motion limits in application units.
    pub fn set_limits(
        &mut self,
        speed: i32,
        acceleration: i32,
        deceleration: i32,
        actuation: i32,
    ) -> Result<(), MotionError> {
        if speed < 1 || acceleration < 1 || deceleration < 1 || actuation < 1 {
            return Err(MotionError::InvalidArgument("limits must be at least 1"));
        }
        let speed_max = speed.saturating_mul(MDEG_PER_DEG);
        let acceleration = acceleration.saturating_mul(MDEG_PER_DEG);
        let deceleration = deceleration.saturating_mul(MDEG_PER_DEG);
        check_motion_limits(speed_max, acceleration, deceleration)?;
        self.speed_max = speed_max;
        self.acceleration = acceleration;
        self.deceleration = deceleration;
        self.actuation_max = actuation.saturating_mul(1000);
        Ok(())
    }

    /// PID gains in control units and integral rate in deg/s:
    /// `(kp, ki, kd, integral_change_max)`.
    pub fn pid(&self) -> (i32, i32, i32, i32) {
        (
            self.pid_kp,
            self.pid_ki,
            self.pid_kd,
            self.integral_change_max / MDEG_PER_DEG,
        )
    }

    /// Set PID gains (control units) and integral rate (deg/s).
    pub fn set_pid(
        &mut self,
        kp: i32,
        ki: i32,
        kd: i32,
        integral_change_max: i32,
    ) -> Result<(), MotionError> {
        if kp < 0 || ki < 0 || kd < 0 || integral_change_max < 0 {
            return Err(MotionError::InvalidArgument("PID settings must not be negative"));
        }
        if ki == 0 {
            warn!("pid_ki set to zero: integral unclamped");
        }
        self.pid_kp = kp;
        self.pid_ki = ki;
        self.pid_kd = kd;
        self.integral_change_max = integral_change_max.saturating_mul(MDEG_PER_DEG);
        Ok(())
    }

    /// Target tolerances in application units: `(speed [deg/s], position [deg])`.
    pub fn target_tolerances(&self) -> (i32, i32) {
        (
            self.speed_tolerance / MDEG_PER_DEG,
            self.position_tolerance / MDEG_PER_DEG,
        )
    }

    /// Set target tolerances in application units.
    pub fn set_target_tolerances(&mut self, speed: i32, position: i32) -> Result<(), MotionError> {
        if speed < 0 || position < 0 {
            return Err(MotionError::InvalidArgument("tolerances must not be negative"));
        }
        self.speed_tolerance = speed.saturating_mul(MDEG_PER_DEG);
        self.position_tolerance = position.saturating_mul(MDEG_PER_DEG);
        Ok(())
    }

    /// Stall tolerances in application units: `(speed [deg/s], time [ms])`.
    pub fn stall_tolerances(&self) -> (i32, u32) {
        (self.stall_speed_limit / MDEG_PER_DEG, ticks_to_ms(self.stall_time))
    }

    /// Set stall tolerances in application units.
    pub fn set_stall_tolerances(&mut self, speed: i32, time_ms: u32) -> Result<(), MotionError> {
        if speed < 0 {
            return Err(MotionError::InvalidArgument("stall speed must not be negative"));
        }
        let stall_time = Some(time_ms)
            .filter(|&ms| ms <= DURATION_MAX_MS)
            .and_then(ms_to_ticks)
            .ok_or(MotionError::InvalidArgument("stall time too long"))?;
        self.stall_speed_limit = speed.saturating_mul(MDEG_PER_DEG);
        self.stall_time = stall_time;
        Ok(())
    }
}

/// Bounds the trajectory planner accepts for speed limit and ramps.
fn check_motion_limits(speed_max: i32, acceleration: i32, deceleration: i32) -> Result<(), MotionError> {
    if !(SPEED_LIMIT_MIN..=SPEED_LIMIT_MAX).contains(&speed_max) {
        return Err(MotionError::InvalidArgument("speed_max out of range"));
    }
    if acceleration < ACCELERATION_MIN || deceleration < ACCELERATION_MIN {
        return Err(MotionError::InvalidArgument(
            "acceleration and deceleration must be at least 1 deg/s²",
        ));
    }
    Ok(())
}
