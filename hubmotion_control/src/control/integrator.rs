//! Error integrators with pause/resume and stall hysteresis.
//!
//! Two flavours, one per objective family:
//!
//! - [`SpeedIntegrator`] accumulates speed error (which is position error
//!   relative to a resume baseline) while running time-based commands.
//!   Pausing it freezes the error so a blocked axis does not build up an
//!   ever-growing correction.
//! - [`PositionIntegrator`] accumulates position error for angle and hold
//!   commands. Pausing it also freezes the trajectory clock: the reference
//!   time is the wall time minus all time spent paused.
//!
//! Both report a stall once they have been paused for `stall_time` while
//! the axis moves slower than `stall_speed_limit`.

use hubmotion_common::consts::{CONTROL_LOOP_TIME_MS, ticks_since};
use hubmotion_common::settings::ControlSettings;

/// Shared stall test: slow in the commanded direction for long enough.
#[inline]
fn stall_condition(
    time: u32,
    time_pause_begin: u32,
    speed_now: i32,
    speed_ref: i32,
    stall_time: u32,
    stall_speed_limit: i32,
) -> bool {
    // Normalize so the commanded direction is positive.
    let (speed_now, speed_ref) = if speed_ref < 0 {
        (speed_now.saturating_neg(), speed_ref.saturating_neg())
    } else {
        (speed_now, speed_ref)
    };

    if speed_ref != 0 && speed_now > stall_speed_limit {
        return false;
    }

    ticks_since(time, time_pause_begin) >= i32::try_from(stall_time).unwrap_or(i32::MAX)
}

// ─── Speed integrator ───────────────────────────────────────────────

/// Speed error integrator for time-based objectives.
///
/// All values in mdeg; the integral of speed error over time is a position
/// error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedIntegrator {
    /// Accumulating (true) or frozen (false).
    running: bool,
    /// Integral accumulated up to the last pause [mdeg].
    speed_err_integral_paused: i64,
    /// Position error at the last resume [mdeg].
    position_error_resumed: i64,
    /// Time of the last pause [ticks].
    time_pause_begin: u32,
}

impl SpeedIntegrator {
    /// Clear the integral and start running from `position_error`.
    pub fn reset(&mut self, time: u32, position_error: i64) {
        *self = Self {
            time_pause_begin: time,
            ..Self::default()
        };
        self.resume(position_error);
    }

    /// Freeze accumulation. No-op if already paused.
    pub fn pause(&mut self, time: u32, position_error: i64) {
        if !self.running {
            return;
        }
        self.speed_err_integral_paused += position_error - self.position_error_resumed;
        self.time_pause_begin = time;
        self.running = false;
    }

    /// Resume accumulation from `position_error`. No-op if already running.
    pub fn resume(&mut self, position_error: i64) {
        if self.running {
            return;
        }
        self.position_error_resumed = position_error;
        self.running = true;
    }

    /// Integrated speed error [mdeg].
    #[inline]
    pub fn get_error(&self, position_error: i64) -> i64 {
        let live = if self.running {
            position_error - self.position_error_resumed
        } else {
            0
        };
        self.speed_err_integral_paused + live
    }

    #[inline]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the axis has been stalled for at least `stall_time` ticks.
    ///
    /// Always false while running.
    pub fn stalled(
        &self,
        time: u32,
        speed_now: i32,
        speed_ref: i32,
        stall_time: u32,
        stall_speed_limit: i32,
    ) -> bool {
        if self.running {
            return false;
        }
        stall_condition(
            time,
            self.time_pause_begin,
            speed_now,
            speed_ref,
            stall_time,
            stall_speed_limit,
        )
    }
}

// ─── Position integrator ────────────────────────────────────────────

/// Position error integrator for angle-based objectives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionIntegrator {
    /// Trajectory clock advancing (true) or frozen (false).
    trajectory_running: bool,
    /// Integral of position error [mdeg·ms].
    count_err_integral: i64,
    /// Time of the last pause [ticks].
    time_pause_begin: u32,
    /// Total time spent paused since reset [ticks].
    time_paused_total: u32,
}

impl PositionIntegrator {
    /// Clear everything and start running at `time`.
    pub fn reset(&mut self, time: u32) {
        *self = Self {
            trajectory_running: true,
            time_pause_begin: time,
            ..Self::default()
        };
    }

    /// Start a new trajectory clock at `time` but keep the integral.
    ///
    /// Used when one angle-based command replaces another so that a load
    /// the integral was already holding is not dropped.
    pub fn restart(&mut self, time: u32) {
        let integral = self.count_err_integral;
        self.reset(time);
        self.count_err_integral = integral;
    }

    /// Freeze the trajectory clock and integral growth. No-op if paused.
    pub fn pause(&mut self, time: u32) {
        if !self.trajectory_running {
            return;
        }
        self.time_pause_begin = time;
        self.trajectory_running = false;
    }

    /// Restart the trajectory clock. No-op if running.
    pub fn resume(&mut self, time: u32) {
        if self.trajectory_running {
            return;
        }
        self.time_paused_total = self
            .time_paused_total
            .wrapping_add(time.wrapping_sub(self.time_pause_begin));
        self.trajectory_running = true;
    }

    #[inline]
    pub const fn is_running(&self) -> bool {
        self.trajectory_running
    }

    /// Trajectory time at wall time `time`: wall time minus total paused
    /// time, frozen while paused.
    #[inline]
    pub fn get_ref_time(&self, time: u32) -> u32 {
        let now = if self.trajectory_running {
            time
        } else {
            self.time_pause_begin
        };
        now.wrapping_sub(self.time_paused_total)
    }

    /// Accumulated integral [mdeg·ms].
    #[inline]
    pub const fn integral(&self) -> i64 {
        self.count_err_integral
    }

    /// Advance the integral by one control period and return it.
    ///
    /// `position_error` is the error against the current reference,
    /// `target_error` the error against the final target.
    pub fn update(&mut self, position_error: i64, target_error: i64, settings: &ControlSettings) -> i64 {
        let dt = CONTROL_LOOP_TIME_MS as i64;
        let shrinks = |err: i64, integral: i64| (integral + err * dt).abs() < integral.abs();

        let mut err = position_error;
        if !shrinks(err, self.count_err_integral) {
            let max = settings.integral_change_max as i64;
            err = err.clamp(-max, max);
        }

        let target_error = target_error.abs();
        let in_window = target_error >= settings.integral_deadzone as i64
            && settings.integral_window().is_none_or(|w| target_error <= w);

        if shrinks(err, self.count_err_integral) || (self.trajectory_running && in_window) {
            self.count_err_integral += err * dt;
        }

        if let Some(max) = settings.integral_max() {
            self.count_err_integral = self.count_err_integral.clamp(-max, max);
        }
        self.count_err_integral
    }

    /// Whether the axis has been stalled for at least `stall_time` ticks.
    ///
    /// The integrator is only paused while proportional actuation is
    /// saturated, so a paused integrator means the axis is already pushing
    /// as hard as allowed.
    pub fn stalled(
        &self,
        time: u32,
        speed_now: i32,
        speed_ref: i32,
        stall_time: u32,
        stall_speed_limit: i32,
    ) -> bool {
        if self.trajectory_running {
            return false;
        }
        stall_condition(
            time,
            self.time_pause_begin,
            speed_now,
            speed_ref,
            stall_time,
            stall_speed_limit,
        )
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
