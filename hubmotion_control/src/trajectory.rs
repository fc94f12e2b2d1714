//! Trajectory planner: closed-form position/speed/acceleration profiles.
//!
//! A [`Trajectory`] is synthesized once per command and replaced wholesale
//! by the next command. It is a piecewise profile with four phases:
//!
//! ```text
//!  speed
//!    w1 ┤      ┌──────────────┐
//!       │     ╱                ╲
//!    w0 ┤────╱                  ╲
//!       │                        ╲
//!    w3 ┤                         └────────
//!       └────┬──────┬──────────────┬──────┬──► time
//!           t0     t1             t2     t3
//! ```
//!
//! ## Units
//!
//! Commands are in mdeg, mdeg/s and mdeg/s². Internally speeds are kept in
//! ddeg/s and accelerations in deg/s², which keeps every product within
//! `i64` for realistic motors. Times are ticks (100 µs) relative to `t0`,
//! positions are mdeg relative to `th0`.
//!
//! ## Direction
//!
//! Synthesis always solves a forward problem. Backward requests are
//! normalized first and mirrored afterwards with [`Trajectory::reverse_profile`].
//!
//! ## Wraparound
//!
//! The tick counter wraps. [`Trajectory::get_reference`] rebases a profile
//! that has settled into constant speed once its relative time passes
//! [`REBASE_THRESHOLD_TICKS`], so relative times never overflow.

use serde::Serialize;
use tracing::trace;

use hubmotion_common::consts::{
    ACCELERATION_MIN, ANGLE_MAX, DURATION_FOREVER_TICKS, DURATION_MAX_TICKS, REBASE_THRESHOLD_TICKS,
    SPEED_LIMIT_MAX, SPEED_LIMIT_MIN, ticks_since,
};
use hubmotion_common::error::MotionError;

/// A motion request, immutable once submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionCommand {
    /// Start time [ticks].
    pub time_start: u32,
    /// Start position [mdeg].
    pub position_start: i64,
    /// Target position for angle commands [mdeg].
    pub position_end: Option<i64>,
    /// Speed at the start [mdeg/s].
    pub speed_start: i32,
    /// Cruise speed [mdeg/s].
    pub speed_target: i32,
    /// Speed limit [mdeg/s].
    pub speed_max: i32,
    /// Ramp-up rate [mdeg/s²].
    pub acceleration: i32,
    /// Ramp-down rate [mdeg/s²].
    pub deceleration: i32,
    /// Duration for time commands [ticks]; `None` runs forever.
    pub duration: Option<u32>,
    /// Keep moving at cruise speed instead of ramping down.
    pub continue_running: bool,
}

/// Reference signals at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrajectoryReference {
    /// Position [mdeg].
    pub position: i64,
    /// Speed [mdeg/s].
    pub speed: i32,
    /// Acceleration [mdeg/s²].
    pub acceleration: i32,
}

/// A synthesized motion profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trajectory {
    t0: u32,
    t1: i32,
    t2: i32,
    t3: i32,
    th0: i64,
    th1: i64,
    th2: i64,
    th3: i64,
    w0: i32,
    w1: i32,
    w3: i32,
    a0: i32,
    a2: i32,
    forever: bool,
}

/// Serializable view of a trajectory in command units, for logging and
/// plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrajectorySnapshot {
    /// Absolute start time [ticks].
    pub t0: u32,
    /// Phase boundaries relative to `t0` [ticks].
    pub t1: i32,
    pub t2: i32,
    pub t3: i32,
    /// Absolute phase-boundary positions [mdeg].
    pub th0: i64,
    pub th1: i64,
    pub th2: i64,
    pub th3: i64,
    /// Boundary speeds [mdeg/s].
    pub w0: i32,
    pub w1: i32,
    pub w3: i32,
    /// Phase accelerations [mdeg/s²].
    pub a0: i32,
    pub a2: i32,
    /// Unbounded command.
    pub forever: bool,
}

// ─── Fixed-point kinematics ─────────────────────────────────────────
//
// w: ddeg/s, a: deg/s², t: ticks, th: mdeg.

/// Ticks needed to change speed by `dw` at acceleration `a`.
#[inline]
fn time_for_speed_change(dw: i64, a: i64) -> i64 {
    dw * 1000 / a
}

/// Ticks needed to travel `th` at constant speed `w`.
#[inline]
fn time_for_distance(th: i64, w: i64) -> i64 {
    if w == 0 {
        return 0;
    }
    let t = th as i128 * 100 / w as i128;
    t.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Distance travelled in `t` at constant speed `w`.
#[inline]
fn distance_at_speed(w: i64, t: i64) -> i64 {
    w * t / 100
}

/// Distance travelled in `t` due to acceleration `a` alone.
#[inline]
fn distance_from_accel(a: i64, t: i64) -> i64 {
    a * t * t / 200_000
}

/// Speed gained in `t` at acceleration `a`.
#[inline]
fn speed_gain(a: i64, t: i64) -> i64 {
    a * t / 1000
}

/// Distance needed to go from speed `w_start` to `w_end` at acceleration `a`
/// (signed as `a`).
#[inline]
fn distance_for_speed_change(w_end: i64, w_start: i64, a: i64) -> i64 {
    (w_end * w_end - w_start * w_start) * 5 / a
}

/// Speed reached from standstill over `distance` at acceleration `a`.
#[inline]
fn speed_over_distance(a: i64, distance: i64) -> i64 {
    let sq = (a as i128 * distance as i128 / 5).max(0);
    (sq as u128).isqrt() as i64
}

/// Validated limits of a command in internal units.
#[derive(Debug, Clone, Copy)]
struct Limits {
    /// Speed limit [ddeg/s].
    w_max: i64,
    /// Acceleration [deg/s²].
    a: i64,
    /// Deceleration [deg/s²].
    d: i64,
}

impl Limits {
    fn from_command(cmd: &MotionCommand) -> Result<Self, MotionError> {
        if !(SPEED_LIMIT_MIN..=SPEED_LIMIT_MAX).contains(&cmd.speed_max) {
            return Err(MotionError::InvalidArgument("speed_max out of range"));
        }
        if cmd.acceleration < ACCELERATION_MIN || cmd.deceleration < ACCELERATION_MIN {
            return Err(MotionError::InvalidArgument(
                "acceleration and deceleration must be at least 1 deg/s²",
            ));
        }
        Ok(Self {
            w_max: (cmd.speed_max / 100) as i64,
            a: (cmd.acceleration / 1000) as i64,
            d: (cmd.deceleration / 1000) as i64,
        })
    }

    #[inline]
    fn cap(&self, w: i64) -> i64 {
        w.clamp(-self.w_max, self.w_max)
    }
}

/// Forward profile in internal units, before placement at `t0`/`th0`.
#[derive(Debug, Default)]
struct Profile {
    t1: i64,
    t2: i64,
    t3: i64,
    th1: i64,
    th2: i64,
    th3: i64,
    w0: i64,
    w1: i64,
    w3: i64,
    a0: i64,
    a2: i64,
}

impl Profile {
    /// Check phase ordering and range, then narrow to a `Trajectory`.
    fn into_trajectory(
        self,
        time_start: u32,
        position_start: i64,
        forever: bool,
    ) -> Result<Trajectory, MotionError> {
        if self.t1 < 0 || self.t2 < self.t1 || self.t3 < self.t2 {
            return Err(MotionError::Infeasible("negative phase duration"));
        }
        if self.t3 > i32::MAX as i64 {
            return Err(MotionError::InvalidArgument("trajectory too long"));
        }
        Ok(Trajectory {
            t0: time_start,
            t1: self.t1 as i32,
            t2: self.t2 as i32,
            t3: self.t3 as i32,
            th0: position_start,
            th1: self.th1,
            th2: self.th2,
            th3: self.th3,
            w0: self.w0 as i32,
            w1: self.w1 as i32,
            w3: self.w3 as i32,
            a0: self.a0 as i32,
            a2: self.a2 as i32,
            forever,
        })
    }
}

// ─── Time-based synthesis ───────────────────────────────────────────

/// Forward time profile that ramps down to standstill at `duration`.
fn time_profile_stopping(w0: i64, wt: i64, lim: &Limits, duration: i64) -> Profile {
    let Limits { a, d, .. } = *lim;

    // Start speed must allow stopping (or reversing) within the duration.
    let w0 = w0.clamp(-(a * duration / 1000), d * duration / 1000);

    let (a0, w1) = if w0 < wt {
        let fits = time_for_speed_change(wt - w0, a) + time_for_speed_change(wt, d) <= duration;
        if fits {
            (a, wt)
        } else {
            // Triangle: split the duration between both ramps.
            (a, (a * duration / 1000 + w0) * d / (a + d))
        }
    } else {
        (-d, wt)
    };

    let t1 = time_for_speed_change(w1 - w0, a0);
    let t3 = duration;
    let t2 = t3 - time_for_speed_change(w1, d);

    let th1 = distance_at_speed(w0, t1) + distance_from_accel(a0, t1);
    let th2 = th1 + distance_at_speed(w1, t2 - t1);
    let th3 = th2 + distance_at_speed(w1, t3 - t2) + distance_from_accel(-d, t3 - t2);

    Profile { t1, t2, t3, th1, th2, th3, w0, w1, w3: 0, a0, a2: -d }
}

/// Forward time profile that reaches the target speed and keeps it.
fn time_profile_continuing(w0: i64, wt: i64, lim: &Limits, duration: i64, forever: bool) -> Profile {
    let a0 = if w0 < wt { lim.a } else { -lim.d };
    let mut t1 = time_for_speed_change(wt - w0, a0);
    let mut w1 = wt;

    // Duration too short to finish the ramp: cut it.
    if !forever && t1 > duration {
        t1 = duration;
        w1 = w0 + speed_gain(a0, duration);
    }

    let th1 = distance_at_speed(w0, t1) + distance_from_accel(a0, t1);
    let th2 = th1 + distance_at_speed(w1, duration - t1);

    Profile {
        t1,
        t2: duration,
        t3: duration,
        th1,
        th2,
        th3: th2,
        w0,
        w1,
        w3: w1,
        a0,
        a2: 0,
    }
}

// ─── Angle-based synthesis ──────────────────────────────────────────

/// Forward angle profile over `distance > 0` ending at standstill.
fn angle_profile_stopping(w0: i64, wt: i64, lim: &Limits, distance: i64) -> Profile {
    let Limits { a, d, .. } = *lim;

    // Braking from w0 must not overshoot the target.
    let w0 = if w0 > 0 && distance_for_speed_change(w0, 0, d) > distance {
        speed_over_distance(d, distance)
    } else {
        w0
    };

    let (a0, w1, th1, th2) = if w0 < wt {
        // Position where the ramp would have started from standstill.
        let th_f = -distance_for_speed_change(w0, 0, a);
        let th_up = distance_for_speed_change(wt, 0, a);
        let th_down = distance_for_speed_change(wt, 0, d);
        if distance - th_f >= th_up + th_down {
            (a, wt, th_f + th_up, distance - th_down)
        } else {
            // Triangle: intersect the ramp-up and ramp-down parabolas.
            let x = ((a as i128 * th_f as i128 + d as i128 * distance as i128)
                / (a + d) as i128) as i64;
            let w1 = speed_over_distance(a, x - th_f);
            if w1 > w0 || w0 <= 0 {
                (a, w1, x, x)
            } else {
                // Start speed already at the braking limit: brake right away.
                (-d, w0, 0, distance - distance_for_speed_change(w0, 0, d))
            }
        }
    } else {
        (
            -d,
            wt,
            distance_for_speed_change(w0, wt, d),
            distance - distance_for_speed_change(wt, 0, d),
        )
    };

    let t1 = time_for_speed_change(w1 - w0, a0);
    let t2 = t1.saturating_add(time_for_distance(th2 - th1, w1));
    let t3 = t2.saturating_add(time_for_speed_change(w1, d));

    Profile {
        t1,
        t2,
        t3,
        th1,
        th2,
        th3: distance,
        w0,
        w1,
        w3: 0,
        a0,
        a2: -d,
    }
}

/// Forward angle profile that passes `distance > 0` at cruise speed.
fn angle_profile_continuing(w0: i64, wt: i64, lim: &Limits, distance: i64) -> Profile {
    let Limits { a, d, .. } = *lim;

    let (a0, w1, th1) = if w0 < wt {
        let th_f = -distance_for_speed_change(w0, 0, a);
        let th_up = distance_for_speed_change(wt, 0, a);
        if distance - th_f >= th_up {
            (a, wt, th_f + th_up)
        } else {
            (a, speed_over_distance(a, distance - th_f), distance)
        }
    } else {
        let th_down = distance_for_speed_change(w0, wt, d);
        if th_down <= distance {
            (-d, wt, th_down)
        } else {
            let sq = (w0 * w0 - d * distance / 5).max(0);
            (-d, (sq as u64).isqrt() as i64, distance)
        }
    };

    let t1 = time_for_speed_change(w1 - w0, a0);
    let t2 = t1.saturating_add(time_for_distance(distance - th1, w1));

    Profile {
        t1,
        t2,
        t3: t2,
        th1,
        th2: distance,
        th3: distance,
        w0,
        w1,
        w3: w1,
        a0,
        a2: 0,
    }
}

impl Trajectory {
    /// Degenerate profile that holds `position` from `time` on.
    pub const fn stationary(time: u32, position: i64) -> Self {
        Self {
            t0: time,
            t1: 0,
            t2: 0,
            t3: 0,
            th0: position,
            th1: 0,
            th2: 0,
            th3: 0,
            w0: 0,
            w1: 0,
            w3: 0,
            a0: 0,
            a2: 0,
            forever: false,
        }
    }

    /// Synthesize a time-based profile.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for bad limits or a duration above the maximum.
    /// - `Infeasible` if a phase duration came out negative.
    pub fn new_time_command(cmd: &MotionCommand) -> Result<Self, MotionError> {
        let lim = Limits::from_command(cmd)?;
        let (forever, duration) = match cmd.duration {
            None => (true, DURATION_FOREVER_TICKS as i64),
            Some(d) if d > DURATION_MAX_TICKS => {
                return Err(MotionError::InvalidArgument("duration too long"));
            }
            Some(d) => (false, d as i64),
        };

        let wt = lim.cap((cmd.speed_target / 100) as i64);
        let w0 = lim.cap((cmd.speed_start / 100) as i64);

        let backward = wt < 0;
        let (wt, w0) = if backward { (-wt, -w0) } else { (wt, w0) };

        let profile = if forever || cmd.continue_running {
            time_profile_continuing(w0, wt, &lim, duration, forever)
        } else {
            time_profile_stopping(w0, wt, &lim, duration)
        };

        let mut trj = profile.into_trajectory(cmd.time_start, cmd.position_start, forever)?;
        if backward {
            trj.reverse_profile();
        }
        trace!(?trj, "time trajectory");
        Ok(trj)
    }

    /// Synthesize an angle-based profile.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a zero target speed, a missing target, bad
    ///   limits, or a resulting duration above the maximum.
    /// - `Infeasible` if a phase duration came out negative.
    pub fn new_angle_command(cmd: &MotionCommand) -> Result<Self, MotionError> {
        let lim = Limits::from_command(cmd)?;
        let Some(position_end) = cmd.position_end else {
            return Err(MotionError::InvalidArgument("angle command without target"));
        };
        let wt = (cmd.speed_target / 100) as i64;
        if wt == 0 {
            return Err(MotionError::InvalidArgument("zero target speed"));
        }

        let distance = position_end
            .checked_sub(cmd.position_start)
            .ok_or(MotionError::InvalidArgument("angle out of range"))?;
        if distance == 0 {
            return Ok(Self::stationary(cmd.time_start, cmd.position_start));
        }
        if distance.unsigned_abs() > ANGLE_MAX as u64 {
            return Err(MotionError::InvalidArgument("angle command takes too long"));
        }

        let wt = wt.abs().min(lim.w_max);
        let w0 = lim.cap((cmd.speed_start / 100) as i64);

        let backward = distance < 0;
        let (distance, w0) = if backward { (-distance, -w0) } else { (distance, w0) };

        let profile = if cmd.continue_running {
            angle_profile_continuing(w0, wt, &lim, distance)
        } else {
            angle_profile_stopping(w0, wt, &lim, distance)
        };
        if profile.t3 > DURATION_MAX_TICKS as i64 {
            return Err(MotionError::InvalidArgument("angle command takes too long"));
        }

        let mut trj = profile.into_trajectory(cmd.time_start, cmd.position_start, false)?;
        if backward {
            trj.reverse_profile();
        }
        trace!(?trj, "angle trajectory");
        Ok(trj)
    }

    /// Mirror the profile about `th0`: negate relative positions, speeds and
    /// accelerations. Times are unchanged.
    pub fn reverse_profile(&mut self) {
        self.th1 = -self.th1;
        self.th2 = -self.th2;
        self.th3 = -self.th3;
        self.w0 = -self.w0;
        self.w1 = -self.w1;
        self.w3 = -self.w3;
        self.a0 = -self.a0;
        self.a2 = -self.a2;
    }

    /// Whether relative time `t` lies in the final constant-speed phase.
    #[inline]
    fn is_settled(&self, t: i32) -> bool {
        if self.forever { t >= self.t1 } else { t >= self.t3 }
    }

    /// Evaluate in internal units at relative time `t`: (mdeg, ddeg/s, deg/s²).
    fn evaluate(&self, t: i32) -> (i64, i64, i64) {
        let t = t.max(0) as i64;
        let (t1, t2, t3) = (self.t1 as i64, self.t2 as i64, self.t3 as i64);
        let (w0, w1, w3) = (self.w0 as i64, self.w1 as i64, self.w3 as i64);
        let (a0, a2) = (self.a0 as i64, self.a2 as i64);

        if t < t1 {
            (
                distance_at_speed(w0, t) + distance_from_accel(a0, t),
                w0 + speed_gain(a0, t),
                a0,
            )
        } else if self.forever || t <= t2 {
            (self.th1 + distance_at_speed(w1, t - t1), w1, 0)
        } else if t <= t3 {
            let dt = t - t2;
            (
                self.th2 + distance_at_speed(w1, dt) + distance_from_accel(a2, dt),
                w1 + speed_gain(a2, dt),
                a2,
            )
        } else {
            (self.th3 + distance_at_speed(w3, t - t3), w3, 0)
        }
    }

    /// Replace the profile by an equivalent constant-speed description
    /// starting at `time`.
    fn rebase(&mut self, time: u32) {
        let t = ticks_since(time, self.t0);
        let (th, w, _) = self.evaluate(t);
        trace!(t0 = self.t0, time, "rebasing trajectory");
        *self = Self {
            t0: time,
            th0: self.th0 + th,
            w0: w as i32,
            w1: w as i32,
            w3: w as i32,
            forever: self.forever,
            ..Self::stationary(time, 0)
        };
    }

    /// Reference position [mdeg], speed [mdeg/s] and acceleration [mdeg/s²]
    /// at absolute `time`.
    ///
    /// Rebases first when the profile has settled and its relative time has
    /// passed the rebase threshold.
    pub fn get_reference(&mut self, time: u32) -> TrajectoryReference {
        let mut t = ticks_since(time, self.t0);
        if t > REBASE_THRESHOLD_TICKS && self.is_settled(t) {
            self.rebase(time);
            t = 0;
        }
        let (th, w, a) = self.evaluate(t);
        TrajectoryReference {
            position: self.th0 + th,
            speed: (w * 100) as i32,
            acceleration: (a * 1000) as i32,
        }
    }

    /// Whether absolute `time` is at or past the end of the profile.
    #[inline]
    pub fn is_finished(&self, time: u32) -> bool {
        !self.forever && ticks_since(time, self.t0) >= self.t3
    }

    /// Whether absolute `time` is at or past the end of the first ramp.
    #[inline]
    pub fn ramp_complete(&self, time: u32) -> bool {
        ticks_since(time, self.t0) >= self.t1
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Absolute start time [ticks].
    #[inline]
    pub const fn t0(&self) -> u32 {
        self.t0
    }

    /// End of ramp-up, relative to `t0` [ticks].
    #[inline]
    pub const fn t1(&self) -> i32 {
        self.t1
    }

    /// Start of ramp-down, relative to `t0` [ticks].
    #[inline]
    pub const fn t2(&self) -> i32 {
        self.t2
    }

    /// End of profile, relative to `t0` [ticks].
    #[inline]
    pub const fn t3(&self) -> i32 {
        self.t3
    }

    /// Absolute start position [mdeg].
    #[inline]
    pub const fn th0(&self) -> i64 {
        self.th0
    }

    /// End of ramp-up, relative to `th0` [mdeg].
    #[inline]
    pub const fn th1(&self) -> i64 {
        self.th1
    }

    /// Start of ramp-down, relative to `th0` [mdeg].
    #[inline]
    pub const fn th2(&self) -> i64 {
        self.th2
    }

    /// End position, relative to `th0` [mdeg].
    #[inline]
    pub const fn th3(&self) -> i64 {
        self.th3
    }

    /// Start speed [ddeg/s].
    #[inline]
    pub const fn w0(&self) -> i32 {
        self.w0
    }

    /// Cruise speed [ddeg/s].
    #[inline]
    pub const fn w1(&self) -> i32 {
        self.w1
    }

    /// Final speed [ddeg/s].
    #[inline]
    pub const fn w3(&self) -> i32 {
        self.w3
    }

    /// Ramp-up acceleration [deg/s²].
    #[inline]
    pub const fn a0(&self) -> i32 {
        self.a0
    }

    /// Ramp-down acceleration [deg/s²].
    #[inline]
    pub const fn a2(&self) -> i32 {
        self.a2
    }

    /// Cruise speed in mdeg per tick.
    #[inline]
    pub const fn w1_mdeg_per_tick(&self) -> i32 {
        self.w1 / 100
    }

    /// Cruise speed [mdeg/s].
    #[inline]
    pub const fn cruise_speed(&self) -> i32 {
        self.w1 * 100
    }

    /// Whether the profile never ends.
    #[inline]
    pub const fn is_forever(&self) -> bool {
        self.forever
    }

    /// Total length in ticks, or `None` for a profile that never ends.
    #[inline]
    pub const fn duration(&self) -> Option<u32> {
        if self.forever { None } else { Some(self.t3 as u32) }
    }

    /// Absolute end position [mdeg].
    #[inline]
    pub const fn end_position(&self) -> i64 {
        self.th0 + self.th3
    }

    /// Snapshot in command units.
    pub fn snapshot(&self) -> TrajectorySnapshot {
        TrajectorySnapshot {
            t0: self.t0,
            t1: self.t1,
            t2: self.t2,
            t3: self.t3,
            th0: self.th0,
            th1: self.th0 + self.th1,
            th2: self.th0 + self.th2,
            th3: self.th0 + self.th3,
            w0: self.w0 * 100,
            w1: self.w1 * 100,
            w3: self.w3 * 100,
            a0: self.a0 * 1000,
            a2: self.a2 * 1000,
            forever: self.forever,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
