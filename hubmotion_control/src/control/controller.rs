//! Closed-loop controller for one axis.
//!
//! Owns the active trajectory, both integrators and the completion
//! objective. Each call to [`Controller::update`] evaluates the reference,
//! computes PID plus feedforward torque, runs anti-windup and reports
//! completion and stalls.
//!
//! ## Objectives
//!
//! | Objective | Trajectory | Integrator | Done when |
//! |-----------|-----------|------------|-----------|
//! | `Forever` | time, unbounded | speed | never |
//! | `Time` | time, finite | speed | trajectory finished |
//! | `Stalled` | time, unbounded | speed | stalled |
//! | `Target` | angle | position | finished and within tolerances |
//! | `Track` | stationary | position | always (keeps actuating) |
//!
//! Time-based objectives use the speed integrator's error as the
//! proportional input and have no integral term. Angle-based objectives use
//! the reference position error plus the position integral, and run the
//! trajectory on the position integrator's paused clock.

use serde::Serialize;
use tracing::{debug, trace};

use hubmotion_common::error::MotionError;
use hubmotion_common::settings::ControlSettings;

use super::integrator::{PositionIntegrator, SpeedIntegrator};
use super::pid::{PidGains, PidTerms, pid_compute, saturate};
use crate::observer::Observer;
use crate::trajectory::{MotionCommand, Trajectory, TrajectoryReference};

/// Completion criterion of the active command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Forever,
    Time,
    Stalled,
    Target,
    Track,
}

impl Objective {
    /// Whether this objective runs on the position integrator.
    #[inline]
    pub const fn is_angle_based(&self) -> bool {
        matches!(self, Self::Target | Self::Track)
    }
}

/// What to do physically once a command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterStop {
    /// Release the motor.
    Coast,
    /// Short the windings.
    Brake,
    /// Keep tracking the final position.
    #[default]
    Hold,
}

/// Requested physical action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actuation {
    Coast,
    Brake,
    /// Apply a torque [µNm].
    Torque(i32),
    /// Switch to tracking this position [mdeg], applying `torque` meanwhile.
    Hold(i64),
}

/// Result of one control update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlOutput {
    pub actuation: Actuation,
    /// Saturated feedback plus feedforward torque [µNm].
    pub torque: i32,
    pub position_ref: i64,
    pub speed_ref: i32,
    pub acceleration_ref: i32,
    pub done: bool,
    pub stalled: bool,
}

impl ControlOutput {
    /// Output of an inactive controller.
    pub const fn passive(actuation: Actuation) -> Self {
        Self {
            actuation,
            torque: 0,
            position_ref: 0,
            speed_ref: 0,
            acceleration_ref: 0,
            done: true,
            stalled: false,
        }
    }
}

/// Measured (or estimated) state fed into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    /// Position [mdeg].
    pub position: i64,
    /// Speed [mdeg/s].
    pub speed: i32,
}

/// Per-axis controller.
#[derive(Debug, Clone)]
pub struct Controller {
    settings: ControlSettings,
    trajectory: Trajectory,
    speed_integrator: SpeedIntegrator,
    position_integrator: PositionIntegrator,
    objective: Objective,
    after_stop: AfterStop,
    active: bool,
    done: bool,
    stalled: bool,
    /// Last saturated feedback torque [µNm].
    load: i32,
}

impl Controller {
    pub fn new(settings: ControlSettings) -> Self {
        Self {
            settings,
            trajectory: Trajectory::stationary(0, 0),
            speed_integrator: SpeedIntegrator::default(),
            position_integrator: PositionIntegrator::default(),
            objective: Objective::Track,
            after_stop: AfterStop::Coast,
            active: false,
            done: true,
            stalled: false,
            load: 0,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub const fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    /// Replace the settings after validating them.
    pub fn set_settings(&mut self, settings: ControlSettings) -> Result<(), MotionError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    #[inline]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub const fn objective(&self) -> Objective {
        self.objective
    }

    #[inline]
    pub const fn after_stop(&self) -> AfterStop {
        self.after_stop
    }

    #[inline]
    pub const fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Whether the last command has completed (or none is running).
    #[inline]
    pub const fn is_done(&self) -> bool {
        !self.active || self.done
    }

    #[inline]
    pub const fn is_stalled(&self) -> bool {
        self.active && self.stalled
    }

    /// Feedback torque of the last update [µNm].
    #[inline]
    pub const fn load(&self) -> i32 {
        self.load
    }

    /// Release control. Integrators and trajectory are left as they were.
    pub fn stop(&mut self) {
        if self.active {
            debug!(objective = ?self.objective, "controller stopped");
        }
        self.active = false;
        self.stalled = false;
        self.done = true;
        self.load = 0;
    }

    /// Trajectory time at wall `time` for the active objective.
    #[inline]
    fn ref_time(&self, time: u32) -> u32 {
        if self.objective.is_angle_based() {
            self.position_integrator.get_ref_time(time)
        } else {
            time
        }
    }

    /// Reference at wall `time` for the active objective.
    pub fn reference(&mut self, time: u32) -> TrajectoryReference {
        let t = self.ref_time(time);
        self.trajectory.get_reference(t)
    }

    /// Start point of a new command: the live reference while controlling,
    /// else the measured state.
    fn start_point(&mut self, time: u32, state: ControlState) -> (i64, i32) {
        if !self.active {
            return (state.position, state.speed);
        }
        let r = self.reference(time);
        (r.position, r.speed)
    }

    fn base_command(&self, time: u32, start: (i64, i32), speed: i32) -> MotionCommand {
        MotionCommand {
            time_start: time,
            position_start: start.0,
            position_end: None,
            speed_start: start.1,
            speed_target: speed,
            speed_max: self.settings.speed_max,
            acceleration: self.settings.acceleration,
            deceleration: self.settings.deceleration,
            duration: None,
            continue_running: false,
        }
    }

    fn install(&mut self, time: u32, trajectory: Trajectory, objective: Objective, after_stop: AfterStop) {
        if objective.is_angle_based() {
            if self.active && self.objective.is_angle_based() {
                self.position_integrator.restart(time);
            } else {
                self.position_integrator.reset(time);
            }
        } else {
            self.speed_integrator.reset(time, 0);
        }
        self.trajectory = trajectory;
        self.objective = objective;
        self.after_stop = after_stop;
        self.active = true;
        self.done = false;
        self.stalled = false;
        debug!(?objective, ?after_stop, snapshot = ?trajectory.snapshot(), "command installed");
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Start a time-based command.
    ///
    /// `duration` is in ticks; `None` runs until stopped (or stalled, for the
    /// `Stalled` objective).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an angle-based objective, a `Time` objective
    /// without duration, or bad limits. State is unchanged on error.
    pub fn start_time_command(
        &mut self,
        time: u32,
        state: ControlState,
        speed: i32,
        duration: Option<u32>,
        objective: Objective,
        after_stop: AfterStop,
    ) -> Result<(), MotionError> {
        match (objective, duration) {
            (Objective::Target | Objective::Track, _) => {
                return Err(MotionError::InvalidArgument("angle objective for time command"));
            }
            (Objective::Time, None) => {
                return Err(MotionError::InvalidArgument("time objective without duration"));
            }
            _ => {}
        }

        let start = self.start_point(time, state);
        let cmd = MotionCommand {
            duration,
            continue_running: duration.is_none(),
            ..self.base_command(time, start, speed)
        };
        let trajectory = Trajectory::new_time_command(&cmd)?;
        self.install(time, trajectory, objective, after_stop);
        Ok(())
    }

    /// Start an angle-based command towards `target` [mdeg].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for zero speed or bad limits. State is unchanged on
    /// error.
    pub fn start_angle_command(
        &mut self,
        time: u32,
        state: ControlState,
        speed: i32,
        target: i64,
        after_stop: AfterStop,
    ) -> Result<(), MotionError> {
        let start = self.start_point(time, state);
        let cmd = MotionCommand {
            position_end: Some(target),
            ..self.base_command(time, start, speed)
        };
        let trajectory = Trajectory::new_angle_command(&cmd)?;
        self.install(time, trajectory, Objective::Target, after_stop);
        Ok(())
    }

    /// Hold `target` [mdeg] without a motion profile.
    pub fn start_tracking(&mut self, time: u32, target: i64) {
        self.install(time, Trajectory::stationary(time, target), Objective::Track, AfterStop::Hold);
    }

    /// Whether a background `run` at `speed` would change nothing: already
    /// running forever at the same capped cruise speed with the ramp done.
    pub fn is_running_forever_at(&self, time: u32, speed: i32) -> bool {
        let w_max = self.settings.speed_max / 100;
        let cruise = (speed / 100).clamp(-w_max, w_max) * 100;
        self.active
            && self.objective == Objective::Forever
            && self.trajectory.cruise_speed() == cruise
            && self.trajectory.ramp_complete(time)
    }

    // ─── Control update ─────────────────────────────────────────────

    /// Run one control period.
    pub fn update<O>(&mut self, time: u32, state: ControlState, observer: &O) -> ControlOutput
    where
        O: Observer + ?Sized,
    {
        if !self.active {
            return ControlOutput::passive(Actuation::Coast);
        }

        let s = self.settings;
        let angle_based = self.objective.is_angle_based();
        let ref_time = self.ref_time(time);
        let r = self.trajectory.get_reference(ref_time);

        let position_error = r.position - state.position;
        let speed_error = r.speed.saturating_sub(state.speed);
        let gains = PidGains::from(&s);

        let terms: PidTerms = if angle_based {
            let target_error = self.trajectory.end_position() - state.position;
            let integral = self.position_integrator.update(position_error, target_error, &s);
            pid_compute(&gains, position_error, integral, speed_error)
        } else {
            let error = self.speed_integrator.get_error(position_error);
            pid_compute(&gains, error, 0, speed_error)
        };

        // Anti-windup: freeze accumulation (and the angle clock) while
        // proportional action alone is saturated against the lag.
        let windup = terms.windup(speed_error, s.actuation_max);
        if angle_based {
            if windup {
                self.position_integrator.pause(time);
            } else {
                self.position_integrator.resume(time);
            }
        } else if windup {
            self.speed_integrator.pause(time, position_error);
        } else {
            self.speed_integrator.resume(position_error);
        }

        let feedback = terms.saturated_total(s.actuation_max);
        let feedforward = if s.use_feedforward {
            observer.feedforward_torque(r.speed, r.acceleration)
        } else {
            0
        };
        let torque = saturate(feedback as i64 + feedforward as i64, s.actuation_max);
        self.load = feedback;

        self.stalled = if angle_based {
            self.position_integrator
                .stalled(time, state.speed, r.speed, s.stall_time, s.stall_speed_limit)
        } else {
            self.speed_integrator
                .stalled(time, state.speed, r.speed, s.stall_time, s.stall_speed_limit)
        };

        self.done = match self.objective {
            Objective::Forever => false,
            Objective::Time => self.trajectory.is_finished(time),
            Objective::Stalled => self.stalled,
            Objective::Target => {
                self.trajectory.is_finished(ref_time)
                    && (state.position - self.trajectory.end_position()).abs()
                        <= s.position_tolerance as i64
                    && state.speed.saturating_abs() < s.speed_tolerance
            }
            Objective::Track => true,
        };

        trace!(
            ref_pos = r.position,
            pos = state.position,
            torque,
            feedback,
            windup,
            done = self.done,
            "control update"
        );

        let actuation = if !self.done || self.objective == Objective::Track {
            Actuation::Torque(torque)
        } else {
            self.complete(state)
        };

        ControlOutput {
            actuation,
            torque,
            position_ref: r.position,
            speed_ref: r.speed,
            acceleration_ref: r.acceleration,
            done: self.done,
            stalled: self.stalled,
        }
    }

    /// Apply the after-stop action of a completed command.
    fn complete(&mut self, state: ControlState) -> Actuation {
        debug!(objective = ?self.objective, after_stop = ?self.after_stop, "command complete");
        match self.after_stop {
            AfterStop::Coast => {
                self.active = false;
                Actuation::Coast
            }
            AfterStop::Brake => {
                self.active = false;
                Actuation::Brake
            }
            AfterStop::Hold => {
                let position = if self.objective == Objective::Target {
                    self.trajectory.end_position()
                } else {
                    state.position
                };
                Actuation::Hold(position)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
