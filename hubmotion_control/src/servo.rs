//! Servo: one encoder motor under closed-loop control.
//!
//! Ties together the [`DcMotor`] actuator, an [`Observer`], the
//! [`Controller`] and the [`ServoStateMachine`].
//!
//! ## Control tick
//!
//! 1. Read position and speed; on failure coast and enter `Errored`.
//! 2. Update the observer with the voltage applied during the last period.
//! 3. If controlling: run the controller on the measured position and the
//!    measured (or estimated) speed.
//! 4. Convert torque to voltage through the motor model and apply it, or
//!    carry out the after-stop action of a completed command.
//!
//! Every command also runs one control step inline, so its effect is
//! visible immediately.
//!
//! ## Frames
//!
//! Positions, speeds and voltages seen by callers are in the user frame:
//! the configured direction is applied to encoder readings here and to duty
//! cycles in [`DcMotor`]. `reset_angle` shifts the user frame by an offset.

pub mod machine;

use tracing::{debug, error, info, warn};

use hubmotion_common::consts::{DURATION_MAX_MS, ms_to_ticks};
use hubmotion_common::error::MotionError;
use hubmotion_common::hal::driver::Hub;
use hubmotion_common::motor::{Direction, MotorKind};
use hubmotion_common::settings::ControlSettings;

use crate::control::controller::{
    Actuation, AfterStop, ControlOutput, ControlState, Controller, Objective,
};
use crate::dcmotor::{DcMotor, DcMotorState};
use crate::observer::{LinearObserver, Observer, ObserverEstimate};
use crate::trajectory::TrajectorySnapshot;

pub use machine::{ServoEvent, ServoState, ServoStateMachine, ServoTransition};

/// Closed-loop servo on one motor port.
#[derive(Debug, Clone)]
pub struct Servo<O: Observer = LinearObserver> {
    kind: MotorKind,
    motor: DcMotor,
    observer: O,
    controller: Controller,
    machine: ServoStateMachine,
    /// User angle minus direction-corrected encoder angle [mdeg].
    angle_offset: i64,
    measured: ControlState,
    estimate: ObserverEstimate,
    /// Observer has been synced to the encoder at least once.
    observer_primed: bool,
    last_output: ControlOutput,
}

impl Servo<LinearObserver> {
    /// Servo with the default observer and settings for `kind`.
    ///
    /// # Errors
    ///
    /// `NotSupported` for motors without an encoder.
    pub fn new(channel: u8, kind: MotorKind, direction: Direction) -> Result<Self, MotionError> {
        let model = kind
            .model()
            .ok_or(MotionError::NotSupported("motor has no encoder"))?;
        let settings = ControlSettings::from_model(model, kind.max_voltage_hardware());
        Self::with_settings(channel, kind, direction, settings)
    }

    /// Servo with the default observer and explicit settings.
    pub fn with_settings(
        channel: u8,
        kind: MotorKind,
        direction: Direction,
        settings: ControlSettings,
    ) -> Result<Self, MotionError> {
        let model = kind
            .model()
            .ok_or(MotionError::NotSupported("motor has no encoder"))?;
        Self::with_observer(channel, kind, direction, settings, LinearObserver::new(model))
    }
}

impl<O: Observer> Servo<O> {
    /// Servo with a custom observer.
    ///
    /// # Errors
    ///
    /// `NotSupported` for motors without an encoder, `InvalidArgument` for
    /// invalid settings.
    pub fn with_observer(
        channel: u8,
        kind: MotorKind,
        direction: Direction,
        settings: ControlSettings,
        observer: O,
    ) -> Result<Self, MotionError> {
        if !kind.has_encoder() {
            return Err(MotionError::NotSupported("motor has no encoder"));
        }
        settings.validate()?;
        Ok(Self {
            kind,
            motor: DcMotor::new(channel, kind, direction),
            observer,
            controller: Controller::new(settings),
            machine: ServoStateMachine::new(),
            angle_offset: 0,
            measured: ControlState::default(),
            estimate: ObserverEstimate::default(),
            observer_primed: false,
            last_output: ControlOutput::passive(Actuation::Coast),
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub const fn kind(&self) -> MotorKind {
        self.kind
    }

    #[inline]
    pub const fn state(&self) -> ServoState {
        self.machine.state()
    }

    #[inline]
    pub const fn motor(&self) -> &DcMotor {
        &self.motor
    }

    #[inline]
    pub const fn motor_state(&self) -> DcMotorState {
        self.motor.state()
    }

    /// Set the software voltage cap [mV].
    pub fn set_max_voltage(&mut self, max_voltage: i32) -> Result<(), MotionError> {
        self.motor.set_settings(max_voltage)
    }

    #[inline]
    pub const fn settings(&self) -> &ControlSettings {
        self.controller.settings()
    }

    /// Replace the control settings after validating them.
    pub fn set_settings(&mut self, settings: ControlSettings) -> Result<(), MotionError> {
        self.controller.set_settings(settings)
    }

    /// Position at the last read [mdeg].
    #[inline]
    pub const fn angle(&self) -> i64 {
        self.measured.position
    }

    /// Speed at the last read [mdeg/s].
    #[inline]
    pub const fn speed(&self) -> i32 {
        self.measured.speed
    }

    /// Observer speed estimate at the last tick [mdeg/s].
    #[inline]
    pub const fn estimated_speed(&self) -> i32 {
        self.estimate.speed
    }

    /// Feedback torque of the last control step [µNm].
    #[inline]
    pub const fn load(&self) -> i32 {
        self.controller.load()
    }

    #[inline]
    pub const fn is_stalled(&self) -> bool {
        self.controller.is_stalled()
    }

    /// Whether no command is running (or the running one has completed).
    #[inline]
    pub fn is_done(&self) -> bool {
        !self.machine.state().is_controlling() || self.controller.is_done()
    }

    #[inline]
    pub const fn last_output(&self) -> &ControlOutput {
        &self.last_output
    }

    /// Active trajectory, while controlling.
    pub fn trajectory_snapshot(&self) -> Option<TrajectorySnapshot> {
        self.machine
            .state()
            .is_controlling()
            .then(|| self.controller.trajectory().snapshot())
    }

    // ─── Hardware access ────────────────────────────────────────────

    fn transition(&mut self, event: ServoEvent) {
        match self.machine.handle_event(event) {
            ServoTransition::Ok(state) => debug!(channel = self.motor.channel(), ?event, ?state, "servo"),
            ServoTransition::Rejected(reason) => {
                warn!(channel = self.motor.channel(), ?event, reason, "servo event rejected")
            }
        }
    }

    /// Coast, drop control and enter `Errored`. Returns `err` for chaining.
    fn fault<H: Hub>(&mut self, hub: &mut H, err: MotionError) -> MotionError {
        error!(channel = self.motor.channel(), %err, "servo fault, coasting");
        self.controller.stop();
        if let Err(e) = self.motor.coast(hub) {
            error!(channel = self.motor.channel(), %e, "coast after fault failed");
        }
        self.transition(ServoEvent::Fault);
        err
    }

    /// Read the encoder in the user frame.
    fn read<H: Hub>(&mut self, hub: &mut H) -> Result<ControlState, MotionError> {
        let channel = self.motor.channel();
        let sign = self.motor.direction().sign();
        let reading = hub
            .position(channel)
            .and_then(|p| hub.speed(channel).map(|s| (p, s)));
        match reading {
            Ok((position, speed)) => {
                self.measured = ControlState {
                    position: position * sign as i64 + self.angle_offset,
                    speed: speed.saturating_mul(sign),
                };
                Ok(self.measured)
            }
            Err(e) => Err(self.fault(hub, e.into())),
        }
    }

    /// Apply a physical action.
    pub fn actuate<H: Hub>(&mut self, hub: &mut H, actuation: Actuation) -> Result<(), MotionError> {
        let result = match actuation {
            Actuation::Coast => self.motor.coast(hub),
            Actuation::Brake => self.motor.brake(hub),
            Actuation::Torque(torque) => {
                let voltage = self.observer.torque_to_voltage(torque);
                self.motor.set_voltage(hub, voltage)
            }
            Actuation::Hold(position) => {
                let time = hub.now_ticks();
                self.controller.start_tracking(time, position);
                self.transition(ServoEvent::StartTrack);
                Ok(())
            }
        };
        result.map_err(|e| if e.is_hardware() { self.fault(hub, e) } else { e })
    }

    // ─── Control tick ───────────────────────────────────────────────

    /// Run one control period.
    pub fn tick<H: Hub>(&mut self, hub: &mut H) -> Result<(), MotionError> {
        if self.machine.state() == ServoState::Errored {
            return Ok(());
        }
        let time = hub.now_ticks();
        let measured = self.read(hub)?;
        if !self.observer_primed {
            self.observer.reset(measured.position, measured.speed);
            self.observer_primed = true;
        }
        self.estimate = self
            .observer
            .update(self.motor.state().voltage_mv, measured.position);
        self.control_step(hub, time, measured)
    }

    fn control_step<H: Hub>(&mut self, hub: &mut H, time: u32, measured: ControlState) -> Result<(), MotionError> {
        if !self.machine.state().is_controlling() {
            return Ok(());
        }

        let state = if self.controller.settings().use_estimated_rate {
            ControlState { speed: self.estimate.speed, ..measured }
        } else {
            measured
        };
        let out = self.controller.update(time, state, &self.observer);
        self.last_output = out;

        match out.actuation {
            Actuation::Torque(torque) => self.actuate(hub, Actuation::Torque(torque)),
            Actuation::Coast => {
                self.transition(ServoEvent::CompletedCoast);
                self.actuate(hub, Actuation::Coast)
            }
            Actuation::Brake => {
                self.transition(ServoEvent::CompletedBrake);
                self.actuate(hub, Actuation::Brake)
            }
            Actuation::Hold(position) => {
                self.transition(ServoEvent::CompletedHold);
                self.controller.start_tracking(time, position);
                self.actuate(hub, Actuation::Torque(out.torque))
            }
        }
    }

    /// Read the encoder, install a command and run one step.
    fn command<H, F>(&mut self, hub: &mut H, event: ServoEvent, install: F) -> Result<(), MotionError>
    where
        H: Hub,
        F: FnOnce(&mut Controller, u32, ControlState) -> Result<(), MotionError>,
    {
        let time = hub.now_ticks();
        let measured = self.read(hub)?;
        install(&mut self.controller, time, measured)?;
        self.transition(event);
        self.control_step(hub, time, measured)
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Run at `speed` [mdeg/s] until stopped.
    ///
    /// A no-op if already running in the background at the same cruise
    /// speed with the ramp complete.
    pub fn run<H: Hub>(&mut self, hub: &mut H, speed: i32) -> Result<(), MotionError> {
        let time = hub.now_ticks();
        if self.machine.state() == (ServoState::RunTime { foreground: false })
            && self.controller.is_running_forever_at(time, speed)
        {
            return Ok(());
        }
        self.command(hub, ServoEvent::StartTime { foreground: false }, |c, t, s| {
            c.start_time_command(t, s, speed, None, Objective::Forever, AfterStop::Coast)
        })
    }

    /// Run at `speed` [mdeg/s] for `duration_ms`.
    pub fn run_time<H: Hub>(
        &mut self,
        hub: &mut H,
        speed: i32,
        duration_ms: i32,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        if duration_ms < 0 {
            return Err(MotionError::InvalidArgument("negative duration"));
        }
        let duration = Some(duration_ms as u32)
            .filter(|&ms| ms <= DURATION_MAX_MS)
            .and_then(ms_to_ticks)
            .ok_or(MotionError::InvalidArgument("duration too long"))?;
        self.command(hub, ServoEvent::StartTime { foreground }, |c, t, s| {
            c.start_time_command(t, s, speed, Some(duration), Objective::Time, after_stop)
        })
    }

    /// Run at `speed` [mdeg/s] until the motor stalls.
    pub fn run_until_stalled<H: Hub>(
        &mut self,
        hub: &mut H,
        speed: i32,
        after_stop: AfterStop,
    ) -> Result<(), MotionError> {
        self.command(hub, ServoEvent::StartTime { foreground: true }, |c, t, s| {
            c.start_time_command(t, s, speed, None, Objective::Stalled, after_stop)
        })
    }

    /// Move to absolute `target` [mdeg] at `speed` [mdeg/s].
    pub fn run_target<H: Hub>(
        &mut self,
        hub: &mut H,
        speed: i32,
        target: i64,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        self.command(hub, ServoEvent::StartAngle { foreground }, |c, t, s| {
            c.start_angle_command(t, s, speed, target, after_stop)
        })
    }

    /// Move by `angle` [mdeg] at `speed` [mdeg/s]. A negative speed reverses
    /// the direction of travel.
    ///
    /// The move is relative to the live reference while controlling, else to
    /// the measured position.
    pub fn run_angle<H: Hub>(
        &mut self,
        hub: &mut H,
        speed: i32,
        angle: i64,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        let (speed, angle) = if speed < 0 {
            let angle = angle
                .checked_neg()
                .ok_or(MotionError::InvalidArgument("angle out of range"))?;
            (speed.saturating_neg(), angle)
        } else {
            (speed, angle)
        };
        self.command(hub, ServoEvent::StartAngle { foreground }, |c, t, s| {
            let base = if c.is_active() { c.reference(t).position } else { s.position };
            let target = base
                .checked_add(angle)
                .ok_or(MotionError::InvalidArgument("angle out of range"))?;
            c.start_angle_command(t, s, speed, target, after_stop)
        })
    }

    /// Track `target` [mdeg] without a motion profile.
    pub fn track_target<H: Hub>(&mut self, hub: &mut H, target: i64) -> Result<(), MotionError> {
        self.command(hub, ServoEvent::StartTrack, |c, t, _| {
            c.start_tracking(t, target);
            Ok(())
        })
    }

    /// Stop the running command.
    pub fn stop<H: Hub>(&mut self, hub: &mut H, after_stop: AfterStop) -> Result<(), MotionError> {
        match after_stop {
            AfterStop::Coast => {
                self.controller.stop();
                self.transition(ServoEvent::Coast);
                self.actuate(hub, Actuation::Coast)
            }
            AfterStop::Brake => {
                self.controller.stop();
                self.transition(ServoEvent::Brake);
                self.actuate(hub, Actuation::Brake)
            }
            AfterStop::Hold => self.command(hub, ServoEvent::StartTrack, |c, t, s| {
                c.start_tracking(t, s.position);
                Ok(())
            }),
        }
    }

    /// Apply an open-loop voltage [mV], releasing closed-loop control.
    pub fn set_voltage_user<H: Hub>(&mut self, hub: &mut H, voltage_mv: i32) -> Result<(), MotionError> {
        self.controller.stop();
        self.transition(ServoEvent::UserVoltage);
        self.motor
            .set_voltage(hub, voltage_mv)
            .map_err(|e| if e.is_hardware() { self.fault(hub, e) } else { e })
    }

    /// Re-zero the user frame so the current position reads `angle` [mdeg].
    ///
    /// A servo that was controlling keeps holding its position, now
    /// expressed as `angle`.
    pub fn reset_angle<H: Hub>(&mut self, hub: &mut H, angle: i64) -> Result<(), MotionError> {
        let before = self.read(hub)?;
        self.angle_offset += angle - before.position;
        let measured = ControlState { position: angle, ..before };
        self.measured = measured;
        self.observer.reset(measured.position, measured.speed);
        self.observer_primed = true;
        info!(channel = self.motor.channel(), angle, "angle reset");

        if self.machine.state().is_controlling() {
            let time = hub.now_ticks();
            self.controller.stop();
            self.controller.start_tracking(time, measured.position);
            self.transition(ServoEvent::StartTrack);
            return self.control_step(hub, time, measured);
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
