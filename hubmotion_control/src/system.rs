//! MotionSystem: the axis arena of one hub.
//!
//! Owns the hub hardware and up to [`MAX_AXES`] axes. Callers address axes
//! through [`AxisId`] handles; every access is bounds-checked.
//!
//! Motors without an encoder become plain [`DcMotor`] axes: they accept
//! voltage, coast and brake, and reject everything that needs feedback
//! with `NotSupported`.
//!
//! [`MotionSystem::tick`] runs one control period on every servo axis. A
//! fault on one axis never keeps the others from being ticked.

use bitflags::bitflags;
use serde::Serialize;
use tracing::{error, info};

use hubmotion_common::config::{AxisConfig, ConfigError, validate_axes};
use hubmotion_common::consts::MAX_AXES;
use hubmotion_common::error::MotionError;
use hubmotion_common::hal::driver::Hub;
use hubmotion_common::motor::{Direction, MotorKind};
use hubmotion_common::settings::ControlSettings;

use crate::control::controller::AfterStop;
use crate::dcmotor::{DcActuation, DcMotor};
use crate::servo::{Servo, ServoState};
use crate::trajectory::TrajectorySnapshot;

/// Longest axis name kept by the arena.
pub const AXIS_NAME_LEN: usize = 24;

bitflags! {
    /// Per-axis status summary for telemetry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AxisStatus: u8 {
        /// No command running, or the running one has completed.
        const DONE     = 0x01;
        /// Controller reports a stall.
        const STALLED  = 0x02;
        /// Tracking or holding a position.
        const HOLDING  = 0x04;
        /// Hardware fault; motor coasted.
        const ERRORED  = 0x08;
        /// Motor released.
        const COASTING = 0x10;
    }
}

impl Default for AxisStatus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Handle to an axis in a [`MotionSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AxisId(u8);

impl AxisId {
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

/// One slot of the arena.
#[derive(Debug, Clone)]
pub enum Axis {
    /// Motor without encoder.
    Dc(DcMotor),
    /// Encoder motor under closed-loop control.
    Servo(Servo),
}

#[derive(Debug, Clone)]
struct Slot {
    name: heapless::String<AXIS_NAME_LEN>,
    axis: Axis,
}

/// Telemetry record of one axis.
#[derive(Debug, Clone, Serialize)]
pub struct AxisTelemetry {
    pub id: AxisId,
    pub name: heapless::String<AXIS_NAME_LEN>,
    /// `None` for DC axes.
    pub state: Option<ServoState>,
    pub angle: i64,
    pub speed: i32,
    pub voltage_mv: i32,
    pub load: i32,
    /// [`AxisStatus`] bits.
    pub status: u8,
}

/// All axes of one hub plus the hub itself.
#[derive(Debug)]
pub struct MotionSystem<H: Hub> {
    hub: H,
    axes: heapless::Vec<Slot, MAX_AXES>,
}

impl<H: Hub> MotionSystem<H> {
    pub fn new(hub: H) -> Self {
        Self {
            hub,
            axes: heapless::Vec::new(),
        }
    }

    /// Build a system from validated axis configuration.
    ///
    /// # Errors
    ///
    /// `ValidationError` for any invalid or conflicting axis entry.
    pub fn from_config(hub: H, axes: &[AxisConfig]) -> Result<Self, ConfigError> {
        validate_axes(axes)?;
        let mut system = Self::new(hub);
        for cfg in axes {
            let id = system.add_axis(
                &cfg.name,
                cfg.port,
                cfg.motor,
                cfg.direction,
                cfg.control_settings()?,
            )?;
            system.set_max_voltage(id, cfg.max_voltage())?;
        }
        info!(axes = system.len(), "motion system configured");
        Ok(system)
    }

    #[inline]
    pub fn hub(&self) -> &H {
        &self.hub
    }

    #[inline]
    pub fn hub_mut(&mut self) -> &mut H {
        &mut self.hub
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Handles of all axes in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = AxisId> + '_ {
        (0..self.axes.len()).map(|i| AxisId(i as u8))
    }

    /// Look up an axis by name.
    pub fn find(&self, name: &str) -> Option<AxisId> {
        self.axes
            .iter()
            .position(|s| s.name.as_str() == name)
            .map(|i| AxisId(i as u8))
    }

    /// Add an axis on `channel`.
    ///
    /// Motors with an encoder get a servo with `settings` (or the motor
    /// defaults); motors without one get a plain DC axis.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the arena is full, the name is too long or the
    /// channel is already taken.
    pub fn add_axis(
        &mut self,
        name: &str,
        channel: u8,
        kind: MotorKind,
        direction: Direction,
        settings: Option<ControlSettings>,
    ) -> Result<AxisId, MotionError> {
        if self.axes.is_full() {
            return Err(MotionError::InvalidArgument("axis arena full"));
        }
        if self.axes.iter().any(|s| s.channel() == channel) {
            return Err(MotionError::InvalidArgument("channel already in use"));
        }
        let name: heapless::String<AXIS_NAME_LEN> = heapless::String::try_from(name)
            .map_err(|_| MotionError::InvalidArgument("axis name too long"))?;

        let axis = if kind.has_encoder() {
            let servo = match settings {
                Some(s) => Servo::with_settings(channel, kind, direction, s)?,
                None => Servo::new(channel, kind, direction)?,
            };
            Axis::Servo(servo)
        } else {
            Axis::Dc(DcMotor::new(channel, kind, direction))
        };

        let id = AxisId(self.axes.len() as u8);
        info!(axis = %name, channel, ?kind, ?direction, "axis added");
        self.axes
            .push(Slot { name, axis })
            .map_err(|_| MotionError::InvalidArgument("axis arena full"))?;
        Ok(id)
    }

    // ─── Axis access ────────────────────────────────────────────────

    fn slot(&self, id: AxisId) -> Result<&Slot, MotionError> {
        self.axes
            .get(id.index())
            .ok_or(MotionError::InvalidArgument("unknown axis"))
    }

    /// Axis by handle.
    pub fn axis(&self, id: AxisId) -> Result<&Axis, MotionError> {
        self.slot(id).map(|s| &s.axis)
    }

    pub fn name(&self, id: AxisId) -> Result<&str, MotionError> {
        self.slot(id).map(|s| s.name.as_str())
    }

    /// Driver channel of an axis.
    pub fn port(&self, id: AxisId) -> Result<u8, MotionError> {
        self.slot(id).map(Slot::channel)
    }

    /// Split borrow of the hub and one servo axis.
    fn servo_mut(&mut self, id: AxisId) -> Result<(&mut H, &mut Servo), MotionError> {
        let slot = self
            .axes
            .get_mut(id.index())
            .ok_or(MotionError::InvalidArgument("unknown axis"))?;
        match &mut slot.axis {
            Axis::Servo(servo) => Ok((&mut self.hub, servo)),
            Axis::Dc(_) => Err(MotionError::NotSupported("axis has no encoder")),
        }
    }

    fn servo(&self, id: AxisId) -> Result<&Servo, MotionError> {
        match self.axis(id)? {
            Axis::Servo(servo) => Ok(servo),
            Axis::Dc(_) => Err(MotionError::NotSupported("axis has no encoder")),
        }
    }

    // ─── Commands ───────────────────────────────────────────────────

    pub fn run(&mut self, id: AxisId, speed: i32) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.run(hub, speed)
    }

    pub fn run_time(
        &mut self,
        id: AxisId,
        speed: i32,
        duration_ms: i32,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.run_time(hub, speed, duration_ms, after_stop, foreground)
    }

    pub fn run_until_stalled(&mut self, id: AxisId, speed: i32, after_stop: AfterStop) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.run_until_stalled(hub, speed, after_stop)
    }

    pub fn run_target(
        &mut self,
        id: AxisId,
        speed: i32,
        target: i64,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.run_target(hub, speed, target, after_stop, foreground)
    }

    pub fn run_angle(
        &mut self,
        id: AxisId,
        speed: i32,
        angle: i64,
        after_stop: AfterStop,
        foreground: bool,
    ) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.run_angle(hub, speed, angle, after_stop, foreground)
    }

    pub fn track_target(&mut self, id: AxisId, target: i64) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.track_target(hub, target)
    }

    /// Stop an axis. DC axes support `Coast` and `Brake` only.
    pub fn stop(&mut self, id: AxisId, after_stop: AfterStop) -> Result<(), MotionError> {
        let slot = self
            .axes
            .get_mut(id.index())
            .ok_or(MotionError::InvalidArgument("unknown axis"))?;
        match (&mut slot.axis, after_stop) {
            (Axis::Servo(servo), _) => servo.stop(&mut self.hub, after_stop),
            (Axis::Dc(motor), AfterStop::Coast) => motor.coast(&mut self.hub),
            (Axis::Dc(motor), AfterStop::Brake) => motor.brake(&mut self.hub),
            (Axis::Dc(_), AfterStop::Hold) => Err(MotionError::NotSupported("hold needs an encoder")),
        }
    }

    /// Apply an open-loop voltage [mV].
    pub fn set_voltage(&mut self, id: AxisId, voltage_mv: i32) -> Result<(), MotionError> {
        let slot = self
            .axes
            .get_mut(id.index())
            .ok_or(MotionError::InvalidArgument("unknown axis"))?;
        match &mut slot.axis {
            Axis::Servo(servo) => servo.set_voltage_user(&mut self.hub, voltage_mv),
            Axis::Dc(motor) => motor.set_voltage(&mut self.hub, voltage_mv),
        }
    }

    /// Set the software voltage cap [mV].
    pub fn set_max_voltage(&mut self, id: AxisId, max_voltage: i32) -> Result<(), MotionError> {
        let slot = self
            .axes
            .get_mut(id.index())
            .ok_or(MotionError::InvalidArgument("unknown axis"))?;
        match &mut slot.axis {
            Axis::Servo(servo) => servo.set_max_voltage(max_voltage),
            Axis::Dc(motor) => motor.set_settings(max_voltage),
        }
    }

    pub fn reset_angle(&mut self, id: AxisId, angle: i64) -> Result<(), MotionError> {
        let (hub, servo) = self.servo_mut(id)?;
        servo.reset_angle(hub, angle)
    }

    // ─── Settings & telemetry ───────────────────────────────────────

    pub fn settings(&self, id: AxisId) -> Result<ControlSettings, MotionError> {
        self.servo(id).map(|s| *s.settings())
    }

    pub fn set_settings(&mut self, id: AxisId, settings: ControlSettings) -> Result<(), MotionError> {
        let (_, servo) = self.servo_mut(id)?;
        servo.set_settings(settings)
    }

    pub fn is_stalled(&self, id: AxisId) -> Result<bool, MotionError> {
        match self.axis(id)? {
            Axis::Servo(servo) => Ok(servo.is_stalled()),
            Axis::Dc(_) => Ok(false),
        }
    }

    pub fn is_done(&self, id: AxisId) -> Result<bool, MotionError> {
        match self.axis(id)? {
            Axis::Servo(servo) => Ok(servo.is_done()),
            Axis::Dc(_) => Ok(true),
        }
    }

    pub fn angle(&self, id: AxisId) -> Result<i64, MotionError> {
        self.servo(id).map(Servo::angle)
    }

    pub fn speed(&self, id: AxisId) -> Result<i32, MotionError> {
        self.servo(id).map(Servo::speed)
    }

    pub fn servo_state(&self, id: AxisId) -> Result<ServoState, MotionError> {
        self.servo(id).map(Servo::state)
    }

    pub fn trajectory_snapshot(&self, id: AxisId) -> Result<Option<TrajectorySnapshot>, MotionError> {
        self.servo(id).map(Servo::trajectory_snapshot)
    }

    pub fn status(&self, id: AxisId) -> Result<AxisStatus, MotionError> {
        Ok(self.slot(id)?.status())
    }

    pub fn telemetry(&self, id: AxisId) -> Result<AxisTelemetry, MotionError> {
        let slot = self.slot(id)?;
        let telemetry = match &slot.axis {
            Axis::Servo(servo) => AxisTelemetry {
                id,
                name: slot.name.clone(),
                state: Some(servo.state()),
                angle: servo.angle(),
                speed: servo.speed(),
                voltage_mv: servo.motor_state().voltage_mv,
                load: servo.load(),
                status: slot.status().bits(),
            },
            Axis::Dc(motor) => AxisTelemetry {
                id,
                name: slot.name.clone(),
                state: None,
                angle: 0,
                speed: 0,
                voltage_mv: motor.state().voltage_mv,
                load: 0,
                status: slot.status().bits(),
            },
        };
        Ok(telemetry)
    }

    // ─── Control tick ───────────────────────────────────────────────

    /// Run one control period on every servo axis.
    ///
    /// # Errors
    ///
    /// The first axis error of this period. Remaining axes are still ticked.
    pub fn tick(&mut self) -> Result<(), MotionError> {
        let mut first = None;
        for (i, slot) in self.axes.iter_mut().enumerate() {
            let Axis::Servo(servo) = &mut slot.axis else {
                continue;
            };
            if let Err(e) = servo.tick(&mut self.hub) {
                error!(axis = %slot.name, index = i, %e, "axis tick failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Slot {
    fn channel(&self) -> u8 {
        match &self.axis {
            Axis::Dc(motor) => motor.channel(),
            Axis::Servo(servo) => servo.motor().channel(),
        }
    }

    fn status(&self) -> AxisStatus {
        let mut status = AxisStatus::empty();
        match &self.axis {
            Axis::Dc(motor) => {
                status |= AxisStatus::DONE;
                if motor.state().actuation == DcActuation::Coast {
                    status |= AxisStatus::COASTING;
                }
            }
            Axis::Servo(servo) => {
                status.set(AxisStatus::DONE, servo.is_done());
                status.set(AxisStatus::STALLED, servo.is_stalled());
                match servo.state() {
                    ServoState::TrackTarget => status |= AxisStatus::HOLDING,
                    ServoState::Errored => status |= AxisStatus::ERRORED,
                    ServoState::Coasting => status |= AxisStatus::COASTING,
                    _ => {}
                }
            }
        }
        status
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
