//! DC motor actuator: signed voltage to duty cycle on one H-bridge channel.
//!
//! ## Invariants
//!
//! - `0 ≤ max_voltage ≤ max_voltage_hardware` at all times.
//! - Every voltage written is clamped to `±max_voltage` first.
//! - The configured [`Direction`] is applied last, right before the driver.

use serde::Serialize;
use tracing::{debug, error};

use hubmotion_common::error::MotionError;
use hubmotion_common::hal::driver::{BatteryModel, MotorDriver};
use hubmotion_common::motor::{Direction, MotorKind};

/// What the H-bridge was last told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DcActuation {
    /// Windings released.
    #[default]
    Coast,
    /// Windings shorted.
    Brake,
    /// Driven at a voltage.
    Voltage,
}

/// Snapshot of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DcMotorState {
    pub actuation: DcActuation,
    /// Applied voltage in the user frame [mV].
    pub voltage_mv: i32,
}

/// Hardware voltage ceiling for a motor class [mV].
#[inline]
pub const fn max_voltage_for(kind: MotorKind) -> i32 {
    kind.max_voltage_hardware()
}

/// One motor channel.
#[derive(Debug, Clone)]
pub struct DcMotor {
    channel: u8,
    direction: Direction,
    max_voltage: i32,
    max_voltage_hardware: i32,
    state: DcMotorState,
}

impl DcMotor {
    /// Motor on `channel` limited to the hardware ceiling of `kind`.
    pub fn new(channel: u8, kind: MotorKind, direction: Direction) -> Self {
        let max_voltage_hardware = max_voltage_for(kind);
        Self {
            channel,
            direction,
            max_voltage: max_voltage_hardware,
            max_voltage_hardware,
            state: DcMotorState::default(),
        }
    }

    #[inline]
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub const fn max_voltage(&self) -> i32 {
        self.max_voltage
    }

    #[inline]
    pub const fn max_voltage_hardware(&self) -> i32 {
        self.max_voltage_hardware
    }

    #[inline]
    pub const fn state(&self) -> DcMotorState {
        self.state
    }

    /// Set the software voltage cap [mV].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if negative or above the hardware ceiling.
    pub fn set_settings(&mut self, max_voltage: i32) -> Result<(), MotionError> {
        if max_voltage < 0 || max_voltage > self.max_voltage_hardware {
            return Err(MotionError::InvalidArgument("max_voltage out of range"));
        }
        debug!(channel = self.channel, max_voltage, "voltage cap set");
        self.max_voltage = max_voltage;
        Ok(())
    }

    /// Drive at `voltage_mv`, clamped to the software cap.
    pub fn set_voltage<D>(&mut self, hub: &mut D, voltage_mv: i32) -> Result<(), MotionError>
    where
        D: MotorDriver + BatteryModel,
    {
        let voltage = voltage_mv.clamp(-self.max_voltage, self.max_voltage);
        let duty = hub.voltage_to_duty(voltage) * self.direction.sign();
        hub.set_duty_cycle(self.channel, duty).map_err(|e| {
            error!(channel = self.channel, %e, "set_duty_cycle failed");
            MotionError::from(e)
        })?;
        self.state = DcMotorState {
            actuation: DcActuation::Voltage,
            voltage_mv: voltage,
        };
        Ok(())
    }

    /// Release the motor.
    pub fn coast<D: MotorDriver>(&mut self, hub: &mut D) -> Result<(), MotionError> {
        // Reported as coasting even when the driver call fails.
        self.state = DcMotorState::default();
        hub.coast(self.channel).map_err(|e| {
            error!(channel = self.channel, %e, "coast failed");
            MotionError::from(e)
        })
    }

    /// Short the windings.
    pub fn brake<D: MotorDriver>(&mut self, hub: &mut D) -> Result<(), MotionError> {
        hub.set_duty_cycle(self.channel, 0).map_err(|e| {
            error!(channel = self.channel, %e, "brake failed");
            MotionError::from(e)
        })?;
        self.state = DcMotorState {
            actuation: DcActuation::Brake,
            voltage_mv: 0,
        };
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
