//! Hardware collaborator traits consumed by the motion core.
//!
//! This module defines:
//! - [`EncoderDriver`] - position/speed counters of a motor port
//! - [`MotorDriver`] - H-bridge output of a motor port
//! - [`Clock`] - wrapping time source
//! - [`BatteryModel`] - voltage to duty compensation
//! - [`Hub`] - all of the above behind one handle
//!
//! # Timing Contracts
//!
//! Every method is called from the control tick and MUST complete in
//! bounded time without blocking. Encoder counters may be updated from an
//! interrupt; a read returns a consistent snapshot.

use crate::consts::MAX_DUTY;
use crate::error::HalError;

/// Rotation sensor attached to a motor port.
pub trait EncoderDriver {
    /// Absolute position [mdeg].
    fn position(&self, channel: u8) -> Result<i64, HalError>;

    /// Measured speed [mdeg/s].
    fn speed(&self, channel: u8) -> Result<i32, HalError>;
}

/// H-bridge output of a motor port.
pub trait MotorDriver {
    /// Release the motor (high impedance).
    fn coast(&mut self, channel: u8) -> Result<(), HalError>;

    /// Apply a signed duty cycle in `±MAX_DUTY`. Zero shorts the windings
    /// (passive brake).
    fn set_duty_cycle(&mut self, channel: u8, duty: i32) -> Result<(), HalError>;
}

/// Wrapping time source.
///
/// Each timescale wraps independently over the full `u32` range, so only
/// differences of stamps from the same timescale are meaningful.
pub trait Clock {
    /// Milliseconds since an arbitrary epoch (wrapping).
    fn now_ms(&self) -> u32;

    /// Microseconds since an arbitrary epoch (wrapping).
    fn now_us(&self) -> u32;

    /// Control ticks (100 µs) since an arbitrary epoch (wrapping over the
    /// full `u32` range).
    fn now_ticks(&self) -> u32;
}

/// Battery-compensated voltage to duty mapping.
pub trait BatteryModel {
    /// Duty cycle that produces `voltage_mv` at the motor terminals.
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32;
}

/// Everything a control tick touches on one hub.
///
/// Implemented automatically for any type providing all four collaborators.
pub trait Hub: EncoderDriver + MotorDriver + BatteryModel + Clock {}

impl<T: EncoderDriver + MotorDriver + BatteryModel + Clock> Hub for T {}

/// Battery with a fixed terminal voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBattery {
    /// Battery voltage [mV].
    pub voltage_mv: i32,
}

impl BatteryModel for FixedBattery {
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32 {
        if self.voltage_mv <= 0 {
            return 0;
        }
        let duty = voltage_mv as i64 * MAX_DUTY as i64 / self.voltage_mv as i64;
        duty.clamp(-(MAX_DUTY as i64), MAX_DUTY as i64) as i32
    }
}
