//! In-memory hub shared by the integration tests.

use hubmotion_common::consts::{CONTROL_LOOP_TICKS, MAX_AXES};
use hubmotion_common::error::HalError;
use hubmotion_common::hal::driver::{BatteryModel, Clock, EncoderDriver, FixedBattery, MotorDriver};

/// Hub with scriptable encoders and per-channel fault injection.
#[derive(Debug)]
pub struct TestHub {
    pub positions: [i64; MAX_AXES],
    pub speeds: [i32; MAX_AXES],
    /// Last duty per channel; `None` when coasting.
    pub duties: [Option<i32>; MAX_AXES],
    pub faulty: [bool; MAX_AXES],
    pub battery: FixedBattery,
    pub ticks: u32,
}

impl TestHub {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(ticks: u32) -> Self {
        Self {
            positions: [0; MAX_AXES],
            speeds: [0; MAX_AXES],
            duties: [None; MAX_AXES],
            faulty: [false; MAX_AXES],
            battery: FixedBattery { voltage_mv: 9000 },
            ticks,
        }
    }

    /// Advance the clock by one control period.
    pub fn advance(&mut self) {
        self.ticks = self.ticks.wrapping_add(CONTROL_LOOP_TICKS);
    }

    fn channel(&self, channel: u8) -> Result<usize, HalError> {
        let idx = channel as usize;
        if idx >= MAX_AXES {
            return Err(HalError::UnknownChannel(channel));
        }
        if self.faulty[idx] {
            return Err(HalError::Disconnected(channel));
        }
        Ok(idx)
    }
}

impl EncoderDriver for TestHub {
    fn position(&self, channel: u8) -> Result<i64, HalError> {
        self.channel(channel).map(|i| self.positions[i])
    }

    fn speed(&self, channel: u8) -> Result<i32, HalError> {
        self.channel(channel).map(|i| self.speeds[i])
    }
}

impl MotorDriver for TestHub {
    fn coast(&mut self, channel: u8) -> Result<(), HalError> {
        let idx = channel as usize;
        if idx >= MAX_AXES {
            return Err(HalError::UnknownChannel(channel));
        }
        self.duties[idx] = None;
        Ok(())
    }

    fn set_duty_cycle(&mut self, channel: u8, duty: i32) -> Result<(), HalError> {
        let idx = self.channel(channel)?;
        self.duties[idx] = Some(duty);
        Ok(())
    }
}

impl BatteryModel for TestHub {
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32 {
        self.battery.voltage_to_duty(voltage_mv)
    }
}

impl Clock for TestHub {
    fn now_ms(&self) -> u32 {
        self.ticks / 10
    }

    fn now_us(&self) -> u32 {
        self.ticks.wrapping_mul(100)
    }

    fn now_ticks(&self) -> u32 {
        self.ticks
    }
}
