//! In-memory hub for unit tests.

use hubmotion_common::consts::MAX_AXES;
use hubmotion_common::error::HalError;
use hubmotion_common::hal::driver::{BatteryModel, Clock, EncoderDriver, FixedBattery, MotorDriver};

/// Output last written to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Coast,
    Duty(i32),
}

#[derive(Debug, Clone)]
pub struct MockHub {
    pub positions: [i64; MAX_AXES],
    pub speeds: [i32; MAX_AXES],
    pub outputs: [Output; MAX_AXES],
    pub fail_encoder: bool,
    pub fail_motor: bool,
    pub battery: FixedBattery,
    pub ticks: u32,
}

impl Default for MockHub {
    fn default() -> Self {
        Self {
            positions: [0; MAX_AXES],
            speeds: [0; MAX_AXES],
            outputs: [Output::Coast; MAX_AXES],
            fail_encoder: false,
            fail_motor: false,
            battery: FixedBattery { voltage_mv: 9000 },
            ticks: 0,
        }
    }
}

impl MockHub {
    fn check(channel: u8) -> Result<usize, HalError> {
        let idx = channel as usize;
        if idx >= MAX_AXES {
            return Err(HalError::UnknownChannel(channel));
        }
        Ok(idx)
    }

    pub fn duty(&self, channel: u8) -> Option<i32> {
        match self.outputs[channel as usize] {
            Output::Coast => None,
            Output::Duty(d) => Some(d),
        }
    }
}

impl EncoderDriver for MockHub {
    fn position(&self, channel: u8) -> Result<i64, HalError> {
        let idx = Self::check(channel)?;
        if self.fail_encoder {
            return Err(HalError::Disconnected(channel));
        }
        Ok(self.positions[idx])
    }

    fn speed(&self, channel: u8) -> Result<i32, HalError> {
        let idx = Self::check(channel)?;
        if self.fail_encoder {
            return Err(HalError::Disconnected(channel));
        }
        Ok(self.speeds[idx])
    }
}

impl MotorDriver for MockHub {
    fn coast(&mut self, channel: u8) -> Result<(), HalError> {
        let idx = Self::check(channel)?;
        self.outputs[idx] = Output::Coast;
        Ok(())
    }

    fn set_duty_cycle(&mut self, channel: u8, duty: i32) -> Result<(), HalError> {
        let idx = Self::check(channel)?;
        if self.fail_motor {
            return Err(HalError::CommunicationError("bridge fault".into()));
        }
        self.outputs[idx] = Output::Duty(duty);
        Ok(())
    }
}

impl BatteryModel for MockHub {
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32 {
        self.battery.voltage_to_duty(voltage_mv)
    }
}

impl Clock for MockHub {
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
