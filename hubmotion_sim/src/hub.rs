//! Simulated hub hardware.
//!
//! [`SimHub`] implements every hardware seam of the motion core on top of
//! one [`MotorPlant`] per port:
//!
//! - each step publishes plant motion into a [`TachoCounter`] per port, the
//!   way an edge interrupt would; encoder reads load those counters
//! - the H-bridge latches a duty cycle (or coast) per port
//! - a fixed battery converts voltage to duty and back
//! - the clock is simulated time, advanced by [`SimHub::step`]
//!
//! Ports can be unplugged at runtime to exercise fault handling.

use hubmotion_common::consts::{CONTROL_LOOP_TICKS, MAX_AXES, MAX_DUTY, US_PER_TICK};
use hubmotion_common::error::HalError;
use hubmotion_common::hal::driver::{BatteryModel, Clock, EncoderDriver, FixedBattery, MotorDriver};
use hubmotion_common::hal::tacho::TachoCounter;
use hubmotion_common::motor::MotorKind;
use tracing::{debug, warn};

use crate::plant::{EndStops, MotorPlant};

/// Output latched on a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    /// High impedance.
    #[default]
    Coast,
    /// Signed duty cycle; zero shorts the windings.
    Duty(i32),
}

#[derive(Debug, Default)]
struct Port {
    kind: Option<MotorKind>,
    plant: Option<MotorPlant>,
    tacho: TachoCounter,
    output: Output,
    connected: bool,
}

impl Port {
    /// Publish the plant state as encoder counts.
    fn sync_tacho(&self, resolution: i64) {
        let Some(plant) = &self.plant else {
            return;
        };
        let count = plant.position_mdeg().div_euclid(resolution);
        self.tacho.add(count - self.tacho.count());
        self.tacho.set_rate(plant.speed_mdeg());
    }
}

/// Hub whose motors are simulated.
#[derive(Debug)]
pub struct SimHub {
    ports: [Port; MAX_AXES],
    battery: FixedBattery,
    /// Encoder quantization [mdeg].
    resolution: i64,
    elapsed_us: u64,
}

impl SimHub {
    /// Empty hub with the given battery voltage [mV].
    pub fn new(battery_mv: i32) -> Self {
        Self {
            ports: Default::default(),
            battery: FixedBattery { voltage_mv: battery_mv },
            resolution: 1,
            elapsed_us: 0,
        }
    }

    /// Start the clock at `ticks` instead of zero.
    pub fn with_start_ticks(mut self, ticks: u32) -> Self {
        self.elapsed_us = ticks as u64 * US_PER_TICK as u64;
        self
    }

    /// Quantize encoder positions to `resolution` [mdeg].
    pub fn with_encoder_resolution(mut self, resolution: i64) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    /// Plug a motor into `port`.
    pub fn attach(&mut self, port: u8, kind: MotorKind, stops: EndStops) -> Result<(), HalError> {
        let p = self.port_mut(port)?;
        p.kind = Some(kind);
        p.plant = kind.model().map(|m| MotorPlant::new(m).with_stops(stops));
        p.tacho.reset(0);
        p.output = Output::Coast;
        p.connected = true;
        debug!(port, ?kind, "motor attached");
        Ok(())
    }

    /// Simulate unplugging the cable: reads and writes fail, the motor
    /// coasts.
    pub fn disconnect(&mut self, port: u8) -> Result<(), HalError> {
        let p = self.port_mut(port)?;
        p.connected = false;
        p.output = Output::Coast;
        warn!(port, "port disconnected");
        Ok(())
    }

    /// Plug the cable back in.
    pub fn reconnect(&mut self, port: u8) -> Result<(), HalError> {
        let p = self.port_mut(port)?;
        if p.kind.is_none() {
            return Err(HalError::UnknownChannel(port));
        }
        p.connected = true;
        debug!(port, "port reconnected");
        Ok(())
    }

    /// Last output written to `port`.
    pub fn output(&self, port: u8) -> Option<Output> {
        self.ports.get(port as usize).map(|p| p.output)
    }

    /// Plant on `port`, if the motor has one.
    pub fn plant(&self, port: u8) -> Option<&MotorPlant> {
        self.ports.get(port as usize)?.plant.as_ref()
    }

    /// Set up the shaft on `port`: angle [deg] and external load [µNm].
    pub fn place(&mut self, port: u8, angle: f64, load_unm: i32) -> Result<(), HalError> {
        let resolution = self.resolution;
        let p = self.port_mut(port)?;
        let plant = p
            .plant
            .as_mut()
            .ok_or_else(|| HalError::CommunicationError(format!("no encoder on port {port}")))?;
        plant.set_position(angle);
        plant.set_load(load_unm);
        p.sync_tacho(resolution);
        Ok(())
    }

    /// Terminal voltage currently applied on `port` [mV], `None` when
    /// coasting.
    pub fn voltage(&self, port: u8) -> Option<i32> {
        match self.output(port)? {
            Output::Coast => None,
            Output::Duty(duty) => Some(self.duty_to_voltage(duty)),
        }
    }

    /// Advance simulated time by one control period.
    pub fn step(&mut self) {
        let battery = self.battery.voltage_mv as i64;
        for port in self.ports.iter_mut() {
            let voltage = match port.output {
                Output::Coast => None,
                Output::Duty(duty) => Some((duty as i64 * battery / MAX_DUTY as i64) as i32),
            };
            if let Some(plant) = port.plant.as_mut() {
                plant.step(voltage);
            }
            port.sync_tacho(self.resolution);
        }
        self.elapsed_us += (CONTROL_LOOP_TICKS * US_PER_TICK) as u64;
    }

    fn duty_to_voltage(&self, duty: i32) -> i32 {
        (duty as i64 * self.battery.voltage_mv as i64 / MAX_DUTY as i64) as i32
    }

    fn port_mut(&mut self, channel: u8) -> Result<&mut Port, HalError> {
        self.ports
            .get_mut(channel as usize)
            .ok_or(HalError::UnknownChannel(channel))
    }

    /// Port that has a motor plugged in and connected.
    fn live(&self, channel: u8) -> Result<&Port, HalError> {
        let port = self
            .ports
            .get(channel as usize)
            .ok_or(HalError::UnknownChannel(channel))?;
        if port.kind.is_none() {
            return Err(HalError::UnknownChannel(channel));
        }
        if !port.connected {
            return Err(HalError::Disconnected(channel));
        }
        Ok(port)
    }

    /// Counter of a connected port that has an encoder.
    fn live_tacho(&self, channel: u8) -> Result<&TachoCounter, HalError> {
        let port = self.live(channel)?;
        if port.plant.is_none() {
            return Err(HalError::CommunicationError(format!("no encoder on port {channel}")));
        }
        Ok(&port.tacho)
    }
}

impl EncoderDriver for SimHub {
    fn position(&self, channel: u8) -> Result<i64, HalError> {
        Ok(self.live_tacho(channel)?.position(self.resolution))
    }

    fn speed(&self, channel: u8) -> Result<i32, HalError> {
        Ok(self.live_tacho(channel)?.rate())
    }
}

impl MotorDriver for SimHub {
    fn coast(&mut self, channel: u8) -> Result<(), HalError> {
        self.live(channel)?;
        self.port_mut(channel)?.output = Output::Coast;
        Ok(())
    }

    fn set_duty_cycle(&mut self, channel: u8, duty: i32) -> Result<(), HalError> {
        self.live(channel)?;
        self.port_mut(channel)?.output = Output::Duty(duty.clamp(-MAX_DUTY, MAX_DUTY));
        Ok(())
    }
}

impl BatteryModel for SimHub {
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32 {
        self.battery.voltage_to_duty(voltage_mv)
    }
}

impl Clock for SimHub {
    fn now_ms(&self) -> u32 {
        (self.elapsed_us / 1000) as u32
    }

    fn now_us(&self) -> u32 {
        self.elapsed_us as u32
    }

    fn now_ticks(&self) -> u32 {
        (self.elapsed_us / US_PER_TICK as u64) as u32
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
