//! Motor physics plant.
//!
//! One [`MotorPlant`] per motor port, advanced once per control period
//! from the voltage the H-bridge applied during that period.
//!
//! ## Driven or braked
//!
//! Motors with calibrated dynamics follow their discrete model, the same
//! one the observer runs, plus an external load torque:
//!
//! ```text
//! τ = k_0·V + τ_load
//! θ' = θ + phi_01·ω + gam_0·τ
//! ω' = phi_11·ω + gam_1·(τ − τ_f)
//! ```
//!
//! A braked motor is driven at 0 V. Models without dynamics (EV3) use a
//! first-order lag towards the back-EMF speed `V / k_2`.
//!
//! ## Coasting
//!
//! No current flows, so only friction and load act on the shaft.
//!
//! ## Hard stops
//!
//! Optional end stops clamp the shaft and kill any speed into the stop.

use hubmotion_common::consts::CONTROL_LOOP_TIME_MS;
use hubmotion_common::motor::MotorModel;
use tracing::trace;

/// Control period [s].
const DT: f32 = CONTROL_LOOP_TIME_MS as f32 / 1000.0;

/// Time constant of the first-order fallback [s].
const LAG_TIME_CONSTANT: f32 = 0.05;

/// Coasting deceleration of models without dynamics [deg/s²].
const COAST_DECELERATION: f32 = 2000.0;

/// Mechanical end stops [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EndStops {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Simulated motor shaft.
#[derive(Debug, Clone)]
pub struct MotorPlant {
    model: &'static MotorModel,
    /// Shaft angle [deg].
    position: f64,
    /// Shaft speed [deg/s].
    speed: f32,
    /// External torque acting on the shaft [Nm].
    load: f32,
    stops: EndStops,
}

impl MotorPlant {
    pub fn new(model: &'static MotorModel) -> Self {
        Self {
            model,
            position: 0.0,
            speed: 0.0,
            load: 0.0,
            stops: EndStops::default(),
        }
    }

    /// Add mechanical end stops.
    pub fn with_stops(mut self, stops: EndStops) -> Self {
        self.stops = stops;
        self
    }

    /// Set the external load torque [µNm].
    pub fn set_load(&mut self, load_unm: i32) {
        self.load = load_unm as f32 / 1_000_000.0;
    }

    /// Place the shaft at `position` [deg], at rest.
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
        self.speed = 0.0;
    }

    /// Shaft angle [mdeg].
    #[inline]
    pub fn position_mdeg(&self) -> i64 {
        (self.position * 1000.0).round() as i64
    }

    /// Shaft speed [mdeg/s].
    #[inline]
    pub fn speed_mdeg(&self) -> i32 {
        (self.speed * 1000.0) as i32
    }

    /// Advance one control period. `None` means the motor coasts.
    pub fn step(&mut self, voltage_mv: Option<i32>) {
        match voltage_mv {
            Some(mv) if self.model.has_dynamics() => self.step_driven(mv),
            Some(mv) => self.step_lag(mv),
            None => self.step_coast(),
        }
        self.apply_stops();
        trace!(position = self.position, speed = self.speed, "plant");
    }

    fn step_driven(&mut self, voltage_mv: i32) {
        let m = self.model;
        let torque = m.k_0 * voltage_mv as f32 / 1000.0 + self.load;
        let Some(friction) = self.friction(torque) else {
            return;
        };
        self.position += (m.phi_01 * self.speed + m.gam_0 * torque) as f64;
        let next = m.phi_11 * self.speed + m.gam_1 * (torque - friction);
        self.speed = self.suppress_reversal(next);
    }

    fn step_lag(&mut self, voltage_mv: i32) {
        let m = self.model;
        let volts = voltage_mv as f32 / 1000.0 + self.load / m.k_0;
        let breakaway = m.f_low / m.k_0;
        let target = if volts.abs() <= breakaway {
            0.0
        } else {
            (volts - breakaway.copysign(volts)) / m.k_2
        };
        self.speed += (target - self.speed) * (DT / LAG_TIME_CONSTANT);
        self.position += (self.speed * DT) as f64;
    }

    fn step_coast(&mut self) {
        let m = self.model;
        let Some(friction) = self.friction(self.load) else {
            return;
        };
        let next = if m.has_dynamics() {
            self.speed + m.gam_1 * (self.load - friction)
        } else {
            self.speed - COAST_DECELERATION * DT * self.speed.signum()
        };
        self.speed = self.suppress_reversal(next);
        self.position += (self.speed * DT) as f64;
    }

    /// Coulomb friction opposing motion, or `None` if static friction holds
    /// the shaft against `torque`.
    fn friction(&self, torque: f32) -> Option<f32> {
        let f = self.model.f_low;
        if self.speed != 0.0 {
            return Some(f.copysign(self.speed));
        }
        if torque.abs() <= f {
            return None;
        }
        Some(f.copysign(torque))
    }

    /// Friction alone never reverses the shaft within one period.
    fn suppress_reversal(&self, next: f32) -> f32 {
        if self.speed * next < 0.0 { 0.0 } else { next }
    }

    fn apply_stops(&mut self) {
        if let Some(lower) = self.stops.lower
            && self.position <= lower
        {
            self.position = lower;
            self.speed = self.speed.max(0.0);
        }
        if let Some(upper) = self.stops.upper
            && self.position >= upper
        {
            self.position = upper;
            self.speed = self.speed.min(0.0);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
