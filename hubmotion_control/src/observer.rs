//! Speed and load observer.
//!
//! The servo consumes an [`Observer`] through a small trait so the estimator
//! is swappable. [`LinearObserver`] is the default: a discrete-time
//! second-order DC motor model driven by the applied voltage and corrected
//! by the measured position.
//!
//! ## Model
//!
//! ```text
//! τ_e = k_0 · V                  electrical torque
//! τ_o = obs_gain · (θ_meas − θ)  correction, also the load estimate
//! τ_f = f_low · sign(ω)          Coulomb friction
//!
//! θ' = θ + phi_01·ω + gam_0·(τ_e + τ_o)
//! ω' = phi_11·ω + gam_1·(τ_e + τ_o − τ_f)
//! ```
//!
//! Friction never reverses the speed on its own: if ω would change sign
//! within one step it is set to zero instead.
//!
//! Models without dynamics (EV3) fall back to differentiating the measured
//! position over one control period.

use hubmotion_common::consts::CONTROL_LOOP_TIME_MS;
use hubmotion_common::motor::MotorModel;
use tracing::trace;

use crate::control::feedforward::{FeedforwardGains, feedforward_compute};

/// Observer output for one control period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverEstimate {
    /// Estimated speed [mdeg/s].
    pub speed: i32,
    /// Estimated load torque [µNm].
    pub torque: i32,
}

/// State estimator interface used by the servo.
pub trait Observer {
    /// Restart from a known position [mdeg] and speed [mdeg/s].
    fn reset(&mut self, position: i64, speed: i32);

    /// Advance by one control period given the voltage applied during the
    /// last period [mV] and the current measured position [mdeg].
    fn update(&mut self, voltage_mv: i32, position: i64) -> ObserverEstimate;

    /// Current position estimate [mdeg].
    fn estimated_position(&self) -> i64;

    /// Voltage producing `torque` [µNm] at standstill [mV].
    fn torque_to_voltage(&self, torque: i32) -> i32;

    /// Torque needed to follow a reference unloaded [µNm].
    fn feedforward_torque(&self, speed_ref: i32, accel_ref: i32) -> i32;
}

/// Linear model-based observer.
#[derive(Debug, Clone)]
pub struct LinearObserver {
    model: &'static MotorModel,
    ff: FeedforwardGains,
    /// Estimated position [deg].
    position: f64,
    /// Estimated speed [deg/s].
    speed: f32,
    /// Previous measurement [mdeg], for models without dynamics.
    last_measured: i64,
}

impl LinearObserver {
    pub fn new(model: &'static MotorModel) -> Self {
        Self {
            model,
            ff: FeedforwardGains::from(model),
            position: 0.0,
            speed: 0.0,
            last_measured: 0,
        }
    }

    #[inline]
    pub fn model(&self) -> &'static MotorModel {
        self.model
    }

    fn update_differentiating(&mut self, position: i64) -> ObserverEstimate {
        let delta = position - self.last_measured;
        let speed = delta * 1000 / CONTROL_LOOP_TIME_MS as i64;
        self.last_measured = position;
        self.position = position as f64 / 1000.0;
        self.speed = speed as f32 / 1000.0;
        ObserverEstimate {
            speed: speed.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            torque: 0,
        }
    }
}

impl Observer for LinearObserver {
    fn reset(&mut self, position: i64, speed: i32) {
        self.position = position as f64 / 1000.0;
        self.speed = speed as f32 / 1000.0;
        self.last_measured = position;
    }

    fn update(&mut self, voltage_mv: i32, position: i64) -> ObserverEstimate {
        let m = self.model;
        if !m.has_dynamics() {
            return self.update_differentiating(position);
        }

        let measured = position as f64 / 1000.0;
        let error = (measured - self.position) as f32;

        let tau_e = m.k_0 * voltage_mv as f32 / 1000.0;
        let tau_o = m.obs_gain * error;
        let tau_f = if self.speed > 0.0 {
            m.f_low
        } else if self.speed < 0.0 {
            -m.f_low
        } else {
            0.0
        };

        let estimate = ObserverEstimate {
            speed: (self.speed * 1000.0) as i32,
            torque: (tau_o * 1_000_000.0) as i32,
        };

        let next_position = self.position + (m.phi_01 * self.speed + m.gam_0 * (tau_e + tau_o)) as f64;
        let mut next_speed = m.phi_11 * self.speed + m.gam_1 * (tau_e + tau_o - tau_f);
        if (self.speed > 0.0 && next_speed < 0.0) || (self.speed < 0.0 && next_speed > 0.0) {
            next_speed = 0.0;
        }

        self.position = next_position;
        self.speed = next_speed;
        self.last_measured = position;

        trace!(error, tau_o, speed = estimate.speed, "observer");
        estimate
    }

    fn estimated_position(&self) -> i64 {
        (self.position * 1000.0) as i64
    }

    fn torque_to_voltage(&self, torque: i32) -> i32 {
        self.model.torque_to_voltage(torque)
    }

    fn feedforward_torque(&self, speed_ref: i32, accel_ref: i32) -> i32 {
        feedforward_compute(&self.ff, speed_ref, accel_ref)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
