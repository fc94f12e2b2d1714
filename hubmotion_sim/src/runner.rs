//! Scenario runner.
//!
//! Drives a [`MotionSystem`] on a [`SimHub`] one control period at a time:
//!
//! ```text
//! ┌────────────┐   due steps   ┌──────────────┐  tick   ┌─────────┐
//! │  Scenario  │──────────────►│ MotionSystem │────────►│ SimHub  │
//! └────────────┘               └──────┬───────┘         │ (plant) │
//!                                     │ telemetry       └─────────┘
//!                                     ▼
//!                              TelemetryFrame
//! ```
//!
//! A rejected scenario command is logged and counted; it never stops the
//! run. Hardware faults are handled by the motion core (the axis coasts
//! and reports Errored).

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use hubmotion_common::config::ConfigError;
use hubmotion_common::consts::{CONTROL_LOOP_TIME_MS, MDEG_PER_DEG};
use hubmotion_common::error::{HalError, MotionError};
use hubmotion_common::hal::driver::Clock;
use hubmotion_control::system::{AxisId, AxisTelemetry, MotionSystem};

use crate::config::{Action, Scenario, SimConfig};
use crate::hub::SimHub;

/// Errors that abort a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulated hardware error: {0}")]
    Hardware(#[from] HalError),

    #[error("Motion error: {0}")]
    Motion(#[from] MotionError),
}

/// Snapshot of every axis after one control period.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryFrame {
    /// Control periods since the start of the run.
    pub period: u64,
    /// Hub tick clock.
    pub ticks: u32,
    /// Simulated time since the start of the run [ms].
    pub time_ms: u64,
    pub axes: Vec<AxisTelemetry>,
}

/// Counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub periods: u64,
    pub commands_applied: u32,
    pub commands_rejected: u32,
    pub tick_errors: u32,
}

#[derive(Debug, Clone)]
struct Step {
    at_ms: u64,
    axis: AxisId,
    action: Action,
}

/// Runs a scenario against simulated hardware.
pub struct ScenarioRunner {
    system: MotionSystem<SimHub>,
    steps: Vec<Step>,
    next_step: usize,
    stats: RunStats,
}

impl ScenarioRunner {
    /// Build the hub and the axis arena from a validated configuration.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let params = &config.sim;

        let mut hub = SimHub::new(params.battery_mv)
            .with_start_ticks(params.start_ticks)
            .with_encoder_resolution(params.encoder_resolution_mdeg);
        for axis in &config.axes {
            let plant = config.plant(axis.port);
            hub.attach(axis.port, axis.motor, plant.stops())?;
            if axis.motor.has_encoder() {
                hub.place(axis.port, plant.start_deg as f64, plant.load_mnm * 1000)?;
            }
        }

        let system = MotionSystem::from_config(hub, &config.axes)?;
        let mut runner = Self {
            system,
            steps: Vec::new(),
            next_step: 0,
            stats: RunStats::default(),
        };
        runner.load_scenario(&config.scenario)?;
        info!(
            axes = runner.system.len(),
            steps = runner.steps.len(),
            "scenario runner ready"
        );
        Ok(runner)
    }

    /// Replace the pending scenario. Step times are relative to the start
    /// of the run.
    pub fn load_scenario(&mut self, scenario: &Scenario) -> Result<(), SimError> {
        let mut steps = Vec::with_capacity(scenario.steps.len());
        for step in &scenario.steps {
            let axis = self.system.find(&step.axis).ok_or_else(|| {
                ConfigError::ValidationError(format!("unknown axis '{}'", step.axis))
            })?;
            steps.push(Step {
                at_ms: step.at_ms as u64,
                axis,
                action: step.action,
            });
        }
        steps.sort_by_key(|s| s.at_ms);
        self.steps = steps;
        self.next_step = 0;
        Ok(())
    }

    #[inline]
    pub fn system(&self) -> &MotionSystem<SimHub> {
        &self.system
    }

    #[inline]
    pub fn system_mut(&mut self) -> &mut MotionSystem<SimHub> {
        &mut self.system
    }

    #[inline]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Simulated time since the start of the run [ms].
    #[inline]
    pub fn elapsed_ms(&self) -> u64 {
        self.stats.periods * CONTROL_LOOP_TIME_MS as u64
    }

    /// All steps issued and every axis done.
    pub fn is_finished(&self) -> bool {
        self.next_step >= self.steps.len()
            && self
                .system
                .ids()
                .all(|id| self.system.is_done(id).unwrap_or(true))
    }

    /// Run one control period: issue due commands, tick the axes, advance
    /// the plant.
    pub fn step(&mut self) {
        let now = self.elapsed_ms();
        while let Some(step) = self.steps.get(self.next_step) {
            if step.at_ms > now {
                break;
            }
            let step = step.clone();
            self.next_step += 1;
            match self.apply(step.axis, step.action) {
                Ok(()) => {
                    self.stats.commands_applied += 1;
                    debug!(at_ms = step.at_ms, axis = step.axis.index(), action = ?step.action, "command issued");
                }
                Err(e) => {
                    self.stats.commands_rejected += 1;
                    warn!(at_ms = step.at_ms, axis = step.axis.index(), action = ?step.action, %e, "command rejected");
                }
            }
        }

        if self.system.tick().is_err() {
            self.stats.tick_errors += 1;
        }
        self.system.hub_mut().step();
        self.stats.periods += 1;
    }

    /// Run `periods` control periods, handing a frame to `sink` every
    /// `every` periods.
    pub fn run_for<F>(&mut self, periods: u64, every: u32, mut sink: F) -> Result<(), SimError>
    where
        F: FnMut(&TelemetryFrame) -> Result<(), SimError>,
    {
        for _ in 0..periods {
            self.step();
            if self.stats.periods % every.max(1) as u64 == 0 {
                sink(&self.telemetry()?)?;
            }
        }
        Ok(())
    }

    /// Telemetry of every axis now.
    pub fn telemetry(&self) -> Result<TelemetryFrame, SimError> {
        let axes = self
            .system
            .ids()
            .map(|id| self.system.telemetry(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TelemetryFrame {
            period: self.stats.periods,
            ticks: self.system.hub().now_ticks(),
            time_ms: self.elapsed_ms(),
            axes,
        })
    }

    fn apply(&mut self, id: AxisId, action: Action) -> Result<(), SimError> {
        let deg = |v: i32| v.saturating_mul(MDEG_PER_DEG);
        let mdeg = |v: i64| v.saturating_mul(MDEG_PER_DEG as i64);
        let sys = &mut self.system;

        match action {
            Action::Run { speed } => sys.run(id, deg(speed))?,
            Action::RunTime { speed, time_ms, then } => {
                sys.run_time(id, deg(speed), time_ms, then, false)?
            }
            Action::RunUntilStalled { speed, then } => sys.run_until_stalled(id, deg(speed), then)?,
            Action::RunTarget { speed, target, then } => {
                sys.run_target(id, deg(speed), mdeg(target), then, false)?
            }
            Action::RunAngle { speed, angle, then } => {
                sys.run_angle(id, deg(speed), mdeg(angle), then, false)?
            }
            Action::TrackTarget { target } => sys.track_target(id, mdeg(target))?,
            Action::Stop { then } => sys.stop(id, then)?,
            Action::SetVoltage { voltage_mv } => sys.set_voltage(id, voltage_mv)?,
            Action::ResetAngle { angle } => sys.reset_angle(id, mdeg(angle))?,
            Action::Disconnect => {
                let port = sys.port(id)?;
                sys.hub_mut().disconnect(port)?
            }
            Action::Reconnect => {
                let port = sys.port(id)?;
                sys.hub_mut().reconnect(port)?
            }
        }
        Ok(())
    }
}
