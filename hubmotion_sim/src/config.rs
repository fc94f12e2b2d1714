//! Simulator configuration and motion scenarios.
//!
//! One TOML file describes the hub: shared settings, the axes plugged into
//! it, plant parameters and optionally an inline scenario. A scenario can
//! also live in its own file (`[[steps]]` tables).
//!
//! Angles and speeds are in degrees, like the axis overrides.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "sim"
//!
//! [sim]
//! battery_mv = 7200
//! duration_ms = 3000
//!
//! [[sim.plants]]
//! port = 0
//! upper_stop_deg = 120
//!
//! [[axes]]
//! name = "arm"
//! port = 0
//! motor = "technic_m_angular"
//!
//! [[scenario.steps]]
//! at_ms = 0
//! axis = "arm"
//! action = { command = "run_target", speed = 500, target = 90 }
//! ```

use serde::{Deserialize, Serialize};

use hubmotion_common::config::{AxisConfig, ConfigError, SharedConfig, validate_axes};
use hubmotion_common::consts::{DURATION_MAX_MS, MAX_AXES, NOMINAL_BATTERY_MV};
use hubmotion_control::control::controller::AfterStop;

use crate::plant::EndStops;

/// Top-level simulator configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub sim: SimParams,
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub scenario: Scenario,
}

impl SimConfig {
    /// Validate every section and the references between them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        validate_axes(&self.axes)?;
        self.sim.validate()?;
        for plant in &self.sim.plants {
            if !self.axes.iter().any(|a| a.port == plant.port) {
                return Err(ConfigError::ValidationError(format!(
                    "plant on port {} has no axis",
                    plant.port
                )));
            }
        }
        self.scenario.validate(&self.axes)
    }

    /// Plant parameters for `port`, defaulted if not configured.
    pub fn plant(&self, port: u8) -> PlantConfig {
        self.sim
            .plants
            .iter()
            .find(|p| p.port == port)
            .copied()
            .unwrap_or(PlantConfig { port, ..PlantConfig::default() })
    }
}

/// Simulation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimParams {
    /// Battery voltage [mV].
    pub battery_mv: i32,
    /// Initial tick count, to exercise clock wraparound.
    pub start_ticks: u32,
    /// Encoder quantization [mdeg].
    pub encoder_resolution_mdeg: i64,
    /// Simulated time when the binary is not given `--ticks` [ms].
    pub duration_ms: u32,
    /// Emit a telemetry frame every this many control periods.
    pub telemetry_every: u32,
    pub plants: Vec<PlantConfig>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            battery_mv: NOMINAL_BATTERY_MV,
            start_ticks: 0,
            encoder_resolution_mdeg: 1000,
            duration_ms: 5000,
            telemetry_every: 20,
            plants: Vec::new(),
        }
    }
}

impl SimParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(3_000..=12_000).contains(&self.battery_mv) {
            return Err(ConfigError::ValidationError(format!(
                "battery_mv {} out of range [3000, 12000]",
                self.battery_mv
            )));
        }
        if self.encoder_resolution_mdeg < 1 {
            return Err(ConfigError::ValidationError(
                "encoder_resolution_mdeg must be at least 1".into(),
            ));
        }
        if self.duration_ms > DURATION_MAX_MS {
            return Err(ConfigError::ValidationError(format!(
                "duration_ms {} exceeds {}",
                self.duration_ms, DURATION_MAX_MS
            )));
        }
        if self.telemetry_every == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry_every must be at least 1".into(),
            ));
        }
        for (i, plant) in self.plants.iter().enumerate() {
            plant.validate()?;
            if self.plants[..i].iter().any(|p| p.port == plant.port) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate plant for port {}",
                    plant.port
                )));
            }
        }
        Ok(())
    }
}

/// Mechanical setup of one port.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlantConfig {
    pub port: u8,
    /// Initial shaft angle [deg].
    pub start_deg: i32,
    /// Lower end stop [deg].
    pub lower_stop_deg: Option<i32>,
    /// Upper end stop [deg].
    pub upper_stop_deg: Option<i32>,
    /// Constant external torque on the shaft [mNm].
    pub load_mnm: i32,
}

impl PlantConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port as usize >= MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "plant port {} out of range",
                self.port
            )));
        }
        if let (Some(lo), Some(hi)) = (self.lower_stop_deg, self.upper_stop_deg)
            && lo >= hi
        {
            return Err(ConfigError::ValidationError(format!(
                "port {}: lower stop {} not below upper stop {}",
                self.port, lo, hi
            )));
        }
        let inside_lower = self.lower_stop_deg.is_none_or(|lo| self.start_deg >= lo);
        let inside_upper = self.upper_stop_deg.is_none_or(|hi| self.start_deg <= hi);
        if !(inside_lower && inside_upper) {
            return Err(ConfigError::ValidationError(format!(
                "port {}: start angle {} outside the end stops",
                self.port, self.start_deg
            )));
        }
        Ok(())
    }

    pub fn stops(&self) -> EndStops {
        EndStops {
            lower: self.lower_stop_deg.map(f64::from),
            upper: self.upper_stop_deg.map(f64::from),
        }
    }
}

/// Ordered list of timed commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Every step must name a configured axis.
    pub fn validate(&self, axes: &[AxisConfig]) -> Result<(), ConfigError> {
        for step in &self.steps {
            if !axes.iter().any(|a| a.name == step.axis) {
                return Err(ConfigError::ValidationError(format!(
                    "scenario step at {} ms names unknown axis '{}'",
                    step.at_ms, step.axis
                )));
            }
        }
        Ok(())
    }
}

/// One command issued to one axis at a point in simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioStep {
    /// Simulated time of the command [ms].
    pub at_ms: u32,
    pub axis: String,
    pub action: Action,
}

/// Scenario command. Speeds in deg/s, angles in deg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Action {
    Run {
        speed: i32,
    },
    RunTime {
        speed: i32,
        time_ms: i32,
        #[serde(default)]
        then: AfterStop,
    },
    RunUntilStalled {
        speed: i32,
        #[serde(default = "coast")]
        then: AfterStop,
    },
    RunTarget {
        speed: i32,
        target: i64,
        #[serde(default)]
        then: AfterStop,
    },
    RunAngle {
        speed: i32,
        angle: i64,
        #[serde(default)]
        then: AfterStop,
    },
    TrackTarget {
        target: i64,
    },
    Stop {
        #[serde(default = "coast")]
        then: AfterStop,
    },
    SetVoltage {
        voltage_mv: i32,
    },
    ResetAngle {
        angle: i64,
    },
    /// Unplug the motor cable.
    Disconnect,
    /// Plug it back in.
    Reconnect,
}

fn coast() -> AfterStop {
    AfterStop::Coast
}

// ─── Tests ──────────────────────────────────────────────────────────
