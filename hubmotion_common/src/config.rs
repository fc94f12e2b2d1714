//! Configuration loading traits and types.
//!
//! Axis setups are described in TOML and loaded through [`ConfigLoader`],
//! which every `DeserializeOwned` type gets for free.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "hub-a"
//!
//! [[axes]]
//! name = "arm"
//! port = 0
//! motor = "technic_m_angular"
//! direction = "counterclockwise"
//!
//! [axes.overrides]
//! speed_max = 500
//! pid_kp = 12000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::MAX_AXES;
use crate::error::MotionError;
use crate::motor::{Direction, MotorKind};
use crate::settings::ControlSettings;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<MotionError> for ConfigError {
    fn from(err: MotionError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-tick controller output.
    Trace,
    /// State transitions and installed trajectories.
    Debug,
    /// Lifecycle and configuration.
    #[default]
    Info,
    /// Degraded settings.
    Warn,
    /// Hardware faults.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across hubmotion applications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional per-axis overrides of the motor defaults, in application units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverrides {
    /// Speed limit [deg/s].
    pub speed_max: Option<i32>,
    /// Acceleration [deg/s²].
    pub acceleration: Option<i32>,
    /// Deceleration [deg/s²].
    pub deceleration: Option<i32>,
    /// Actuation limit [mNm].
    pub actuation_max: Option<i32>,
    /// Proportional gain [µNm/deg].
    pub pid_kp: Option<i32>,
    /// Integral gain [µNm/(deg·s)].
    pub pid_ki: Option<i32>,
    /// Derivative gain [µNm/(deg/s)].
    pub pid_kd: Option<i32>,
    /// Integral rate limit [deg/s].
    pub integral_change_max: Option<i32>,
    /// Position tolerance [deg].
    pub position_tolerance: Option<i32>,
    /// Speed tolerance [deg/s].
    pub speed_tolerance: Option<i32>,
    /// Stall speed limit [deg/s].
    pub stall_speed_limit: Option<i32>,
    /// Stall time [ms].
    pub stall_time_ms: Option<u32>,
    /// Use observer speed for feedback.
    pub use_estimated_rate: Option<bool>,
    /// Add model feedforward torque.
    pub use_feedforward: Option<bool>,
}

impl SettingsOverrides {
    /// Apply the overrides on top of `base` through the validating setters.
    pub fn apply(&self, base: &mut ControlSettings) -> Result<(), MotionError> {
        let (speed, accel, decel, actuation) = base.limits();
        base.set_limits(
            self.speed_max.unwrap_or(speed),
            self.acceleration.unwrap_or(accel),
            self.deceleration.unwrap_or(decel),
            self.actuation_max.unwrap_or(actuation),
        )?;

        let (kp, ki, kd, rate) = base.pid();
        base.set_pid(
            self.pid_kp.unwrap_or(kp),
            self.pid_ki.unwrap_or(ki),
            self.pid_kd.unwrap_or(kd),
            self.integral_change_max.unwrap_or(rate),
        )?;

        let (speed_tol, pos_tol) = base.target_tolerances();
        base.set_target_tolerances(
            self.speed_tolerance.unwrap_or(speed_tol),
            self.position_tolerance.unwrap_or(pos_tol),
        )?;

        let (stall_speed, stall_ms) = base.stall_tolerances();
        base.set_stall_tolerances(
            self.stall_speed_limit.unwrap_or(stall_speed),
            self.stall_time_ms.unwrap_or(stall_ms),
        )?;

        if let Some(v) = self.use_estimated_rate {
            base.use_estimated_rate = v;
        }
        if let Some(v) = self.use_feedforward {
            base.use_feedforward = v;
        }
        Ok(())
    }
}

/// One motor port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    /// Human-readable axis name.
    pub name: String,
    /// Driver channel (motor port index).
    pub port: u8,
    /// Motor class on the port.
    pub motor: MotorKind,
    /// Positive rotation sense.
    #[serde(default)]
    pub direction: Direction,
    /// Software voltage cap [mV]; defaults to the hardware ceiling.
    #[serde(default)]
    pub max_voltage_mv: Option<i32>,
    /// Overrides of the motor defaults.
    #[serde(default)]
    pub overrides: SettingsOverrides,
}

impl AxisConfig {
    /// Effective voltage cap [mV].
    pub fn max_voltage(&self) -> i32 {
        self.max_voltage_mv
            .unwrap_or_else(|| self.motor.max_voltage_hardware())
    }

    /// Control settings for this axis, or `None` for motors without encoder.
    pub fn control_settings(&self) -> Result<Option<ControlSettings>, MotionError> {
        let Some(mut settings) = ControlSettings::for_motor(self.motor, self.max_voltage()) else {
            return Ok(None);
        };
        self.overrides.apply(&mut settings)?;
        settings.validate()?;
        Ok(Some(settings))
    }

    /// Validate the axis entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError("axis name cannot be empty".into()));
        }
        let max = self.motor.max_voltage_hardware();
        let v = self.max_voltage();
        if v < 0 || v > max {
            return Err(ConfigError::ValidationError(format!(
                "axis '{}': max_voltage_mv {} out of range [0, {}]",
                self.name, v, max
            )));
        }
        self.control_settings()?;
        Ok(())
    }
}

/// Validate a set of axes: count, unique names and unique ports.
pub fn validate_axes(axes: &[AxisConfig]) -> Result<(), ConfigError> {
    if axes.len() > MAX_AXES {
        return Err(ConfigError::ValidationError(format!(
            "{} axes configured, at most {} supported",
            axes.len(),
            MAX_AXES
        )));
    }
    for (i, axis) in axes.iter().enumerate() {
        axis.validate()?;
        if axes[..i].iter().any(|a| a.name == axis.name) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate axis name '{}'",
                axis.name
            )));
        }
        if axes[..i].iter().any(|a| a.port == axis.port) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate port {} (axis '{}')",
                axis.port, axis.name
            )));
        }
    }
    Ok(())
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
