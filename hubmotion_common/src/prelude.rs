//! Prelude module for common re-exports.
//!
//! ```rust
//! use hubmotion_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{AxisConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CONTROL_LOOP_TICKS, MAX_AXES, TICKS_PER_MS};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{HalError, MotionError};

// ─── Hardware seams ─────────────────────────────────────────────────
pub use crate::hal::driver::{BatteryModel, Clock, EncoderDriver, FixedBattery, Hub, MotorDriver};
pub use crate::hal::tacho::TachoCounter;

// ─── Motors & settings ──────────────────────────────────────────────
pub use crate::motor::{Direction, MotorKind, MotorModel};
pub use crate::settings::ControlSettings;
