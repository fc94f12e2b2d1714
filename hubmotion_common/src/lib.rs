//! hubmotion common library
//!
//! Shared vocabulary of the hubmotion workspace: units, settings, motor
//! models, error types, hardware seams and configuration loading.
//!
//! # Module Structure
//!
//! - [`consts`] - Time base, unit scales and limits
//! - [`error`] - `MotionError` and `HalError`
//! - [`hal`] - Encoder, motor driver, clock and battery traits; tachometer counters
//! - [`motor`] - Motor classes and calibrated models
//! - [`settings`] - Per-axis `ControlSettings`
//! - [`config`] - TOML configuration loading
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use hubmotion_common::prelude::*;
//!
//! let settings = ControlSettings::for_motor(MotorKind::TechnicMAngular, 9000);
//! assert!(settings.is_some());
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod motor;
pub mod prelude;
pub mod settings;
