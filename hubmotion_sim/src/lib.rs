//! # hubmotion simulator
//!
//! Simulated hub hardware for the motion core, plus a runner that plays
//! scripted motion scenarios against it.
//!
//! # Module Structure
//!
//! - [`plant`] - Per-port motor physics
//! - [`hub`] - `SimHub`: encoders, H-bridges, battery and clock over the plants
//! - [`clock`] - Host monotonic clock and real-time pacing
//! - [`config`] - Simulator configuration and scenarios
//! - [`runner`] - Scenario runner and telemetry frames
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       hubmotion_sim                          │
//! │  ┌──────────────┐    ┌───────────────┐    ┌──────────────┐   │
//! │  │ SimConfig    │───►│ScenarioRunner │───►│ MotionSystem │   │
//! │  │ + Scenario   │    │ (period loop) │    │ (control)    │   │
//! │  └──────────────┘    └───────┬───────┘    └──────┬───────┘   │
//! │                              │ Pacer             │ Hub traits│
//! │                              ▼                   ▼           │
//! │                     ┌────────────────┐   ┌──────────────┐    │
//! │                     │ MonotonicClock │   │ SimHub       │    │
//! │                     └────────────────┘   │ + MotorPlant │    │
//! │                                          └──────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod hub;
pub mod plant;
pub mod runner;

pub use crate::clock::{MonotonicClock, Pacer};
pub use crate::config::{Action, Scenario, ScenarioStep, SimConfig};
pub use crate::hub::SimHub;
pub use crate::runner::{ScenarioRunner, SimError, TelemetryFrame};
