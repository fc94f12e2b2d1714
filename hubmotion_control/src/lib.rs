//! # hubmotion control library
//!
//! Motion core for one LEGO-style hub: turns run, run-for-time, run-to-angle
//! and run-until-stalled requests into closed-loop actuation of DC motors
//! with encoders.
//!
//! ## Layers
//!
//! 1. **Trajectory**: closed-form position/speed/acceleration profiles
//! 2. **Integrators**: speed and position error accumulation with stall detection
//! 3. **Observer**: model-based speed and load estimation
//! 4. **Controller**: PID plus feedforward against the active trajectory
//! 5. **Servo**: per-axis state machine driving a [`dcmotor::DcMotor`]
//! 6. **MotionSystem**: arena of up to six axes sharing one hub
//!
//! ## Execution model
//!
//! Single-threaded and non-blocking. Hardware is passed in through the
//! [`hubmotion_common::hal::driver::Hub`] trait; every operation completes
//! in bounded time so it can be called from a periodic control tick.

pub mod control;
pub mod dcmotor;
pub mod observer;
pub mod servo;
pub mod system;
pub mod trajectory;

#[cfg(test)]
mod mock;

pub use control::controller::{Actuation, AfterStop, ControlOutput, Objective};
pub use servo::{Servo, ServoState};
pub use system::{AxisId, AxisStatus, MotionSystem};
