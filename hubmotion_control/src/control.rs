//! Control engine root.
//!
//! PID feedback on position and speed error, model feedforward, the two
//! error integrators and the per-axis [`controller::Controller`] that
//! combines them with a trajectory and a completion objective.

pub mod controller;
pub mod feedforward;
pub mod integrator;
pub mod pid;
