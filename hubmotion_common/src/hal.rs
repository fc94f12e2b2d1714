//! Hardware abstraction seams of the motion core.
//!
//! The motion core never touches registers: it reads encoders, writes
//! H-bridges, asks a clock for the time and a battery model for the duty
//! cycle that yields a voltage. Everything behind these traits is supplied
//! by the surrounding firmware or by the simulator.
//!
//! - [`driver`] - Collaborator traits and the fixed battery
//! - [`tacho`] - Interrupt-shared encoder counters

pub mod driver;
pub mod tacho;
