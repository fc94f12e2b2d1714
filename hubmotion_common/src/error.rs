//! Error types shared by the motion core and its hardware collaborators.
//!
//! - [`MotionError`] is what every motion-core operation returns.
//! - [`HalError`] is what hardware drivers report; it folds into
//!   [`MotionError::DeviceIo`] / [`MotionError::NoDevice`].

use thiserror::Error;

/// Error returned by motion-core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MotionError {
    /// Malformed command or out-of-range setting. Detected before any state
    /// mutation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Trajectory synthesis produced a contradiction (negative phase).
    #[error("Infeasible trajectory: {0}")]
    Infeasible(&'static str),

    /// Hardware read/write failed.
    #[error("Device I/O error: {0}")]
    DeviceIo(String),

    /// Hardware is absent or was unplugged.
    #[error("No device: {0}")]
    NoDevice(String),

    /// Operation not valid for this motor class.
    #[error("Not supported: {0}")]
    NotSupported(&'static str),
}

impl MotionError {
    /// Whether this error originated in hardware (and must coast the motor).
    #[inline]
    pub const fn is_hardware(&self) -> bool {
        matches!(self, Self::DeviceIo(_) | Self::NoDevice(_))
    }
}

/// Error types for hardware driver operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// Channel index does not exist on this driver.
    #[error("Unknown channel: {0}")]
    UnknownChannel(u8),

    /// Device on the channel is disconnected.
    #[error("Device disconnected on channel {0}")]
    Disconnected(u8),

    /// Hardware communication error.
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),
}

impl From<HalError> for MotionError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::UnknownChannel(_) | HalError::Disconnected(_) => {
                MotionError::NoDevice(err.to_string())
            }
            HalError::CommunicationError(_) => MotionError::DeviceIo(err.to_string()),
        }
    }
}
