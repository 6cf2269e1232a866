//! GPIO pin capability.
//!
//! The controller only needs a handful of operations on a pin: switch it
//! between input and output, drive it, and read its level. Everything else
//! (register access, chip selection, edge detection) stays behind the
//! [`GpioPin`] trait so the sampling and actuation code can run against real
//! hardware or against [`SimulatedPin`] in tests and dry runs.

pub mod simulated;
pub mod sysfs;

pub use simulated::{PinOp, SimulatedPin};
pub use sysfs::SysfsPin;

use std::io;
use thiserror::Error;

/// Lowest BCM pin number accepted in configuration.
pub const MIN_PIN: u8 = 1;

/// Highest BCM pin number accepted in configuration.
pub const MAX_PIN: u8 = 27;

/// Logic level read from an input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Errors raised by pin backends.
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("GPIO pin {0} is outside the supported range {MIN_PIN}..={MAX_PIN}")]
    InvalidPin(u8),

    #[error("GPIO pin {pin}: {source}")]
    Io {
        pin: u8,
        #[source]
        source: io::Error,
    },

    #[error("GPIO pin {pin}: unexpected value '{value}'")]
    UnexpectedValue { pin: u8, value: String },
}

/// Minimal pin capability used by the light sampler and the shade actuator.
///
/// Implementations are owned exclusively by one task at a time (the sampling
/// task for the light pin, the actuation procedure for the motor pins), so the
/// methods take `&mut self` and the trait only requires `Send`.
pub trait GpioPin: Send {
    /// BCM number of this pin.
    fn number(&self) -> u8;

    fn set_output(&mut self) -> Result<(), GpioError>;

    fn set_input(&mut self) -> Result<(), GpioError>;

    fn set_high(&mut self) -> Result<(), GpioError>;

    fn set_low(&mut self) -> Result<(), GpioError>;

    fn read_level(&mut self) -> Result<Level, GpioError>;

    /// Hand the pin back to the system. Called once on shutdown.
    fn release(&mut self) -> Result<(), GpioError> {
        Ok(())
    }
}

/// Check that a configured pin number is usable on the header.
pub fn validate_pin(pin: u8) -> Result<u8, GpioError> {
    if (MIN_PIN..=MAX_PIN).contains(&pin) {
        Ok(pin)
    } else {
        Err(GpioError::InvalidPin(pin))
    }
}
