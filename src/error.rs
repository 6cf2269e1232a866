use crate::config::ConfigError;
use crate::gpio::GpioError;
use crate::instance_lock::InstanceLockError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ShadeError {
    #[error("Unknown shade: {0}")]
    UnknownShade(String),

    #[error("Invalid command '{0}', expected auto, manual, manual/up or manual/down")]
    InvalidCommand(String),

    #[error("Invalid configuration: {}", join(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error("Controller is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ConfigError>> for ShadeError {
    fn from(errors: Vec<ConfigError>) -> Self {
        ShadeError::InvalidConfig(errors)
    }
}

pub type Result<T> = std::result::Result<T, ShadeError>;
