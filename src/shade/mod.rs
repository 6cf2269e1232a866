//! Shade state, decision engine and actuator.

pub mod actuator;
pub mod decision;

pub use actuator::{MoveEvent, MoveOutcome, Shade, ShadePins, ShadeStatus};
pub use decision::{Decision, Thresholds, Weather};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who is allowed to move the shade.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    /// The schedule coordinator decides from the light history.
    #[default]
    Auto,
    /// Only explicit commands move the shade.
    Manual,
}

/// Physical position of the shade.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Position {
    /// Not known yet (startup before the first move).
    #[default]
    Unknown,
    Up,
    Down,
    /// Transient while the motor runs; never a rest state.
    Moving,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_mode_and_position_strings() {
        assert_eq!(Mode::Auto.to_string(), "auto");
        assert_eq!(Mode::from_str("Manual").unwrap(), Mode::Manual);
        assert_eq!(Position::Down.to_string(), "down");
        assert_eq!(Position::from_str("up").unwrap(), Position::Up);
        assert!(Position::from_str("sideways").is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Position::Moving).unwrap(), "\"moving\"");
        assert_eq!(
            serde_json::from_str::<Mode>("\"manual\"").unwrap(),
            Mode::Manual
        );
    }
}
