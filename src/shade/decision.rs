//! Hysteresis decision engine.
//!
//! The engine never touches hardware. It looks at the current position and
//! the most-recent-first light history and returns what the shade should do;
//! the caller performs at most one move per evaluation.

use super::Position;
use strum::Display;

/// Light cut-points and the sample counts required to act on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub good: u32,
    pub neutral: u32,
    pub bad: u32,
    pub times_good: usize,
    pub times_neutral: usize,
    pub times_bad: usize,
    pub outliers: usize,
}

impl Thresholds {
    /// History length needed before [`evaluate`] may be called.
    pub fn required_samples(&self) -> usize {
        self.times_good.max(self.times_neutral).max(self.times_bad) + self.outliers
    }
}

/// Weather class that triggered a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Weather {
    Good,
    Neutral,
    Bad,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    Move { target: Position, weather: Weather },
}

/// Count how many of the first `times + outliers` samples satisfy `hit`.
fn count_recent(
    history: &[u32],
    times: usize,
    outliers: usize,
    hit: impl Fn(u32) -> bool,
) -> usize {
    history[..times + outliers]
        .iter()
        .filter(|&&value| hit(value))
        .count()
}

/// Decide whether the shade should move.
///
/// Up: down once `times_good` of the last `times_good + outliers` samples are
/// at or below `good`. Down: up on bad weather first, then on neutral
/// weather. Any other position holds.
///
/// # Panics
///
/// Panics if `history` is shorter than [`Thresholds::required_samples`].
/// Callers check `LightHistory::sufficient_for` first.
pub fn evaluate(position: Position, history: &[u32], t: &Thresholds) -> Decision {
    assert!(
        history.len() >= t.required_samples(),
        "evaluate called with {} samples, {} required",
        history.len(),
        t.required_samples()
    );

    match position {
        Position::Up => {
            if count_recent(history, t.times_good, t.outliers, |v| v <= t.good) >= t.times_good {
                return Decision::Move {
                    target: Position::Down,
                    weather: Weather::Good,
                };
            }
        }
        Position::Down => {
            if count_recent(history, t.times_bad, t.outliers, |v| v >= t.bad) >= t.times_bad {
                return Decision::Move {
                    target: Position::Up,
                    weather: Weather::Bad,
                };
            }
            if count_recent(history, t.times_neutral, t.outliers, |v| v >= t.neutral)
                >= t.times_neutral
            {
                return Decision::Move {
                    target: Position::Up,
                    weather: Weather::Neutral,
                };
            }
        }
        Position::Unknown | Position::Moving => {}
    }
    Decision::Hold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(
        times_good: usize,
        times_neutral: usize,
        times_bad: usize,
        outliers: usize,
    ) -> Thresholds {
        Thresholds {
            good: 9,
            neutral: 11,
            bad: 20,
            times_good,
            times_neutral,
            times_bad,
            outliers,
        }
    }

    #[test]
    fn test_required_samples() {
        assert_eq!(thresholds(15, 20, 5, 2).required_samples(), 22);
        assert_eq!(thresholds(3, 1, 1, 1).required_samples(), 4);
    }

    #[test]
    fn test_up_with_good_weather_moves_down() {
        let t = thresholds(3, 1, 1, 1);
        assert_eq!(
            evaluate(Position::Up, &[5, 6, 7, 20], &t),
            Decision::Move {
                target: Position::Down,
                weather: Weather::Good
            }
        );
    }

    #[test]
    fn test_up_with_too_few_good_samples_holds() {
        let t = thresholds(3, 1, 1, 1);
        assert_eq!(evaluate(Position::Up, &[5, 6, 15, 20], &t), Decision::Hold);
    }

    #[test]
    fn test_up_only_scans_window() {
        // Good samples beyond times_good + outliers do not count
        let t = thresholds(2, 1, 1, 0);
        let history = [15, 5, 5, 5];
        assert_eq!(evaluate(Position::Up, &history, &t), Decision::Hold);
    }

    #[test]
    fn test_good_threshold_is_inclusive() {
        let t = thresholds(2, 1, 1, 0);
        assert!(matches!(
            evaluate(Position::Up, &[9, 9], &t),
            Decision::Move { .. }
        ));
    }

    #[test]
    fn test_down_bad_wins_over_neutral() {
        // Both bad (>= 20) and neutral (>= 11) would trigger
        let t = thresholds(1, 2, 2, 0);
        assert_eq!(
            evaluate(Position::Down, &[25, 30], &t),
            Decision::Move {
                target: Position::Up,
                weather: Weather::Bad
            }
        );
    }

    #[test]
    fn test_down_neutral_moves_up() {
        let t = thresholds(1, 2, 2, 1);
        assert_eq!(
            evaluate(Position::Down, &[12, 5, 13], &t),
            Decision::Move {
                target: Position::Up,
                weather: Weather::Neutral
            }
        );
    }

    #[test]
    fn test_down_with_good_weather_holds() {
        let t = thresholds(1, 2, 2, 1);
        assert_eq!(evaluate(Position::Down, &[5, 6, 7], &t), Decision::Hold);
    }

    #[test]
    fn test_unknown_and_moving_hold() {
        let t = thresholds(1, 1, 1, 0);
        assert_eq!(evaluate(Position::Unknown, &[1], &t), Decision::Hold);
        assert_eq!(evaluate(Position::Moving, &[50], &t), Decision::Hold);
    }

    #[test]
    #[should_panic(expected = "evaluate called with 3 samples, 4 required")]
    fn test_insufficient_history_panics() {
        let t = thresholds(3, 1, 1, 1);
        evaluate(Position::Up, &[5, 6, 7], &t);
    }
}
