//! Simulated GPIO pins for tests and dry runs.
//!
//! A [`SimulatedPin`] records every operation it receives and, when used as
//! the light-sensor pin, emulates the RC charge curve of the photoresistor:
//! after each switch to input mode it reads `Low` for a scripted number of
//! polls and `High` afterwards.
//!
//! Clones share their state, so a test can keep one handle to inspect the
//! operation log while the other is owned by the code under test.

use super::{GpioError, GpioPin, Level};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

/// One recorded pin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOp {
    Output,
    Input,
    High,
    Low,
    Release,
}

/// Where the number of `Low` polls per measurement comes from.
enum PulseSource {
    /// Pin never goes low: every measurement counts zero.
    None,
    /// Fixed script, cycled when exhausted.
    Script { counts: Vec<u32>, next: usize },
    /// Random counts around a base value.
    Noisy { base: u32, spread: u32 },
}

impl PulseSource {
    fn next_count(&mut self) -> u32 {
        match self {
            PulseSource::None => 0,
            PulseSource::Script { counts, next } => {
                if counts.is_empty() {
                    return 0;
                }
                let count = counts[*next % counts.len()];
                *next += 1;
                count
            }
            PulseSource::Noisy { base, spread } => {
                let low = base.saturating_sub(*spread);
                let high = base.saturating_add(*spread);
                rand::thread_rng().gen_range(low..=high)
            }
        }
    }
}

struct SimState {
    ops: Vec<PinOp>,
    level: Level,
    pulses: PulseSource,
    remaining_low: u32,
}

/// In-memory pin with an operation log.
#[derive(Clone)]
pub struct SimulatedPin {
    number: u8,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPin {
    /// A plain output pin (motor relay) with no pulse source.
    pub fn new(number: u8) -> Self {
        Self::with_source(number, PulseSource::None)
    }

    /// A light-sensor pin that replays `counts`, one per measurement.
    ///
    /// A count of zero makes the pin read `High` immediately, which the
    /// sampler reports as a failed attempt.
    pub fn with_pulses(number: u8, counts: Vec<u32>) -> Self {
        Self::with_source(number, PulseSource::Script { counts, next: 0 })
    }

    /// A light-sensor pin producing random counts in `base ± spread`.
    pub fn noisy(number: u8, base: u32, spread: u32) -> Self {
        Self::with_source(number, PulseSource::Noisy { base, spread })
    }

    fn with_source(number: u8, pulses: PulseSource) -> Self {
        Self {
            number,
            state: Arc::new(Mutex::new(SimState {
                ops: Vec::new(),
                level: Level::High,
                pulses,
                remaining_low: 0,
            })),
        }
    }

    /// All operations received so far.
    pub fn ops(&self) -> Vec<PinOp> {
        self.state.lock().ops.clone()
    }

    /// Number of level changes (`High`/`Low`) driven on this pin.
    pub fn toggles(&self) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, PinOp::High | PinOp::Low))
            .count()
    }

    /// Current output level.
    pub fn level(&self) -> Level {
        self.state.lock().level
    }

    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }
}

impl GpioPin for SimulatedPin {
    fn number(&self) -> u8 {
        self.number
    }

    fn set_output(&mut self) -> Result<(), GpioError> {
        self.state.lock().ops.push(PinOp::Output);
        Ok(())
    }

    fn set_input(&mut self) -> Result<(), GpioError> {
        let mut state = self.state.lock();
        state.ops.push(PinOp::Input);
        state.remaining_low = state.pulses.next_count();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        let mut state = self.state.lock();
        state.ops.push(PinOp::High);
        state.level = Level::High;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), GpioError> {
        let mut state = self.state.lock();
        state.ops.push(PinOp::Low);
        state.level = Level::Low;
        Ok(())
    }

    fn read_level(&mut self) -> Result<Level, GpioError> {
        let mut state = self.state.lock();
        if state.remaining_low > 0 {
            state.remaining_low -= 1;
            Ok(Level::Low)
        } else {
            Ok(Level::High)
        }
    }

    fn release(&mut self) -> Result<(), GpioError> {
        self.state.lock().ops.push(PinOp::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_operations() {
        let pin = SimulatedPin::new(20);
        let mut owned = pin.clone();

        owned.set_output().unwrap();
        owned.set_high().unwrap();
        owned.set_low().unwrap();

        assert_eq!(pin.ops(), vec![PinOp::Output, PinOp::High, PinOp::Low]);
        assert_eq!(pin.toggles(), 2);
        assert_eq!(pin.level(), Level::Low);
    }

    #[test]
    fn test_scripted_pulses() {
        let mut pin = SimulatedPin::with_pulses(23, vec![2, 0]);

        pin.set_input().unwrap();
        assert_eq!(pin.read_level().unwrap(), Level::Low);
        assert_eq!(pin.read_level().unwrap(), Level::Low);
        assert_eq!(pin.read_level().unwrap(), Level::High);

        // Zero count reads high straight away
        pin.set_input().unwrap();
        assert_eq!(pin.read_level().unwrap(), Level::High);

        // Script cycles
        pin.set_input().unwrap();
        assert_eq!(pin.read_level().unwrap(), Level::Low);
    }

    #[test]
    fn test_noisy_stays_in_range() {
        let mut pin = SimulatedPin::noisy(23, 100, 10);
        for _ in 0..20 {
            pin.set_input().unwrap();
            let mut count = 0;
            while pin.read_level().unwrap() == Level::Low {
                count += 1;
            }
            assert!((90..=110).contains(&count));
        }
    }
}
