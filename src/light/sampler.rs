//! Pulse-count light sampling.
//!
//! The photoresistor and a capacitor form an RC circuit on a single GPIO pin.
//! A measurement discharges the capacitor by driving the pin low, switches
//! the pin to input and counts polls until the capacitor has charged far
//! enough to read `High`. The count depends on the resistance of the
//! photoresistor, so it tracks the ambient light.
//!
//! Whether a high count means "bright" or "dark" depends on the wiring and is
//! not interpreted here; the calibration factor and the thresholds are
//! configured for a given installation.

use crate::gpio::{GpioError, GpioPin, Level};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Time the pin is held low to discharge the capacitor.
pub const SETTLE_TIME: Duration = Duration::from_millis(100);

/// Upper bound on polls per measurement; exceeding it means a wiring fault.
pub const MAX_COUNT: u32 = 9_999_999;

/// Measurements averaged into one sample.
pub const DEFAULT_ATTEMPTS: usize = 10;

/// A single failed measurement.
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("count is getting too high ({0})")]
    CountTooHigh(u32),

    #[error("count is zero")]
    CountZero,

    #[error(transparent)]
    Gpio(#[from] GpioError),
}

/// A sampling cycle that produced no usable value.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("all {attempts} attempts failed: {}", join_errors(.errors))]
    AllAttemptsFailed {
        attempts: usize,
        errors: Vec<MeasureError>,
    },

    /// The calibrated average is zero. Could be darkness, could be a broken
    /// sensor; it is never fed to the decision engine as a reading.
    #[error("average is zero (raw average {raw_average})")]
    ZeroAverage {
        raw_average: u32,
        failures: Vec<MeasureError>,
    },
}

impl SampleError {
    /// Value reported alongside the error. Always zero.
    pub fn intensity(&self) -> u32 {
        0
    }
}

fn join_errors(errors: &[MeasureError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result of a successful sampling cycle.
#[derive(Debug)]
pub struct Sample {
    /// Calibrated intensity (raw average divided by the calibration factor).
    pub intensity: u32,
    /// Mean of the successful raw counts.
    pub raw_average: u32,
    /// Number of measurements attempted.
    pub attempts: usize,
    /// Measurements that failed and were left out of the average.
    pub failures: Vec<MeasureError>,
}

impl Sample {
    /// True if some, but not all, measurements failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Human readable summary of the failed attempts.
    pub fn failure_summary(&self) -> String {
        format!(
            "{}/{} attempts failed: {}",
            self.failures.len(),
            self.attempts,
            join_errors(&self.failures)
        )
    }
}

/// Reads calibrated light values from the sensor pin.
///
/// Every call blocks the current thread for up to
/// `attempts × (settle time + max_count polls)`; run it on a blocking thread.
#[derive(Debug, Clone)]
pub struct LightSampler {
    settle: Duration,
    max_count: u32,
    attempts: usize,
}

impl Default for LightSampler {
    fn default() -> Self {
        Self {
            settle: SETTLE_TIME,
            max_count: MAX_COUNT,
            attempts: DEFAULT_ATTEMPTS,
        }
    }
}

impl LightSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Take one raw pulse-count measurement.
    pub fn measure_once(&self, pin: &mut dyn GpioPin) -> Result<u32, MeasureError> {
        pin.set_output()?;
        pin.set_low()?;
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        pin.set_input()?;

        let mut count: u32 = 0;
        while pin.read_level()? == Level::Low {
            count += 1;
            if count > self.max_count {
                return Err(MeasureError::CountTooHigh(count));
            }
        }

        if count == 0 {
            return Err(MeasureError::CountZero);
        }
        Ok(count)
    }

    /// Average several measurements and apply the calibration factor.
    ///
    /// Failed measurements are collected in [`Sample::failures`] and left out
    /// of both the sum and the divisor.
    pub fn sample_averaged(
        &self,
        pin: &mut dyn GpioPin,
        calibration_factor: u32,
    ) -> Result<Sample, SampleError> {
        let mut counts = Vec::with_capacity(self.attempts);
        let mut failures = Vec::new();

        for _ in 0..self.attempts {
            match self.measure_once(pin) {
                Ok(count) => counts.push(count),
                Err(e) => failures.push(e),
            }
        }

        let raw_average = average_nonzero(&counts);
        if counts.is_empty() {
            return Err(SampleError::AllAttemptsFailed {
                attempts: self.attempts,
                errors: failures,
            });
        }

        let intensity = raw_average / calibration_factor.max(1);
        if intensity == 0 {
            return Err(SampleError::ZeroAverage {
                raw_average,
                failures,
            });
        }

        Ok(Sample {
            intensity,
            raw_average,
            attempts: self.attempts,
            failures,
        })
    }
}

/// Integer mean of the non-zero values; zero for an empty (or all-zero) slice.
pub fn average_nonzero(values: &[u32]) -> u32 {
    let (sum, n) = values
        .iter()
        .filter(|v| **v != 0)
        .fold((0u64, 0u64), |(sum, n), v| (sum + u64::from(*v), n + 1));
    if n == 0 { 0 } else { (sum / n) as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{PinOp, SimulatedPin};

    fn sampler() -> LightSampler {
        LightSampler::new().with_settle_time(Duration::ZERO)
    }

    #[test]
    fn test_measure_once_counts_low_polls() {
        let mut pin = SimulatedPin::with_pulses(23, vec![42]);
        assert_eq!(sampler().measure_once(&mut pin).unwrap(), 42);
        assert_eq!(
            pin.ops(),
            vec![PinOp::Output, PinOp::Low, PinOp::Input]
        );
    }

    #[test]
    fn test_measure_once_zero() {
        let mut pin = SimulatedPin::with_pulses(23, vec![0]);
        assert!(matches!(
            sampler().measure_once(&mut pin),
            Err(MeasureError::CountZero)
        ));
    }

    #[test]
    fn test_measure_once_capped() {
        let mut pin = SimulatedPin::with_pulses(23, vec![500]);
        let result = sampler().with_max_count(100).measure_once(&mut pin);
        assert!(matches!(result, Err(MeasureError::CountTooHigh(101))));
    }

    #[test]
    fn test_partial_failure_excludes_failed_attempts() {
        // 3 of 10 attempts fail; average over the 7 successes only
        let mut pin = SimulatedPin::with_pulses(
            23,
            vec![100, 0, 200, 0, 300, 0, 100, 200, 300, 100],
        );
        let sample = sampler().sample_averaged(&mut pin, 1).unwrap();

        assert!(sample.is_partial());
        assert_eq!(sample.failures.len(), 3);
        assert_eq!(sample.attempts, 10);
        assert_eq!(sample.raw_average, 1300 / 7);
        assert_eq!(sample.intensity, 1300 / 7);
        assert!(sample.failure_summary().starts_with("3/10 attempts failed"));
    }

    #[test]
    fn test_calibration_factor_divides_average() {
        let mut pin = SimulatedPin::with_pulses(23, vec![260]);
        let sample = sampler().sample_averaged(&mut pin, 26).unwrap();
        assert!(!sample.is_partial());
        assert_eq!(sample.raw_average, 260);
        assert_eq!(sample.intensity, 10);
    }

    #[test]
    fn test_all_attempts_failed() {
        let mut pin = SimulatedPin::with_pulses(23, vec![0]);
        let err = sampler().sample_averaged(&mut pin, 1).unwrap_err();

        assert_eq!(err.intensity(), 0);
        match err {
            SampleError::AllAttemptsFailed { attempts, errors } => {
                assert_eq!(attempts, 10);
                assert_eq!(errors.len(), 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_average_after_calibration() {
        let mut pin = SimulatedPin::with_pulses(23, vec![5]);
        let err = sampler().sample_averaged(&mut pin, 10).unwrap_err();
        assert!(matches!(err, SampleError::ZeroAverage { raw_average: 5, .. }));
    }

    #[test]
    fn test_average_nonzero() {
        assert_eq!(average_nonzero(&[]), 0);
        assert_eq!(average_nonzero(&[0, 0]), 0);
        assert_eq!(average_nonzero(&[10, 0, 20]), 15);
    }
}
