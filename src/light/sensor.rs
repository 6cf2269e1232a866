//! Shared light-sensor state.
//!
//! One [`LightSensor`] is shared by the sampling task (writer) and every
//! shade's coordinator (readers). Settings and history live behind a single
//! lock so a sample push and an evaluation never interleave.

use super::LightHistory;
use crate::config::{ConfigError, LightSettings};
use crate::shade::decision::{self, Decision};
use crate::shade::Position;
use log::{debug, info};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Result of asking the sensor to evaluate a shade position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// History is shorter than the required sample count.
    NotEnoughData { have: usize, need: usize },
    Decided(Decision),
}

struct SensorState {
    settings: LightSettings,
    history: LightHistory,
}

pub struct LightSensor {
    state: Mutex<SensorState>,
    sampled: Notify,
}

impl LightSensor {
    /// Create the sensor state; rejects invalid settings.
    pub fn new(settings: LightSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            state: Mutex::new(SensorState {
                settings,
                history: LightHistory::new(),
            }),
            sampled: Notify::new(),
        })
    }

    pub fn settings(&self) -> LightSettings {
        self.state.lock().settings.clone()
    }

    /// Replace the settings. Invalid settings are rejected and the previous
    /// ones stay in effect.
    pub fn update_settings(&self, settings: LightSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        let mut state = self.state.lock();
        let capacity = settings.capacity();
        state.history.shrink_to(capacity);
        state.settings = settings;
        info!("[Light] Settings updated, history capacity {}", capacity);
        Ok(())
    }

    /// Prepend a calibrated sample and wake anyone waiting for one.
    pub fn record(&self, intensity: u32) {
        {
            let mut state = self.state.lock();
            let capacity = state.settings.capacity();
            state.history.push(intensity, capacity);
            debug!(
                "[Light] Recorded {} ({}/{} samples)",
                intensity,
                state.history.len(),
                capacity
            );
        }
        self.sampled.notify_waiters();
    }

    pub fn reset_history(&self) {
        let mut state = self.state.lock();
        if !state.history.is_empty() {
            debug!("[Light] History cleared ({} samples)", state.history.len());
            state.history.reset();
        }
    }

    /// Snapshot of the current history.
    pub fn history(&self) -> LightHistory {
        self.state.lock().history.clone()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().settings.capacity()
    }

    /// Evaluate `position` against the current history.
    ///
    /// The history is checked for sufficiency under the same lock that guards
    /// the evaluation, so a concurrent settings change cannot shrink it in
    /// between.
    pub fn evaluate(&self, position: Position) -> Evaluation {
        let state = self.state.lock();
        let thresholds = state.settings.thresholds();
        let need = thresholds.required_samples();
        if !state.history.sufficient_for(need) {
            return Evaluation::NotEnoughData {
                have: state.history.len(),
                need,
            };
        }
        Evaluation::Decided(decision::evaluate(
            position,
            state.history.as_slice(),
            &thresholds,
        ))
    }

    /// Resolves on the next `record` call.
    pub fn sample_recorded(&self) -> Notified<'_> {
        self.sampled.notified()
    }
}
