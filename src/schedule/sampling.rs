//! Light sampling loop.
//!
//! Samples the light pin once per sampling interval while the sensor window
//! is open. The sensor window is derived from the windows of the shades that
//! are in auto mode; with no shade in auto mode, or outside the window, the
//! history is cleared and no samples are taken.
//!
//! A coordinator moves its shade's window to the next day as soon as stop
//! passes, so the loop holds on to the sensor window it is sampling in until
//! that window's own stop, which lies a buffer after the shade stop.

use super::{Clock, OperatingWindow, sensor_window, sleep_or_cancel};
use crate::gpio::GpioPin;
use crate::light::{LightSampler, LightSensor};
use crate::shade::{Mode, Shade};
use crate::storage::HistoryLog;
use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SamplingLoop {
    sensor: Arc<LightSensor>,
    sampler: LightSampler,
    pin: Option<Box<dyn GpioPin>>,
    shades: Vec<Arc<Shade>>,
    clock: Arc<dyn Clock>,
    log: Option<Arc<HistoryLog>>,
    /// Sensor window in effect, kept until its stop even if the shade
    /// windows have moved on
    held: Option<OperatingWindow>,
}

impl SamplingLoop {
    pub fn new(
        sensor: Arc<LightSensor>,
        sampler: LightSampler,
        pin: Box<dyn GpioPin>,
        shades: Vec<Arc<Shade>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sensor,
            sampler,
            pin: Some(pin),
            shades,
            clock,
            log: None,
            held: None,
        }
    }

    /// Append every recorded sample to `log`.
    pub fn with_history_log(mut self, log: Arc<HistoryLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Current sensor window, or `None` when no shade is in auto mode.
    pub fn window(&self) -> Option<OperatingWindow> {
        let windows: Vec<OperatingWindow> = self
            .shades
            .iter()
            .filter(|shade| shade.mode() == Mode::Auto)
            .filter_map(|shade| shade.window())
            .collect();
        sensor_window(&windows, self.sensor.settings().warmup())
    }

    /// Whether samples are taken at `now`.
    fn is_open(&mut self, now: NaiveDateTime) -> bool {
        let Some(current) = self.window() else {
            self.held = None;
            return false;
        };
        if current.contains(now) {
            self.held = Some(current);
            return true;
        }
        if self.held.is_some_and(|held| held.contains(now)) {
            return true;
        }
        self.held = None;
        false
    }

    /// Run until `token` is cancelled, then release the pin.
    pub async fn run(mut self, token: CancellationToken) {
        info!("[Light] Sampling loop started");
        let mut sampling = false;
        loop {
            let now = self.clock.now();
            let open = self.is_open(now);
            if open != sampling {
                info!(
                    "[Light] Sensor window {}",
                    if open { "opened" } else { "closed" }
                );
                sampling = open;
            }

            if open {
                if !self.sample_once().await {
                    break;
                }
            } else {
                self.sensor.reset_history();
            }

            let interval = self.sensor.settings().sampling_interval();
            if !sleep_or_cancel(&token, interval).await {
                break;
            }
        }

        if let Some(mut pin) = self.pin.take()
            && let Err(e) = pin.release()
        {
            warn!("[Light] Failed to release pin {}: {}", pin.number(), e);
        }
        info!("[Light] Sampling loop stopped");
    }

    /// Take one averaged sample on a blocking thread. Returns false if the
    /// pin was lost.
    async fn sample_once(&mut self) -> bool {
        let Some(mut pin) = self.pin.take() else {
            return false;
        };
        let sampler = self.sampler.clone();
        let factor = self.sensor.settings().calibration_factor;

        let joined = tokio::task::spawn_blocking(move || {
            let result = sampler.sample_averaged(pin.as_mut(), factor);
            (pin, result)
        })
        .await;

        let (pin, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                error!("[Light] Sampling task failed: {}", e);
                return false;
            }
        };
        self.pin = Some(pin);

        match result {
            Ok(sample) => {
                if sample.is_partial() {
                    warn!("[Light] {}", sample.failure_summary());
                }
                debug!(
                    "[Light] Sample {} (raw average {})",
                    sample.intensity, sample.raw_average
                );
                self.sensor.record(sample.intensity);
                if let Some(log) = &self.log
                    && let Err(e) = log.append_light(self.clock.now(), sample.intensity)
                {
                    warn!("[Light] Failed to write light log: {}", e);
                }
            }
            Err(e) => {
                warn!("[Light] No sample recorded ({}): {}", e.intensity(), e);
            }
        }
        true
    }
}
