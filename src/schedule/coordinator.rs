//! Per-shade schedule coordinator.
//!
//! Runs while the shade is in auto mode. Each iteration looks at where the
//! clock stands relative to the shade's operating window:
//!
//! | Phase         | Condition                                  | Action                          |
//! |---------------|--------------------------------------------|---------------------------------|
//! | `PreStopHold` | within the pre-stop limit, shade up        | wait until stop                 |
//! | `AfterStop`   | at or after stop                           | up, roll window to the next day |
//! | `BeforeStart` | before start                               | up, wait until start            |
//! | `Active`      | inside the window                          | evaluate the light history      |
//!
//! After `BeforeStart` and `Active` it waits one sampling interval, or less
//! when a new light sample arrives.

use super::{Clock, OperatingWindow, sleep_or_cancel, sleep_until};
use crate::config::LocationConfig;
use crate::light::{Evaluation, LightSensor};
use crate::shade::{Decision, MoveOutcome, Position, Shade};
use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreStopHold,
    AfterStop,
    BeforeStart,
    Active,
}

impl Phase {
    /// Classify `now` against `window`.
    pub fn of(
        window: &OperatingWindow,
        now: NaiveDateTime,
        pre_stop_limit: TimeDelta,
        position: Position,
    ) -> Self {
        if position == Position::Up && now >= window.stop - pre_stop_limit && now < window.stop {
            Phase::PreStopHold
        } else if now >= window.stop {
            Phase::AfterStop
        } else if now < window.start {
            Phase::BeforeStart
        } else {
            Phase::Active
        }
    }
}

/// What the loop does after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Re-evaluate immediately.
    Again,
    /// Wait one sampling interval first.
    Wait,
    Stop,
}

pub struct ScheduleCoordinator {
    shade: Arc<Shade>,
    sensor: Arc<LightSensor>,
    location: LocationConfig,
    clock: Arc<dyn Clock>,
}

impl ScheduleCoordinator {
    pub fn new(
        shade: Arc<Shade>,
        sensor: Arc<LightSensor>,
        location: LocationConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shade,
            sensor,
            location,
            clock,
        }
    }

    /// Run until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        info!("[Schedule] {}: auto mode started", self.shade.name());
        loop {
            match self.step(&token).await {
                Next::Again => continue,
                Next::Wait => {
                    if !self.wait_interval(&token).await {
                        break;
                    }
                }
                Next::Stop => break,
            }
        }
        info!("[Schedule] {}: auto mode stopped", self.shade.name());
    }

    /// The window in effect, computing today's if the shade has none yet.
    pub fn current_window(&self) -> OperatingWindow {
        if let Some(window) = self.shade.window() {
            return window;
        }
        let now = self.clock.now();
        let schedule = &self.shade.settings().schedule;
        let window = OperatingWindow::compute(schedule, &self.location, now.date())
            .unwrap_or_else(|e| {
                warn!(
                    "[Schedule] {}: {}, using fixed times for today",
                    self.shade.name(),
                    e
                );
                OperatingWindow {
                    start: now.date().and_time(schedule.start),
                    stop: now.date().and_time(schedule.stop),
                }
            });
        info!("[Schedule] {}: operating window {}", self.shade.name(), window);
        self.shade.set_window(window);
        window
    }

    async fn step(&self, token: &CancellationToken) -> Next {
        if token.is_cancelled() {
            return Next::Stop;
        }
        let window = self.current_window();
        let now = self.clock.now();
        let pre_stop_limit = self.shade.settings().schedule.pre_stop_limit();

        match Phase::of(&window, now, pre_stop_limit, self.shade.position()) {
            Phase::PreStopHold => {
                info!(
                    "[Schedule] {}: shade is up and stop at {} is within {} min, holding",
                    self.shade.name(),
                    window.stop.format("%H:%M"),
                    pre_stop_limit.num_minutes()
                );
                if sleep_until(self.clock.as_ref(), token, window.stop).await {
                    Next::Again
                } else {
                    Next::Stop
                }
            }
            Phase::AfterStop => {
                self.force_up().await;
                self.advance_window(&window, now);
                Next::Again
            }
            Phase::BeforeStart => {
                self.force_up().await;
                info!(
                    "[Schedule] {}: waiting until {}",
                    self.shade.name(),
                    window.start.format("%d %b %H:%M")
                );
                if sleep_until(self.clock.as_ref(), token, window.start).await {
                    Next::Wait
                } else {
                    Next::Stop
                }
            }
            Phase::Active => {
                if self.shade.position() == Position::Unknown {
                    // Decisions need a known starting position
                    self.force_up().await;
                }
                self.evaluate().await;
                Next::Wait
            }
        }
    }

    async fn evaluate(&self) {
        // The sensor lock is released before the shade moves
        match self.sensor.evaluate(self.shade.position()) {
            Evaluation::NotEnoughData { have, need } => {
                debug!(
                    "[Schedule] {}: not enough light data gathered ({}/{})",
                    self.shade.name(),
                    have,
                    need
                );
            }
            Evaluation::Decided(Decision::Hold) => {}
            Evaluation::Decided(Decision::Move { target, weather }) => {
                info!(
                    "[Schedule] {}: {} weather, moving {}",
                    self.shade.name(),
                    weather,
                    target
                );
                if let Err(e) = self.shade.move_to(target).await {
                    error!("[Schedule] {}: {}", self.shade.name(), e);
                }
            }
        }
    }

    async fn force_up(&self) {
        match self.shade.up().await {
            Ok(MoveOutcome::AlreadyMoving) => {
                // A manual move is running; wait for it and retry once
                self.shade.wait_idle().await;
                if let Err(e) = self.shade.up().await {
                    error!("[Schedule] {}: {}", self.shade.name(), e);
                }
            }
            Ok(_) => {}
            Err(e) => error!("[Schedule] {}: {}", self.shade.name(), e),
        }
    }

    /// Move the window to the next day. On a sun-time error, or when the
    /// computed window has already ended, the previous window is shifted by
    /// whole days instead.
    fn advance_window(&self, previous: &OperatingWindow, now: NaiveDateTime) {
        let schedule = &self.shade.settings().schedule;
        let next = match OperatingWindow::next_after(schedule, &self.location, now) {
            Ok(window) if window.stop > now => window,
            Ok(window) => {
                warn!(
                    "[Schedule] {}: window {} already ended, keeping previous times",
                    self.shade.name(),
                    window
                );
                previous.rolled_past(now)
            }
            Err(e) => {
                warn!(
                    "[Schedule] {}: {}, keeping previous window times",
                    self.shade.name(),
                    e
                );
                previous.rolled_past(now)
            }
        };
        info!("[Schedule] {}: next operating window {}", self.shade.name(), next);
        self.shade.set_window(next);
    }

    /// Wait one sampling interval or until a new sample arrives.
    async fn wait_interval(&self, token: &CancellationToken) -> bool {
        let interval = self.sensor.settings().sampling_interval();
        tokio::select! {
            _ = self.sensor.sample_recorded() => !token.is_cancelled(),
            still_running = sleep_or_cancel(token, interval) => still_running,
        }
    }
}
