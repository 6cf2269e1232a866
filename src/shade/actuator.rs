//! Shade actuator.
//!
//! A shade has two motor pins, active low: holding the up pin low runs the
//! motor up, holding the down pin low runs it down. A move holds one pin low
//! for the configured duration and then releases it.
//!
//! The motor pins sit behind an async mutex that is held for the whole move,
//! so moves of one shade never overlap. A move requested while another is in
//! progress is rejected rather than queued.

use super::{Mode, Position};
use crate::config::ShadeSettings;
use crate::gpio::{GpioError, GpioPin};
use crate::schedule::{Clock, OperatingWindow};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

const MOTOR_POLL: Duration = Duration::from_secs(1);

/// The two motor pins of one shade.
pub struct ShadePins {
    up: Box<dyn GpioPin>,
    down: Box<dyn GpioPin>,
}

impl ShadePins {
    pub fn new(up: Box<dyn GpioPin>, down: Box<dyn GpioPin>) -> Self {
        Self { up, down }
    }

    /// Configure both pins as outputs and drive them high (motor off).
    pub fn init(&mut self) -> Result<(), GpioError> {
        for pin in [&mut self.up, &mut self.down] {
            pin.set_output()?;
            pin.set_high()?;
        }
        Ok(())
    }

    fn release(&mut self) {
        for pin in [&mut self.up, &mut self.down] {
            if let Err(e) = pin.release() {
                warn!("[Shade] Failed to release pin {}: {}", pin.number(), e);
            }
        }
    }
}

/// A completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveEvent {
    pub shade: String,
    pub at: NaiveDateTime,
    pub mode: Mode,
    pub from: Position,
    pub to: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(Position),
    /// Another move is in progress; nothing was done.
    AlreadyMoving,
    /// The shade already is at the requested position.
    AlreadyThere,
}

/// Runtime state of a shade, as persisted and reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadeStatus {
    pub name: String,
    pub mode: Mode,
    pub position: Position,
    pub window: Option<OperatingWindow>,
}

#[derive(Debug, Default)]
struct ShadeState {
    mode: Mode,
    position: Position,
    window: Option<OperatingWindow>,
}

pub struct Shade {
    settings: ShadeSettings,
    state: RwLock<ShadeState>,
    pins: Mutex<ShadePins>,
    events: broadcast::Sender<MoveEvent>,
    clock: Arc<dyn Clock>,
}

impl Shade {
    /// Create a shade in `Auto` mode with an unknown position.
    ///
    /// The pins are expected to be initialized already (see
    /// [`ShadePins::init`]).
    pub fn new(settings: ShadeSettings, pins: ShadePins, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            settings,
            state: RwLock::new(ShadeState::default()),
            pins: Mutex::new(pins),
            events,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ShadeSettings {
        &self.settings
    }

    pub fn mode(&self) -> Mode {
        self.state.read().mode
    }

    /// Set the mode and return the previous one.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.state.write().mode, mode)
    }

    pub fn position(&self) -> Position {
        self.state.read().position
    }

    pub fn window(&self) -> Option<OperatingWindow> {
        self.state.read().window
    }

    pub fn set_window(&self, window: OperatingWindow) {
        self.state.write().window = Some(window);
    }

    pub fn status(&self) -> ShadeStatus {
        let state = self.state.read();
        ShadeStatus {
            name: self.settings.name.clone(),
            mode: state.mode,
            position: state.position,
            window: state.window,
        }
    }

    /// Apply a persisted status. A shade that was moving when the process
    /// stopped is in an unknown position.
    pub fn restore(&self, status: &ShadeStatus) {
        let mut state = self.state.write();
        state.mode = status.mode;
        state.position = match status.position {
            Position::Moving => Position::Unknown,
            other => other,
        };
        state.window = status.window;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MoveEvent> {
        self.events.subscribe()
    }

    /// Toggle the shade: down if it is up, up from any other position.
    pub async fn move_shade(&self) -> Result<MoveOutcome, GpioError> {
        let target = match self.position() {
            Position::Up => Position::Down,
            _ => Position::Up,
        };
        self.move_to(target).await
    }

    /// Move up unless already up.
    pub async fn up(&self) -> Result<MoveOutcome, GpioError> {
        self.move_to(Position::Up).await
    }

    /// Move down unless already down.
    pub async fn down(&self) -> Result<MoveOutcome, GpioError> {
        self.move_to(Position::Down).await
    }

    /// Move to `target` (`Up` or `Down`).
    pub async fn move_to(&self, target: Position) -> Result<MoveOutcome, GpioError> {
        let Ok(mut pins) = self.pins.try_lock() else {
            info!("[Shade] {} is moving already, ignoring move to {}", self.name(), target);
            return Ok(MoveOutcome::AlreadyMoving);
        };
        self.drive(&mut pins, target).await
    }

    /// Wait for an in-progress move to finish.
    pub async fn wait_idle(&self) {
        drop(self.pins.lock().await);
    }

    /// Wait for any move in progress, bring the shade up and release the
    /// motor pins.
    pub async fn shutdown(&self) -> Result<(), GpioError> {
        let mut pins = self.pins.lock().await;
        let result = self.drive(&mut pins, Position::Up).await.map(|_| ());
        pins.release();
        result
    }

    async fn drive(
        &self,
        pins: &mut ShadePins,
        target: Position,
    ) -> Result<MoveOutcome, GpioError> {
        let (pin, duration) = match target {
            Position::Up => (pins.up.as_mut(), self.settings.move_up_duration()),
            Position::Down => (pins.down.as_mut(), self.settings.move_down_duration()),
            Position::Unknown | Position::Moving => {
                warn!("[Shade] {}: cannot move to {}", self.name(), target);
                return Ok(MoveOutcome::AlreadyThere);
            }
        };

        let (from, mode) = {
            let mut state = self.state.write();
            match state.position {
                Position::Moving => return Ok(MoveOutcome::AlreadyMoving),
                p if p == target => return Ok(MoveOutcome::AlreadyThere),
                _ => {}
            }
            let from = state.position;
            state.position = Position::Moving;
            (from, state.mode)
        };

        info!("[Shade] Moving {} from {} to {}", self.name(), from, target);
        if let Err(e) = run_motor(pin, duration).await {
            error!("[Shade] {}: move to {} failed: {}", self.name(), target, e);
            self.state.write().position = Position::Unknown;
            return Err(e);
        }
        self.state.write().position = target;

        // No subscribers is fine
        let _ = self.events.send(MoveEvent {
            shade: self.name().to_string(),
            at: self.clock.now(),
            mode,
            from,
            to: target,
        });
        Ok(MoveOutcome::Moved(target))
    }
}

/// Hold `pin` low for `duration`, rounded up to whole seconds.
async fn run_motor(pin: &mut dyn GpioPin, duration: Duration) -> Result<(), GpioError> {
    pin.set_low()?;
    let ticks = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    for _ in 0..ticks {
        tokio::time::sleep(MOTOR_POLL).await;
    }
    pin.set_high()
}
