//! The controller owns every shade, the shared light sensor and the
//! background tasks that drive them.
//!
//! Tasks:
//! - one sampling loop for the light sensor
//! - one schedule coordinator per shade in auto mode
//! - one recorder per shade that logs, notifies and persists completed moves
//! - manual moves requested through [`Controller::command`]

use crate::config::{Config, LocationConfig, StorageConfig};
use crate::error::{Result, ShadeError};
use crate::gpio::{GpioError, GpioPin, SimulatedPin, SysfsPin};
use crate::light::{LightSampler, LightSensor};
use crate::notify::Notifier;
use crate::schedule::{Clock, SamplingLoop, ScheduleCoordinator};
use crate::shade::{Mode, MoveEvent, MoveOutcome, Position, Shade, ShadePins, ShadeStatus};
use crate::storage::{HistoryLog, StateStore};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Mode command for one shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Command {
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "manual")]
    Manual,
    #[strum(serialize = "manual/up")]
    ManualUp,
    #[strum(serialize = "manual/down")]
    ManualDown,
}

impl Command {
    /// Parse a command payload, ignoring surrounding whitespace.
    pub fn parse(payload: &str) -> Result<Self> {
        let payload = payload.trim();
        Self::from_str(payload).map_err(|_| ShadeError::InvalidCommand(payload.to_string()))
    }
}

/// Opened GPIO pins for the configured devices.
pub struct Hardware {
    pub light_pin: Box<dyn GpioPin>,
    /// One entry per configured shade, in configuration order.
    pub shade_pins: Vec<ShadePins>,
}

impl Hardware {
    /// Open the pins through sysfs. Motor pins are set to output and driven
    /// high.
    pub fn open(config: &Config) -> std::result::Result<Self, GpioError> {
        let light_pin = Box::new(SysfsPin::open(config.light.pin)?);
        let mut shade_pins = Vec::with_capacity(config.shades.len());
        for shade in &config.shades {
            let mut pins = ShadePins::new(
                Box::new(SysfsPin::open(shade.pin_up)?),
                Box::new(SysfsPin::open(shade.pin_down)?),
            );
            pins.init()?;
            shade_pins.push(pins);
        }
        Ok(Self {
            light_pin,
            shade_pins,
        })
    }

    /// Simulated pins with a noisy light source.
    pub fn simulated(config: &Config) -> std::result::Result<Self, GpioError> {
        let sim = &config.simulation;
        let light_pin = Box::new(SimulatedPin::noisy(
            config.light.pin,
            sim.light_base,
            sim.light_spread,
        ));
        let mut shade_pins = Vec::with_capacity(config.shades.len());
        for shade in &config.shades {
            let mut pins = ShadePins::new(
                Box::new(SimulatedPin::new(shade.pin_up)),
                Box::new(SimulatedPin::new(shade.pin_down)),
            );
            pins.init()?;
            shade_pins.push(pins);
        }
        Ok(Self {
            light_pin,
            shade_pins,
        })
    }
}

pub struct Controller {
    location: LocationConfig,
    sensor: Arc<LightSensor>,
    shades: Vec<Arc<Shade>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    sampler: LightSampler,
    light_pin: Mutex<Option<Box<dyn GpioPin>>>,
    store: Option<StateStore>,
    history_log: Option<Arc<HistoryLog>>,
    /// Cancels coordinators, sampling and manual moves
    work: CancellationToken,
    tasks: TaskTracker,
    /// Cancels the move recorders, after the shades are up
    recording: CancellationToken,
    recorders: TaskTracker,
    autos: Mutex<HashMap<String, CancellationToken>>,
}

impl Controller {
    pub fn new(
        config: &Config,
        hardware: Hardware,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let sensor = Arc::new(LightSensor::new(config.light.clone())?);

        let shades = config
            .shades
            .iter()
            .cloned()
            .zip(hardware.shade_pins)
            .map(|(settings, pins)| Arc::new(Shade::new(settings, pins, clock.clone())))
            .collect();

        Ok(Self {
            location: config.location.clone(),
            sensor,
            shades,
            clock,
            notifier,
            sampler: LightSampler::new(),
            light_pin: Mutex::new(Some(hardware.light_pin)),
            store: None,
            history_log: None,
            work: CancellationToken::new(),
            tasks: TaskTracker::new(),
            recording: CancellationToken::new(),
            recorders: TaskTracker::new(),
            autos: Mutex::new(HashMap::new()),
        })
    }

    /// Persist state and history under `storage`, restoring any saved state.
    pub fn with_storage(mut self, storage: &StorageConfig) -> Self {
        let store = StateStore::new(storage.state_file());
        for shade in &self.shades {
            if let Some(status) = store.status(shade.name()) {
                shade.restore(&status);
                info!(
                    "[Shade] Restored {}: mode {}, position {}",
                    shade.name(),
                    shade.mode(),
                    shade.position()
                );
            }
        }
        self.store = Some(store);
        self.history_log = Some(Arc::new(HistoryLog::new(
            storage.move_log(),
            storage.light_log(),
        )));
        self
    }

    pub fn with_sampler(mut self, sampler: LightSampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn shades(&self) -> &[Arc<Shade>] {
        &self.shades
    }

    pub fn shade(&self, name: &str) -> Result<&Arc<Shade>> {
        self.shades
            .iter()
            .find(|shade| shade.name() == name)
            .ok_or_else(|| ShadeError::UnknownShade(name.to_string()))
    }

    pub fn sensor(&self) -> &Arc<LightSensor> {
        &self.sensor
    }

    pub fn statuses(&self) -> Vec<ShadeStatus> {
        self.shades.iter().map(|shade| shade.status()).collect()
    }

    /// Spawn the background tasks.
    pub fn start(self: &Arc<Self>) {
        if let Some(pin) = self.light_pin.lock().take() {
            let mut sampling = SamplingLoop::new(
                self.sensor.clone(),
                self.sampler.clone(),
                pin,
                self.shades.clone(),
                self.clock.clone(),
            );
            if let Some(log) = &self.history_log {
                sampling = sampling.with_history_log(log.clone());
            }
            self.tasks.spawn(sampling.run(self.work.child_token()));
        }

        for shade in &self.shades {
            let events = shade.subscribe();
            self.recorders.spawn(self.clone().record_moves(events));
            if shade.mode() == Mode::Auto {
                self.spawn_auto(shade);
            }
        }
        info!("[Controller] Started with {} shade(s)", self.shades.len());
    }

    /// Switch the mode of a shade and return the previous mode.
    ///
    /// Manual stops the shade's coordinator; auto starts it.
    pub fn set_mode(self: &Arc<Self>, name: &str, mode: Mode) -> Result<Mode> {
        if self.work.is_cancelled() {
            return Err(ShadeError::ShuttingDown);
        }
        let shade = self.shade(name)?.clone();
        let previous = shade.set_mode(mode);
        match mode {
            Mode::Manual => {
                if let Some(token) = self.autos.lock().remove(name) {
                    token.cancel();
                }
            }
            Mode::Auto => self.spawn_auto(&shade),
        }
        if previous != mode {
            info!("[Controller] {}: mode {} -> {}", name, previous, mode);
            self.persist();
        }
        Ok(previous)
    }

    /// Apply a command. Manual moves run in the background.
    pub fn command(self: &Arc<Self>, name: &str, command: Command) -> Result<()> {
        let target = match command {
            Command::Auto => {
                self.set_mode(name, Mode::Auto)?;
                return Ok(());
            }
            Command::Manual => {
                self.set_mode(name, Mode::Manual)?;
                return Ok(());
            }
            Command::ManualUp => Position::Up,
            Command::ManualDown => Position::Down,
        };

        self.set_mode(name, Mode::Manual)?;
        let shade = self.shade(name)?.clone();
        self.tasks.spawn(async move {
            match shade.move_to(target).await {
                Ok(MoveOutcome::AlreadyMoving) => {
                    warn!("[Controller] {} is moving already, {} ignored", shade.name(), target);
                }
                Ok(_) => {}
                Err(e) => error!("[Controller] {}: {}", shade.name(), e),
            }
        });
        Ok(())
    }

    /// Stop all tasks, bring every shade up and release the pins.
    pub async fn shutdown(&self) {
        info!("[Controller] Shutting down");
        self.work.cancel();
        self.tasks.close();
        self.tasks.wait().await;

        for shade in &self.shades {
            if let Err(e) = shade.shutdown().await {
                error!("[Controller] {}: failed to move up on shutdown: {}", shade.name(), e);
            }
        }

        self.recording.cancel();
        self.recorders.close();
        self.recorders.wait().await;
        self.persist();
        info!("[Controller] Stopped");
    }

    fn spawn_auto(self: &Arc<Self>, shade: &Arc<Shade>) {
        let mut autos = self.autos.lock();
        if autos
            .get(shade.name())
            .is_some_and(|token| !token.is_cancelled())
        {
            return;
        }
        let token = self.work.child_token();
        autos.insert(shade.name().to_string(), token.clone());
        let coordinator = ScheduleCoordinator::new(
            shade.clone(),
            self.sensor.clone(),
            self.location.clone(),
            self.clock.clone(),
        );
        self.tasks.spawn(coordinator.run(token));
    }

    async fn record_moves(self: Arc<Self>, mut events: broadcast::Receiver<MoveEvent>) {
        loop {
            tokio::select! {
                _ = self.recording.cancelled() => {
                    while let Ok(event) = events.try_recv() {
                        self.record_move(event).await;
                    }
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => self.record_move(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("[Controller] Missed {} move event(s)", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    async fn record_move(&self, event: MoveEvent) {
        let light = self.sensor.history();
        if let Some(log) = &self.history_log
            && let Err(e) = log.append_move(&event, &light)
        {
            warn!("[Controller] Failed to write move log: {}", e);
        }

        let subject = format!("Moved {} {}", event.shade, event.to);
        let body = format!(
            "{} moved from {} to {} at {} ({} mode). Light: {}",
            event.shade,
            event.from,
            event.to,
            event.at.format("%d %b %H:%M:%S"),
            event.mode,
            light
        );
        self.notifier.notify(&subject, &body).await;
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_shades(&self.shades)
        {
            warn!("[Controller] Failed to save state to {:?}: {}", store.path(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShadeSettings, StorageConfig};
    use crate::gpio::PinOp;
    use crate::schedule::AnchoredClock;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) {
            self.sent.lock().push((subject.to_string(), body.to_string()));
        }
    }

    struct Rig {
        controller: Arc<Controller>,
        notifier: Arc<RecordingNotifier>,
        up: SimulatedPin,
        down: SimulatedPin,
        dir: PathBuf,
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn rig(name: &str, mode: Mode, light_count: u32) -> Rig {
        let dir = std::env::temp_dir().join(format!(
            "sunshade-controller-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);

        let mut config = Config::default();
        config.shades.push(ShadeSettings::default());
        config.storage = StorageConfig {
            state_dir: dir.clone(),
        };

        let up = SimulatedPin::new(20);
        let down = SimulatedPin::new(21);
        let hardware = Hardware {
            light_pin: Box::new(SimulatedPin::with_pulses(23, vec![light_count])),
            shade_pins: vec![ShadePins::new(Box::new(up.clone()), Box::new(down.clone()))],
        };
        let notifier = Arc::new(RecordingNotifier::default());
        let clock: Arc<dyn Clock> = Arc::new(AnchoredClock::new(noon()));

        let controller = Controller::new(&config, hardware, clock, notifier.clone())
            .unwrap()
            .with_storage(&config.storage)
            .with_sampler(
                LightSampler::new()
                    .with_settle_time(Duration::ZERO)
                    .with_attempts(2),
            );
        controller.shades()[0].set_mode(mode);

        Rig {
            controller: Arc::new(controller),
            notifier,
            up,
            down,
            dir,
        }
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(Command::from_str("manual/up").unwrap(), Command::ManualUp);
        assert_eq!(Command::from_str("auto").unwrap(), Command::Auto);
        assert_eq!(Command::ManualDown.to_string(), "manual/down");
        assert!(Command::from_str("up").is_err());
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse(" manual/down\n").unwrap(), Command::ManualDown);
        assert!(matches!(
            Command::parse("up"),
            Err(ShadeError::InvalidCommand(payload)) if payload == "up"
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.shades.push(ShadeSettings::default());
        config.light.good = 50;
        let hardware = Hardware::simulated(&config).unwrap();
        let result = Controller::new(
            &config,
            hardware,
            Arc::new(AnchoredClock::new(noon())),
            Arc::new(RecordingNotifier::default()),
        );
        assert!(matches!(result, Err(ShadeError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_down_logs_notifies_and_persists() {
        let rig = rig("manual-down", Mode::Manual, 100);
        rig.controller.start();

        rig.controller.command("sunscreen", Command::ManualDown).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let shade = rig.controller.shade("sunscreen").unwrap();
        assert_eq!(shade.position(), Position::Down);
        assert_eq!(rig.down.toggles(), 2);
        assert_eq!(rig.notifier.sent.lock().len(), 1);
        assert_eq!(rig.notifier.sent.lock()[0].0, "Moved sunscreen down");

        let moves = std::fs::read_to_string(rig.dir.join("sunscreen_stats.csv")).unwrap();
        assert_eq!(moves.lines().count(), 1);
        assert!(moves.contains(",sunscreen,manual,unknown,down,"));

        let state = std::fs::read_to_string(rig.dir.join("state.json")).unwrap();
        assert!(state.contains("\"position\": \"down\""));

        rig.controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_stops_coordinator() {
        let rig = rig("mode", Mode::Auto, 100);
        rig.controller.start();
        assert_eq!(rig.controller.autos.lock().len(), 1);

        let previous = rig.controller.set_mode("sunscreen", Mode::Manual).unwrap();
        assert_eq!(previous, Mode::Auto);
        assert!(rig.controller.autos.lock().is_empty());

        rig.controller.set_mode("sunscreen", Mode::Auto).unwrap();
        assert_eq!(rig.controller.autos.lock().len(), 1);

        rig.controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_shade() {
        let rig = rig("unknown", Mode::Manual, 100);
        assert!(matches!(
            rig.controller.command("garden", Command::Auto),
            Err(ShadeError::UnknownShade(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_moves_down_in_good_weather() {
        // 50 / 26 = 1, well below the good threshold
        let rig = rig("auto", Mode::Auto, 50);
        rig.controller.start();

        // 22 samples at one per minute fill the history
        tokio::time::sleep(Duration::from_secs(30 * 60)).await;

        let shade = rig.controller.shade("sunscreen").unwrap();
        assert_eq!(shade.position(), Position::Down);
        assert_eq!(rig.up.toggles(), 2);
        assert_eq!(rig.down.toggles(), 2);

        let light = std::fs::read_to_string(rig.dir.join("light_stats.csv")).unwrap();
        assert!(light.lines().count() >= 22);

        rig.controller.shutdown().await;
        assert_eq!(shade.position(), Position::Up);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_moves_up_and_rejects_commands() {
        let rig = rig("shutdown", Mode::Manual, 100);
        rig.controller.start();
        rig.controller.command("sunscreen", Command::ManualDown).unwrap();

        // Shutdown waits for the move in progress, then goes up
        tokio::time::sleep(Duration::from_secs(2)).await;
        rig.controller.shutdown().await;

        let shade = rig.controller.shade("sunscreen").unwrap();
        assert_eq!(shade.position(), Position::Up);
        assert_eq!(rig.up.ops().last(), Some(&PinOp::Release));
        assert_eq!(rig.notifier.sent.lock().len(), 2);
        assert!(matches!(
            rig.controller.command("sunscreen", Command::Auto),
            Err(ShadeError::ShuttingDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restores_persisted_state() {
        let first = rig("restore", Mode::Manual, 100);
        first.controller.start();
        first.controller.command("sunscreen", Command::ManualDown).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        // Drop without shutdown so the shade stays down on disk
        drop(first);

        let mut config = Config::default();
        config.shades.push(ShadeSettings::default());
        let dir = std::env::temp_dir().join(format!(
            "sunshade-controller-restore-{}",
            std::process::id()
        ));
        let storage = StorageConfig { state_dir: dir };
        let controller = Controller::new(
            &config,
            Hardware::simulated(&config).unwrap(),
            Arc::new(AnchoredClock::new(noon())),
            Arc::new(RecordingNotifier::default()),
        )
        .unwrap()
        .with_storage(&storage);

        let shade = controller.shade("sunscreen").unwrap();
        assert_eq!(shade.mode(), Mode::Manual);
        assert_eq!(shade.position(), Position::Down);
    }
}
