use crate::gpio::{GpioError, validate_pin};
use crate::shade::decision::Thresholds;
use chrono::{NaiveTime, TimeDelta};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Shortest accepted interval between light samples.
pub const MIN_SAMPLING_INTERVAL_SECS: u64 = 10;

/// Sun offsets must stay below half a day.
pub const MAX_SUN_OFFSET_MINS: i64 = 12 * 60;

/// The light sensor keeps sampling this long after the last shade stops.
pub const SENSOR_STOP_BUFFER_MINUTES: i64 = 30;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let Ok(content) = fs::read_to_string(".env") else {
        return;
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split a `KEY=value` line, stripping one pair of matching quotes.
/// Blank lines, comments and lines without `=` yield `None`.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|&q| value.strip_prefix(q)?.strip_suffix(q))
        .unwrap_or(value);
    Some((key, unquoted))
}

/// Configuration rejected at the boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("light values incorrect, expected good < neutral < bad: {good} < {neutral} < {bad}")]
    ThresholdOrder { good: u32, neutral: u32, bad: u32 },

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),

    #[error("calibration factor must be a number greater than zero")]
    CalibrationFactor,

    #[error("sampling interval of {secs}s is too short, minimum is {MIN_SAMPLING_INTERVAL_SECS}s")]
    SamplingInterval { secs: u64 },

    #[error("{what}: {source}")]
    Pin {
        what: String,
        #[source]
        source: GpioError,
    },

    #[error("shade '{0}' uses the same pin for up and down")]
    SharedMotorPin(String),

    #[error("pin {0} is used by more than one device")]
    PinInUse(u8),

    #[error("shade '{0}': move durations must be greater than zero")]
    MoveDuration(String),

    #[error("shade '{0}': pre-stop limit must not be negative")]
    PreStopLimit(String),

    #[error("shade '{shade}': sun offset {minutes} min, limit is {MAX_SUN_OFFSET_MINS} min")]
    SunOffset { shade: String, minutes: i64 },

    #[error("shade '{shade}': start {start} is not before stop {stop}")]
    WindowOrder {
        shade: String,
        start: NaiveTime,
        stop: NaiveTime,
    },

    #[error("shade name must not be empty")]
    EmptyName,

    #[error("duplicate shade name '{0}'")]
    DuplicateShade(String),

    #[error("at least one shade must be configured")]
    NoShades,

    #[error("invalid location: latitude {latitude}, longitude {longitude}")]
    Location { latitude: f64, longitude: f64 },

    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path:?} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub location: LocationConfig,
    pub light: LightSettings,
    pub shades: Vec<ShadeSettings>,
    pub storage: StorageConfig,
    pub mqtt: MqttConfig,
    pub simulation: SimulationConfig,
}

/// Location used for sunrise/sunset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub utc_offset_hours: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 52.37,
            longitude: 4.89,
            utc_offset_hours: 2.0,
        }
    }
}

/// Light sensor wiring, sampling cadence and weather thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// BCM pin of the photoresistor circuit
    pub pin: u8,
    /// Divisor applied to the averaged raw pulse count
    pub calibration_factor: u32,
    pub sampling_interval_secs: u64,
    /// Max light value that counts as "good weather"
    pub good: u32,
    /// Light value from which the weather counts as "neutral"
    pub neutral: u32,
    /// Light value from which the weather counts as "bad"
    pub bad: u32,
    pub times_good: usize,
    pub times_neutral: usize,
    pub times_bad: usize,
    /// Extra lookback samples tolerated as noise
    pub allowed_outliers: usize,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            pin: 23,
            calibration_factor: 26,
            sampling_interval_secs: 60,
            good: 9,
            neutral: 11,
            bad: 20,
            times_good: 15,
            times_neutral: 20,
            times_bad: 5,
            allowed_outliers: 2,
        }
    }
}

impl LightSettings {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs(self.sampling_interval_secs)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            good: self.good,
            neutral: self.neutral,
            bad: self.bad,
            times_good: self.times_good,
            times_neutral: self.times_neutral,
            times_bad: self.times_bad,
            outliers: self.allowed_outliers,
        }
    }

    /// Number of samples kept, and needed before the shade is evaluated.
    pub fn capacity(&self) -> usize {
        self.thresholds().required_samples()
    }

    /// How long it takes to fill the history from empty.
    pub fn warmup(&self) -> TimeDelta {
        let secs = self.sampling_interval_secs.saturating_mul(self.capacity() as u64);
        TimeDelta::try_seconds(secs as i64).unwrap_or(TimeDelta::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.good < self.neutral && self.neutral < self.bad) {
            return Err(ConfigError::ThresholdOrder {
                good: self.good,
                neutral: self.neutral,
                bad: self.bad,
            });
        }
        for (name, times) in [
            ("times_good", self.times_good),
            ("times_neutral", self.times_neutral),
            ("times_bad", self.times_bad),
        ] {
            if times == 0 {
                return Err(ConfigError::ZeroCount(name));
            }
        }
        if self.calibration_factor == 0 {
            return Err(ConfigError::CalibrationFactor);
        }
        if self.sampling_interval_secs < MIN_SAMPLING_INTERVAL_SECS {
            return Err(ConfigError::SamplingInterval {
                secs: self.sampling_interval_secs,
            });
        }
        validate_pin(self.pin).map_err(|source| ConfigError::Pin {
            what: "light sensor pin".to_string(),
            source,
        })?;
        Ok(())
    }
}

/// When a shade is allowed to operate automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Derive start from sunrise + `sun_start_offset_mins`
    pub auto_start: bool,
    /// Derive stop from sunset - `sun_stop_offset_mins`
    pub auto_stop: bool,
    pub sun_start_offset_mins: i64,
    pub sun_stop_offset_mins: i64,
    /// Fixed start time, used when `auto_start` is off
    pub start: NaiveTime,
    /// Fixed stop time, used when `auto_stop` is off
    pub stop: NaiveTime,
    /// The shade does not go down this long before stop
    pub pre_stop_limit_mins: i64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            auto_start: false,
            auto_stop: false,
            sun_start_offset_mins: 60,
            sun_stop_offset_mins: 60,
            start: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
            stop: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            pre_stop_limit_mins: 70,
        }
    }
}

impl ScheduleSettings {
    pub fn sun_start_offset(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.sun_start_offset_mins).unwrap_or_default()
    }

    pub fn sun_stop_offset(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.sun_stop_offset_mins).unwrap_or_default()
    }

    pub fn pre_stop_limit(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.pre_stop_limit_mins).unwrap_or_default()
    }
}

/// One motorized shade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadeSettings {
    pub name: String,
    pub pin_up: u8,
    pub pin_down: u8,
    pub move_up_secs: u64,
    pub move_down_secs: u64,
    pub schedule: ScheduleSettings,
}

impl Default for ShadeSettings {
    fn default() -> Self {
        Self {
            name: "sunscreen".to_string(),
            pin_up: 20,
            pin_down: 21,
            move_up_secs: 20,
            move_down_secs: 17,
            schedule: ScheduleSettings::default(),
        }
    }
}

impl ShadeSettings {
    pub fn move_up_duration(&self) -> Duration {
        Duration::from_secs(self.move_up_secs)
    }

    pub fn move_down_duration(&self) -> Duration {
        Duration::from_secs(self.move_down_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        for (what, pin) in [("up", self.pin_up), ("down", self.pin_down)] {
            validate_pin(pin).map_err(|source| ConfigError::Pin {
                what: format!("shade '{}' {} pin", self.name, what),
                source,
            })?;
        }
        if self.pin_up == self.pin_down {
            return Err(ConfigError::SharedMotorPin(self.name.clone()));
        }
        if self.move_up_secs == 0 || self.move_down_secs == 0 {
            return Err(ConfigError::MoveDuration(self.name.clone()));
        }
        let schedule = &self.schedule;
        if schedule.pre_stop_limit_mins < 0 {
            return Err(ConfigError::PreStopLimit(self.name.clone()));
        }
        for minutes in [schedule.sun_start_offset_mins, schedule.sun_stop_offset_mins] {
            if minutes.abs() >= MAX_SUN_OFFSET_MINS {
                return Err(ConfigError::SunOffset {
                    shade: self.name.clone(),
                    minutes,
                });
            }
        }
        if !schedule.auto_start && !schedule.auto_stop && schedule.start >= schedule.stop {
            return Err(ConfigError::WindowOrder {
                shade: self.name.clone(),
                start: schedule.start,
                stop: schedule.stop,
            });
        }
        Ok(())
    }
}

/// Where runtime state and history logs are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl StorageConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("state.json")
    }

    pub fn move_log(&self) -> PathBuf {
        self.state_dir.join("sunscreen_stats.csv")
    }

    pub fn light_log(&self) -> PathBuf {
        self.state_dir.join("light_stats.csv")
    }
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sunshade-controller")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topics are `<prefix>/<shade>/set` and `<prefix>/notifications`
    pub topic_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "10.0.0.2".to_string(),
            broker_port: 1883,
            client_id: "sunshade-controller".to_string(),
            username: None,
            password: None,
            topic_prefix: "sunshade".to_string(),
        }
    }
}

/// Simulated light source used with `--simulate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub enabled: bool,
    /// Mean raw pulse count
    pub light_base: u32,
    pub light_spread: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            light_base: 300,
            light_spread: 150,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}='{}': cannot parse value", key, raw);
            None
        }
    }
}

fn env_time(key: &str) -> Option<NaiveTime> {
    let raw = std::env::var(key).ok()?;
    match NaiveTime::parse_from_str(raw.trim(), "%H:%M") {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("Ignoring {}='{}': expected HH:MM ({})", key, raw, e);
            None
        }
    }
}

impl Config {
    /// Build the configuration: defaults, then the optional JSON file, then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        if config.shades.is_empty() {
            config.shades.push(ShadeSettings::default());
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.shades.push(ShadeSettings::default());
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse("LOCATION_LATITUDE") {
            self.location.latitude = v;
        }
        if let Some(v) = env_parse("LOCATION_LONGITUDE") {
            self.location.longitude = v;
        }
        if let Some(v) = env_parse("LOCATION_UTC_OFFSET") {
            self.location.utc_offset_hours = v;
        }

        // Light sensor
        let light = &mut self.light;
        if let Some(v) = env_parse("LIGHT_PIN") {
            light.pin = v;
        }
        if let Some(v) = env_parse("LIGHT_CALIBRATION") {
            light.calibration_factor = v;
        }
        if let Some(v) = env_parse("LIGHT_INTERVAL_SECS") {
            light.sampling_interval_secs = v;
        }
        if let Some(v) = env_parse("LIGHT_GOOD") {
            light.good = v;
        }
        if let Some(v) = env_parse("LIGHT_NEUTRAL") {
            light.neutral = v;
        }
        if let Some(v) = env_parse("LIGHT_BAD") {
            light.bad = v;
        }
        if let Some(v) = env_parse("LIGHT_TIMES_GOOD") {
            light.times_good = v;
        }
        if let Some(v) = env_parse("LIGHT_TIMES_NEUTRAL") {
            light.times_neutral = v;
        }
        if let Some(v) = env_parse("LIGHT_TIMES_BAD") {
            light.times_bad = v;
        }
        if let Some(v) = env_parse("LIGHT_OUTLIERS") {
            light.allowed_outliers = v;
        }

        // Single-shade overrides apply to the first configured shade
        if self.shades.is_empty()
            && std::env::vars().any(|(key, _)| key.starts_with("SHADE_"))
        {
            self.shades.push(ShadeSettings::default());
        }
        if let Some(shade) = self.shades.first_mut() {
            if let Ok(name) = std::env::var("SHADE_NAME") {
                shade.name = name;
            }
            if let Some(v) = env_parse("SHADE_PIN_UP") {
                shade.pin_up = v;
            }
            if let Some(v) = env_parse("SHADE_PIN_DOWN") {
                shade.pin_down = v;
            }
            if let Some(v) = env_parse("SHADE_MOVE_UP_SECS") {
                shade.move_up_secs = v;
            }
            if let Some(v) = env_parse("SHADE_MOVE_DOWN_SECS") {
                shade.move_down_secs = v;
            }
            if let Some(v) = env_time("SHADE_START") {
                shade.schedule.start = v;
            }
            if let Some(v) = env_time("SHADE_STOP") {
                shade.schedule.stop = v;
            }
            if let Some(v) = env_parse("SHADE_AUTO_START") {
                shade.schedule.auto_start = v;
            }
            if let Some(v) = env_parse("SHADE_AUTO_STOP") {
                shade.schedule.auto_stop = v;
            }
            if let Some(v) = env_parse("SHADE_PRE_STOP_LIMIT_MINS") {
                shade.schedule.pre_stop_limit_mins = v;
            }
        }

        if let Ok(dir) = std::env::var("STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }

        // MQTT configuration
        if let Some(v) = env_parse("MQTT_ENABLED") {
            self.mqtt.enabled = v;
        }
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            self.mqtt.broker_host = host;
        }
        if let Some(v) = env_parse("MQTT_BROKER_PORT") {
            self.mqtt.broker_port = v;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Ok(prefix) = std::env::var("MQTT_TOPIC_PREFIX") {
            self.mqtt.topic_prefix = prefix;
        }
    }

    /// Check every section; returns all problems found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        let loc = &self.location;
        if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude) {
            errors.push(ConfigError::Location {
                latitude: loc.latitude,
                longitude: loc.longitude,
            });
        }

        if let Err(e) = self.light.validate() {
            errors.push(e);
        }

        if self.shades.is_empty() {
            errors.push(ConfigError::NoShades);
        }

        let mut names = HashSet::new();
        let mut pins = HashSet::from([self.light.pin]);
        for shade in &self.shades {
            if let Err(e) = shade.validate() {
                errors.push(e);
                continue;
            }
            if !names.insert(shade.name.as_str()) {
                errors.push(ConfigError::DuplicateShade(shade.name.clone()));
            }
            for pin in [shade.pin_up, shade.pin_down] {
                if !pins.insert(pin) {
                    errors.push(ConfigError::PinInUse(pin));
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.shades.push(ShadeSettings::default());
        config
    }

    #[test]
    fn test_parse_env_line() {
        assert_eq!(parse_env_line("LIGHT_PIN=23"), Some(("LIGHT_PIN", "23")));
        assert_eq!(
            parse_env_line("  SHADE_NAME = \"front terrace\" "),
            Some(("SHADE_NAME", "front terrace"))
        );
        assert_eq!(parse_env_line("MQTT_PASSWORD='a=b'"), Some(("MQTT_PASSWORD", "a=b")));
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line(""), None);
        assert_eq!(parse_env_line("NO_VALUE"), None);
        assert_eq!(parse_env_line("=value"), None);
    }

    #[test]
    fn test_parse_env_line_lone_quote() {
        assert_eq!(parse_env_line("KEY=\""), Some(("KEY", "\"")));
        assert_eq!(parse_env_line("KEY='"), Some(("KEY", "'")));
        assert_eq!(parse_env_line("KEY=\"\""), Some(("KEY", "")));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_capacity_and_warmup() {
        let light = LightSettings::default();
        // max(15, 20, 5) + 2
        assert_eq!(light.capacity(), 22);
        assert_eq!(light.warmup(), TimeDelta::minutes(22));
    }

    #[test]
    fn test_rejects_non_monotonic_thresholds() {
        let light = LightSettings {
            good: 12,
            neutral: 11,
            ..LightSettings::default()
        };
        assert!(matches!(
            light.validate(),
            Err(ConfigError::ThresholdOrder {
                good: 12,
                neutral: 11,
                bad: 20
            })
        ));
    }

    #[test]
    fn test_rejects_bad_light_values() {
        let zero_times = LightSettings {
            times_bad: 0,
            ..LightSettings::default()
        };
        assert!(matches!(
            zero_times.validate(),
            Err(ConfigError::ZeroCount("times_bad"))
        ));

        let zero_factor = LightSettings {
            calibration_factor: 0,
            ..LightSettings::default()
        };
        assert!(matches!(
            zero_factor.validate(),
            Err(ConfigError::CalibrationFactor)
        ));

        let fast = LightSettings {
            sampling_interval_secs: 5,
            ..LightSettings::default()
        };
        assert!(matches!(
            fast.validate(),
            Err(ConfigError::SamplingInterval { secs: 5 })
        ));

        let bad_pin = LightSettings {
            pin: 30,
            ..LightSettings::default()
        };
        assert!(matches!(bad_pin.validate(), Err(ConfigError::Pin { .. })));
    }

    #[test]
    fn test_rejects_bad_shades() {
        let same_pins = ShadeSettings {
            pin_down: 20,
            ..ShadeSettings::default()
        };
        assert!(matches!(
            same_pins.validate(),
            Err(ConfigError::SharedMotorPin(_))
        ));

        let no_duration = ShadeSettings {
            move_up_secs: 0,
            ..ShadeSettings::default()
        };
        assert!(matches!(
            no_duration.validate(),
            Err(ConfigError::MoveDuration(_))
        ));
    }

    #[test]
    fn test_rejects_bad_schedules() {
        let far_offset = ShadeSettings {
            schedule: ScheduleSettings {
                auto_stop: true,
                sun_stop_offset_mins: 3000,
                ..ScheduleSettings::default()
            },
            ..ShadeSettings::default()
        };
        assert!(matches!(
            far_offset.validate(),
            Err(ConfigError::SunOffset { minutes: 3000, .. })
        ));

        let negative_offset = ShadeSettings {
            schedule: ScheduleSettings {
                sun_start_offset_mins: -MAX_SUN_OFFSET_MINS,
                ..ScheduleSettings::default()
            },
            ..ShadeSettings::default()
        };
        assert!(matches!(
            negative_offset.validate(),
            Err(ConfigError::SunOffset { .. })
        ));

        let inverted = ShadeSettings {
            schedule: ScheduleSettings {
                start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                stop: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                ..ScheduleSettings::default()
            },
            ..ShadeSettings::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::WindowOrder { .. })
        ));

        // Fixed times only matter for the bounds that are not sun-derived
        let sun_stop = ShadeSettings {
            schedule: ScheduleSettings {
                auto_stop: true,
                start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                stop: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                ..ScheduleSettings::default()
            },
            ..ShadeSettings::default()
        };
        assert!(sun_stop.validate().is_ok());
    }

    #[test]
    fn test_collects_cross_device_problems() {
        let mut config = valid_config();
        config.shades.push(ShadeSettings::default());
        config.shades[0].pin_up = config.light.pin;

        let errors = config.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::DuplicateShade(name) if name == "sunscreen")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::PinInUse(23))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "light": { "good": 5, "neutral": 8, "bad": 12 },
            "shades": [ { "name": "terrace" } ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.light.good, 5);
        assert_eq!(config.light.times_good, 15);
        assert_eq!(config.shades[0].name, "terrace");
        assert_eq!(config.shades[0].pin_up, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            state_dir: PathBuf::from("/var/lib/shade"),
        };
        assert_eq!(storage.state_file(), PathBuf::from("/var/lib/shade/state.json"));
        assert_eq!(
            storage.move_log(),
            PathBuf::from("/var/lib/shade/sunscreen_stats.csv")
        );
    }
}
