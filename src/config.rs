//! Node configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config
//! and describes the stock four-sensor obstacle node.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read
    Io(String),
    /// Not valid JSON for this schema
    Parse(String),
    /// Parsed, but the values make no sense
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "cannot read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "malformed config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// One ultrasonic ranging sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub name: String,
    /// Filtered distances at or below this count as a detection
    pub range_cm: f32,
    /// Simulated sensor: mean distance
    pub sim_base_cm: f32,
    /// Simulated sensor: peak deviation from the mean
    pub sim_swing_cm: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: "Sensor".to_string(),
            range_cm: 50.0,
            sim_base_cm: 80.0,
            sim_swing_cm: 40.0,
        }
    }
}

impl SensorConfig {
    fn named(name: &str, range_cm: f32, sim_base_cm: f32) -> Self {
        Self {
            name: name.to_string(),
            range_cm,
            sim_base_cm,
            ..Self::default()
        }
    }
}

/// Task periods in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Periods {
    pub button_ms: u64,
    pub debounce_ms: u64,
    pub ultrasonic_ms: u64,
    pub ir_ms: u64,
    pub buzzer_ms: u64,
    /// Buzzer period while in sleep mode
    pub buzzer_sleep_ms: u64,
    pub watchdog_ms: u64,
    /// Watchdog period while in sleep mode
    pub watchdog_sleep_ms: u64,
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            button_ms: 100,
            debounce_ms: 200,
            ultrasonic_ms: 500,
            ir_ms: 100,
            buzzer_ms: 500,
            buzzer_sleep_ms: 100,
            watchdog_ms: 500,
            watchdog_sleep_ms: 5000,
        }
    }
}

/// Optional per-task priorities. Unset means lowest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Priorities {
    pub button: Option<u32>,
    pub ultrasonic: Option<u32>,
    pub ir: Option<u32>,
    pub buzzer: Option<u32>,
    pub watchdog: Option<u32>,
}

/// A closed time window in milliseconds since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Window {
    pub fn contains(&self, ms: u64) -> bool {
        ms >= self.start_ms && ms <= self.end_ms
    }
}

/// Scripted inputs for the simulated board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Windows during which the sleep button is held down
    pub button_presses: Vec<Window>,
    /// Windows during which the IR sensor sees an obstacle
    pub ir_hits: Vec<Window>,
    /// Every n-th ultrasonic read returns no echo (0 = never)
    pub dropout_every: u32,
    /// Period of the simulated distance swing
    pub swing_period_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            button_presses: Vec::new(),
            ir_hits: Vec::new(),
            dropout_every: 9,
            swing_period_ms: 4000,
        }
    }
}

/// Top-level node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Console log level: off, error, warn, info, debug, trace
    pub log_level: String,
    /// Pause between scheduler ticks in the driver loop
    pub tick_interval_ms: u64,
    pub sensors: Vec<SensorConfig>,
    pub periods: Periods,
    pub priorities: Priorities,
    pub sim: SimConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            tick_interval_ms: 10,
            sensors: vec![
                SensorConfig::named("Sensor 1", 50.0, 80.0),
                SensorConfig::named("Sensor 2", 50.0, 90.0),
                SensorConfig::named("Sensor 3", 50.0, 100.0),
                SensorConfig::named("Sensor 4", 70.0, 85.0),
            ],
            periods: Periods::default(),
            priorities: Priorities::default(),
            sim: SimConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: NodeConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.periods;
        let periods = [
            ("button_ms", p.button_ms),
            ("debounce_ms", p.debounce_ms),
            ("ultrasonic_ms", p.ultrasonic_ms),
            ("ir_ms", p.ir_ms),
            ("buzzer_ms", p.buzzer_ms),
            ("buzzer_sleep_ms", p.buzzer_sleep_ms),
            ("watchdog_ms", p.watchdog_ms),
            ("watchdog_sleep_ms", p.watchdog_sleep_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!("periods.{} must be positive", name)));
        }

        for sensor in &self.sensors {
            if sensor.name.trim().is_empty() {
                return Err(ConfigError::Invalid("sensor name is empty".to_string()));
            }
            if sensor.range_cm.is_nan() || sensor.range_cm <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "sensor '{}' range must be positive",
                    sensor.name
                )));
            }
        }

        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)));
        }

        for w in self.sim.button_presses.iter().chain(&self.sim.ir_hits) {
            if w.end_ms < w.start_ms {
                return Err(ConfigError::Invalid(format!(
                    "window {}..{} ends before it starts",
                    w.start_ms, w.end_ms
                )));
            }
        }

        Ok(())
    }
}
