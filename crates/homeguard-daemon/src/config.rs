//! Daemon configuration.
//!
//! Read from a TOML file (`config/homeguard.toml` unless `HOMEGUARD_CONFIG`
//! points elsewhere). Every section and key is optional. A few keys can be
//! overridden from the environment:
//!
//! | Variable              | Key                  |
//! |-----------------------|----------------------|
//! | `HOMEGUARD_ALERT_URL` | `notifier.url`       |
//! | `HOMEGUARD_BIND_ADDR` | `server.bind_addr`   |
//! | `HOMEGUARD_LOG`       | `logging.level`      |
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:8080"
//!
//! [notifier]
//! url = "http://alerts.local:5000/api/events"
//! timeout_ms = 3000
//!
//! [alarm]
//! distance_threshold_cm = 30.0
//!
//! [hardware]
//! backend = "gpio"
//! ```

use homeguard_alarm::MonitorConfig;
use homeguard_core::constants::{
    DEFAULT_ALERT_URL, DEFAULT_CARD_RETRY_MS, DEFAULT_DISTANCE_POLL_MS,
    DEFAULT_DISTANCE_THRESHOLD_CM, DEFAULT_NOTIFY_TIMEOUT_MS, DEFAULT_SENSOR_RETRY_MS,
    DEFAULT_SHUTDOWN_GRACE_MS,
};
use homeguard_network::HttpNotifierConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/homeguard.toml";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

pub const ENV_CONFIG: &str = "HOMEGUARD_CONFIG";
pub const ENV_ALERT_URL: &str = "HOMEGUARD_ALERT_URL";
pub const ENV_BIND_ADDR: &str = "HOMEGUARD_BIND_ADDR";
pub const ENV_LOG: &str = "HOMEGUARD_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Full daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub notifier: NotifierConfig,
    pub alarm: AlarmConfig,
    pub monitors: MonitorsConfig,
    pub hardware: HardwareConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// When false, alerts are dropped instead of posted.
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_ALERT_URL.to_string(),
            timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Readings at or below this raise the front door alarm.
    pub distance_threshold_cm: f64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            distance_threshold_cm: DEFAULT_DISTANCE_THRESHOLD_CM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorsConfig {
    pub motion: bool,
    pub distance: bool,
    pub card: bool,
    pub distance_poll_ms: u64,
    pub card_retry_ms: u64,
    pub sensor_retry_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for MonitorsConfig {
    fn default() -> Self {
        Self {
            motion: true,
            distance: true,
            card: true,
            distance_poll_ms: DEFAULT_DISTANCE_POLL_MS,
            card_retry_ms: DEFAULT_CARD_RETRY_MS,
            sensor_retry_ms: DEFAULT_SENSOR_RETRY_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process mock devices, driven by nothing unless a test holds the handles.
    #[default]
    Mock,
    /// Raspberry Pi GPIO. Requires the `gpio` feature.
    Gpio,
}

/// Pin assignments are BCM numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub backend: Backend,
    pub pir_pin: u8,
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub led_pin: u8,
    /// MFRC522 reset line. The reader itself sits on SPI0 CE0.
    pub card_reset_pin: u8,
    pub max_distance_m: f64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            pir_pin: 4,
            trigger_pin: 23,
            echo_pin: 24,
            led_pin: 17,
            card_reset_pin: 25,
            max_distance_m: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse `path` if it exists, defaults otherwise.
    ///
    /// Returns the config and whether the file was found.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool), ConfigError> {
        if path.as_ref().exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Locate, load, override and validate, reading variables through `env`.
    ///
    /// Returns the config and the file it came from, if any.
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = env(ENV_CONFIG).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);
        let (mut config, found) = Self::load_or_default(&path)?;
        config.apply_env(env);
        config.validate()?;
        Ok((config, found.then_some(path)))
    }

    /// Apply environment overrides. Empty values are ignored.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var(ENV_ALERT_URL) {
            self.notifier.url = url;
        }
        if let Some(addr) = var(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
        if let Some(level) = var(ENV_LOG) {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.alarm.distance_threshold_cm;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "alarm.distance_threshold_cm must be positive, got {}",
                threshold
            )));
        }

        let intervals = [
            ("notifier.timeout_ms", self.notifier.timeout_ms),
            ("monitors.distance_poll_ms", self.monitors.distance_poll_ms),
            ("monitors.card_retry_ms", self.monitors.card_retry_ms),
            ("monitors.sensor_retry_ms", self.monitors.sensor_retry_ms),
            ("monitors.shutdown_grace_ms", self.monitors.shutdown_grace_ms),
        ];
        if let Some((key, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::invalid(format!("{} must be greater than zero", key)));
        }

        let max = self.hardware.max_distance_m;
        if !max.is_finite() || max <= 0.0 {
            return Err(ConfigError::invalid(format!(
                "hardware.max_distance_m must be positive, got {}",
                max
            )));
        }

        let hw = &self.hardware;
        let pins = [
            ("pir_pin", hw.pir_pin),
            ("trigger_pin", hw.trigger_pin),
            ("echo_pin", hw.echo_pin),
            ("led_pin", hw.led_pin),
            ("card_reset_pin", hw.card_reset_pin),
        ];
        for (i, (key, pin)) in pins.iter().enumerate() {
            if let Some((other, _)) = pins[..i].iter().find(|(_, p)| p == pin) {
                return Err(ConfigError::invalid(format!(
                    "hardware.{} shares BCM {} with hardware.{}",
                    key, pin, other
                )));
            }
        }

        self.bind_addr()?;

        if self.notifier.enabled && !self.notifier.url.starts_with("http") {
            return Err(ConfigError::invalid(format!(
                "notifier.url must be an http(s) URL, got {:?}",
                self.notifier.url
            )));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_addr.parse().map_err(|_| {
            ConfigError::invalid(format!(
                "server.bind_addr is not a socket address: {:?}",
                self.server.bind_addr
            ))
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            motion_enabled: self.monitors.motion,
            distance_enabled: self.monitors.distance,
            card_enabled: self.monitors.card,
            distance_poll_interval: Duration::from_millis(self.monitors.distance_poll_ms),
            card_retry_delay: Duration::from_millis(self.monitors.card_retry_ms),
            sensor_retry_delay: Duration::from_millis(self.monitors.sensor_retry_ms),
        }
    }

    pub fn notifier_config(&self) -> HttpNotifierConfig {
        HttpNotifierConfig {
            url: self.notifier.url.clone(),
            timeout: Duration::from_millis(self.notifier.timeout_ms),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.monitors.shutdown_grace_ms)
    }
}
