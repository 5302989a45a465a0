//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GroundStationError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub tiles: TilesConfig,
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
}

/// Synthetic trajectory used when no vehicle is linked
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    #[serde(default = "default_center_lon")]
    pub center_lon: f64,

    #[serde(default = "default_radius_deg")]
    pub radius_deg: f64,

    #[serde(default = "default_angular_step_rad")]
    pub angular_step_rad: f64,

    #[serde(default = "default_base_altitude_m")]
    pub base_altitude_m: f64,

    #[serde(default = "default_altitude_amplitude_m")]
    pub altitude_amplitude_m: f64,
}

/// Offline tile server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TilesConfig {
    #[serde(default = "default_tiles_enabled")]
    pub enabled: bool,

    #[serde(default = "default_archive")]
    pub archive: PathBuf,

    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

/// CSV telemetry log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CsvConfig {
    #[serde(default = "default_csv_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

/// Application log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files, stdout only when unset
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 57600 }
fn default_timeout_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_auto_reconnect() -> bool { true }

fn default_center_lat() -> f64 { 39.9334 }
fn default_center_lon() -> f64 { 32.8597 }
fn default_radius_deg() -> f64 { 0.001 }
fn default_angular_step_rad() -> f64 { 0.1 }
fn default_base_altitude_m() -> f64 { 100.0 }
fn default_altitude_amplitude_m() -> f64 { 20.0 }

fn default_tiles_enabled() -> bool { true }
fn default_archive() -> PathBuf { PathBuf::from("map/map.mbtiles") }
fn default_bind() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 8080)) }

fn default_csv_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }

fn default_log_level() -> String { "info".to_string() }

/// Baud rates accepted for the telemetry radio
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            auto_reconnect: default_auto_reconnect(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            radius_deg: default_radius_deg(),
            angular_step_rad: default_angular_step_rad(),
            base_altitude_m: default_base_altitude_m(),
            altitude_amplitude_m: default_altitude_amplitude_m(),
        }
    }
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            enabled: default_tiles_enabled(),
            archive: default_archive(),
            bind: default_bind(),
        }
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: default_csv_enabled(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ground_station::config::Config;
    ///
    /// let config = Config::load("config/station.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        let sim = &self.simulation;
        if !(sim.radius_deg.is_finite() && sim.radius_deg > 0.0) {
            return Err(invalid("radius_deg must be a positive number"));
        }

        if !(sim.angular_step_rad.is_finite() && sim.angular_step_rad > 0.0) {
            return Err(invalid("angular_step_rad must be a positive number"));
        }

        if !(-90.0..=90.0).contains(&sim.center_lat) {
            return Err(invalid("center_lat must be between -90 and 90"));
        }

        if !(-180.0..=180.0).contains(&sim.center_lon) {
            return Err(invalid("center_lon must be between -180 and 180"));
        }

        if self.tiles.enabled && self.tiles.archive.as_os_str().is_empty() {
            return Err(invalid("tiles archive cannot be empty when enabled"));
        }

        if self.csv.enabled && self.csv.log_dir.is_empty() {
            return Err(invalid("csv log_dir cannot be empty when enabled"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> GroundStationError {
    GroundStationError::Config(toml::de::Error::custom(msg))
}
