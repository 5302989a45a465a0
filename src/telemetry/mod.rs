//! # Telemetry Module
//!
//! Decoded telemetry records and their distribution to consumers.
//!
//! This module handles:
//! - The immutable `TelemetryRecord` produced once per acquisition tick
//! - Connectivity events emitted on link state changes
//! - Fan-out to subscribers (`publisher`)
//! - Daily-rotated CSV logging (`csv_logger`)

pub mod publisher;
pub mod csv_logger;

use chrono::{DateTime, Local};
use std::fmt;

use crate::frame::protocol::Position;

/// Flight mode reported alongside each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlightMode {
    #[default]
    Autonomous,
    Rc,
}

impl FlightMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightMode::Autonomous => "AUTONOMOUS",
            FlightMode::Rc => "RC",
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record's position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Decoded from a vehicle frame
    Linked,
    /// Produced by the trajectory simulator
    Simulated,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Linked => "LINKED",
            LinkState::Simulated => "SIMULATED",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry sample
///
/// Immutable once built. The battery percentage is clamped to 0-100 at
/// construction regardless of the source value.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    position: Position,
    speed: f64,
    battery_percent: u8,
    mode: FlightMode,
    link_state: LinkState,
    captured_at: DateTime<Local>,
}

impl TelemetryRecord {
    /// Build a record stamped with the current wall-clock time
    pub fn new(
        position: Position,
        speed: f64,
        battery_percent: i64,
        mode: FlightMode,
        link_state: LinkState,
    ) -> Self {
        Self::with_timestamp(position, speed, battery_percent, mode, link_state, Local::now())
    }

    /// Build a record with an explicit capture time
    pub fn with_timestamp(
        position: Position,
        speed: f64,
        battery_percent: i64,
        mode: FlightMode,
        link_state: LinkState,
        captured_at: DateTime<Local>,
    ) -> Self {
        Self {
            position,
            speed,
            battery_percent: battery_percent.clamp(0, 100) as u8,
            mode,
            link_state,
            captured_at,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Ground speed in meters/second
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn battery_percent(&self) -> u8 {
        self.battery_percent
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }
}

/// Link connectivity change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub connected: bool,
    pub message: String,
}

impl ConnectivityEvent {
    pub fn connected(message: impl Into<String>) -> Self {
        Self {
            connected: true,
            message: message.into(),
        }
    }

    pub fn disconnected(message: impl Into<String>) -> Self {
        Self {
            connected: false,
            message: message.into(),
        }
    }
}

/// Everything the link manager pushes to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Record(TelemetryRecord),
    Connectivity(ConnectivityEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::new(39.9334, 32.8597, 100.0)
    }

    #[test]
    fn test_battery_is_clamped() {
        let low = TelemetryRecord::new(position(), 0.0, -40, FlightMode::Rc, LinkState::Linked);
        assert_eq!(low.battery_percent(), 0);

        let high = TelemetryRecord::new(position(), 0.0, 250, FlightMode::Rc, LinkState::Linked);
        assert_eq!(high.battery_percent(), 100);

        let extreme = TelemetryRecord::new(position(), 0.0, i64::MAX, FlightMode::Rc, LinkState::Linked);
        assert_eq!(extreme.battery_percent(), 100);

        let normal = TelemetryRecord::new(position(), 0.0, 87, FlightMode::Rc, LinkState::Linked);
        assert_eq!(normal.battery_percent(), 87);
    }

    #[test]
    fn test_labels() {
        assert_eq!(FlightMode::Autonomous.to_string(), "AUTONOMOUS");
        assert_eq!(FlightMode::Rc.to_string(), "RC");
        assert_eq!(LinkState::Linked.to_string(), "LINKED");
        assert_eq!(LinkState::Simulated.to_string(), "SIMULATED");
        assert_eq!(FlightMode::default(), FlightMode::Autonomous);
    }

    #[test]
    fn test_connectivity_constructors() {
        let up = ConnectivityEvent::connected("Connected to /dev/ttyUSB0");
        assert!(up.connected);
        let down = ConnectivityEvent::disconnected("gone");
        assert!(!down.connected);
        assert_eq!(down.message, "gone");
    }
}
