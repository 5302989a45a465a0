//! # Trajectory Simulator
//!
//! Deterministic stand-in telemetry used whenever the vehicle link is down.
//!
//! The vehicle circles `center` at `radius_deg`, advancing one angular step
//! per tick. Altitude follows a sinusoid at twice the angular frequency, so
//! it completes two climbs per lap.

use std::f64::consts::TAU;

use crate::config::SimulationConfig;
use crate::frame::protocol::Position;

/// Cruise speed the synthetic speed oscillates above (m/s)
pub const BASE_SPEED_MPS: f64 = 25.0;

/// Lowest battery level the synthetic discharge reaches
pub const MIN_SIM_BATTERY_PERCENT: i64 = 85;

/// Circular trajectory generator
#[derive(Debug, Clone)]
pub struct TrajectorySimulator {
    config: SimulationConfig,
}

impl TrajectorySimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Angle on the circle at `tick`, wrapped to [0, 2π)
    pub fn angle_at(&self, tick: u64) -> f64 {
        (tick as f64 * self.config.angular_step_rad) % TAU
    }

    /// Position at `tick`. Identical inputs always give bit-identical output.
    pub fn position_at(&self, tick: u64) -> Position {
        let angle = self.angle_at(tick);
        let c = &self.config;

        Position {
            latitude: c.center_lat + c.radius_deg * angle.cos(),
            longitude: c.center_lon + c.radius_deg * angle.sin(),
            altitude: c.base_altitude_m + c.altitude_amplitude_m * (angle * 2.0).sin(),
        }
    }
}

/// Synthetic ground speed: a sawtooth from 25 to 34 m/s
pub fn speed_at(tick: u64) -> f64 {
    BASE_SPEED_MPS + (tick % 10) as f64
}

/// Synthetic battery level: drains from 100 and resets every 15 ticks,
/// never reported below 85
pub fn battery_at(tick: u64) -> i64 {
    (100 - (tick % 15) as i64).max(MIN_SIM_BATTERY_PERCENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> TrajectorySimulator {
        TrajectorySimulator::new(SimulationConfig::default())
    }

    #[test]
    fn test_tick_zero_starts_east_of_center() {
        let pos = simulator().position_at(0);
        assert_eq!(pos.latitude, 39.9334 + 0.001);
        assert_eq!(pos.longitude, 32.8597);
        assert_eq!(pos.altitude, 100.0);
    }

    #[test]
    fn test_trajectory_stays_on_circle() {
        let sim = simulator();
        for tick in 0..200 {
            let pos = sim.position_at(tick);
            let dlat = pos.latitude - 39.9334;
            let dlon = pos.longitude - 32.8597;
            let r = (dlat * dlat + dlon * dlon).sqrt();
            assert!((r - 0.001).abs() < 1e-9, "tick {} off the circle: r = {}", tick, r);
            assert!((80.0..=120.0).contains(&pos.altitude));
        }
    }

    #[test]
    fn test_two_runs_are_bit_identical() {
        let a = simulator();
        let b = simulator();
        for tick in (0..1000).chain([u64::MAX - 1, u64::MAX]) {
            let pa = a.position_at(tick);
            let pb = b.position_at(tick);
            assert_eq!(pa.latitude.to_bits(), pb.latitude.to_bits());
            assert_eq!(pa.longitude.to_bits(), pb.longitude.to_bits());
            assert_eq!(pa.altitude.to_bits(), pb.altitude.to_bits());
        }
    }

    #[test]
    fn test_altitude_runs_at_double_frequency() {
        let mut config = SimulationConfig::default();
        config.angular_step_rad = std::f64::consts::FRAC_PI_4;
        let sim = TrajectorySimulator::new(config);

        // angle π/4 puts altitude at its peak, π/2 back to base
        assert!((sim.position_at(1).altitude - 120.0).abs() < 1e-9);
        assert!((sim.position_at(2).altitude - 100.0).abs() < 1e-9);
        assert!((sim.position_at(3).altitude - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_wraps() {
        let sim = simulator();
        for tick in [0u64, 62, 63, 1_000_000, u64::MAX] {
            let angle = sim.angle_at(tick);
            assert!((0.0..TAU).contains(&angle), "angle {} out of range at tick {}", angle, tick);
        }
    }

    #[test]
    fn test_battery_in_range_at_boundaries() {
        for tick in [0u64, 1, 14, 15, 16, 29, 30, u64::MAX - 1, u64::MAX] {
            let battery = battery_at(tick);
            assert!((0..=100).contains(&battery), "battery {} at tick {}", battery, tick);
            assert!(battery >= MIN_SIM_BATTERY_PERCENT);
        }
        assert_eq!(battery_at(0), 100);
        assert_eq!(battery_at(14), 86);
        assert_eq!(battery_at(15), 100);
    }

    #[test]
    fn test_speed_sawtooth() {
        assert_eq!(speed_at(0), 25.0);
        assert_eq!(speed_at(9), 34.0);
        assert_eq!(speed_at(10), 25.0);
        assert_eq!(speed_at(u64::MAX), 30.0);
    }
}
