//! # CSV Telemetry Logger
//!
//! Appends one row per telemetry record to `telemetry_YYYYMMDD.csv`.
//!
//! A new file is started whenever the local date of the record changes. The
//! header row is written only when the day's file is created, so restarting
//! the station appends to the existing file.

use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use super::publisher::TelemetrySubscriber;
use super::{TelemetryEvent, TelemetryRecord};
use crate::error::Result;

/// Column header of every log file
pub const CSV_HEADER: [&str; 8] = [
    "timestamp",
    "latitude",
    "longitude",
    "altitude",
    "speed",
    "batteryPercent",
    "mode",
    "linkState",
];

/// Daily-rotated CSV sink
pub struct CsvLogger {
    log_dir: PathBuf,
    current: Option<(NaiveDate, csv::Writer<File>)>,
}

impl CsvLogger {
    /// Create a logger writing into `log_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;

        Ok(Self {
            log_dir,
            current: None,
        })
    }

    /// Path of the log file for a given day
    pub fn file_path_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir
            .join(format!("telemetry_{}.csv", date.format("%Y%m%d")))
    }

    /// Append a record, rotating to a new file on date change
    pub fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        let date = record.captured_at().date_naive();
        let rotate = !matches!(&self.current, Some((day, _)) if *day == date);
        if rotate {
            let writer = self.open_writer(date)?;
            self.current = Some((date, writer));
        }

        if let Some((_, writer)) = self.current.as_mut() {
            let position = record.position();
            writer.write_record([
                format_timestamp(&record.captured_at()),
                position.latitude.to_string(),
                position.longitude.to_string(),
                position.altitude.to_string(),
                record.speed().to_string(),
                record.battery_percent().to_string(),
                record.mode().to_string(),
                record.link_state().to_string(),
            ])?;
            writer.flush()?;
        }

        Ok(())
    }

    fn open_writer(&self, date: NaiveDate) -> Result<csv::Writer<File>> {
        let path = self.file_path_for(date);
        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(CSV_HEADER)?;
        }

        info!("Logging telemetry to {}", path.display());
        Ok(writer)
    }
}

impl TelemetrySubscriber for CsvLogger {
    fn name(&self) -> &str {
        "csv"
    }

    fn on_event(&mut self, event: &TelemetryEvent) -> Result<()> {
        match event {
            TelemetryEvent::Record(record) => self.append(record),
            TelemetryEvent::Connectivity(_) => Ok(()),
        }
    }
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::protocol::Position;
    use crate::telemetry::{FlightMode, LinkState};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record_at(day: u32, hour: u32) -> TelemetryRecord {
        let at = Local.with_ymd_and_hms(2024, 5, day, hour, 30, 0).unwrap();
        TelemetryRecord::with_timestamp(
            Position::new(39.9334, 32.8597, 120.5),
            27.0,
            93,
            FlightMode::Autonomous,
            LinkState::Simulated,
            at,
        )
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_writes_header_then_rows() {
        let dir = TempDir::new().unwrap();
        let mut logger = CsvLogger::new(dir.path()).unwrap();

        logger.append(&record_at(1, 10)).unwrap();
        logger.append(&record_at(1, 11)).unwrap();

        let path = dir.path().join("telemetry_20240501.csv");
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,latitude,longitude,altitude,speed,batteryPercent,mode,linkState"
        );
        assert_eq!(lines[1], "2024-05-01 10:30:00,39.9334,32.8597,120.5,27,93,AUTONOMOUS,SIMULATED");
    }

    #[test]
    fn test_rotates_on_date_change() {
        let dir = TempDir::new().unwrap();
        let mut logger = CsvLogger::new(dir.path()).unwrap();

        logger.append(&record_at(1, 23)).unwrap();
        logger.append(&record_at(2, 0)).unwrap();

        assert_eq!(read_lines(&dir.path().join("telemetry_20240501.csv")).len(), 2);
        assert_eq!(read_lines(&dir.path().join("telemetry_20240502.csv")).len(), 2);
    }

    #[test]
    fn test_reopening_appends_without_second_header() {
        let dir = TempDir::new().unwrap();
        {
            let mut logger = CsvLogger::new(dir.path()).unwrap();
            logger.append(&record_at(3, 8)).unwrap();
        }
        let mut logger = CsvLogger::new(dir.path()).unwrap();
        logger.append(&record_at(3, 9)).unwrap();

        let lines = read_lines(&dir.path().join("telemetry_20240503.csv"));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp"));
        assert!(!lines[2].starts_with("timestamp"));
    }

    #[test]
    fn test_creates_missing_log_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("logs").join("telemetry");
        let logger = CsvLogger::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(
            logger.file_path_for(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
            nested.join("telemetry_20241231.csv")
        );
    }

    #[test]
    fn test_connectivity_events_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut logger = CsvLogger::new(dir.path()).unwrap();

        let event = TelemetryEvent::Connectivity(crate::telemetry::ConnectivityEvent::connected("up"));
        logger.on_event(&event).unwrap();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
