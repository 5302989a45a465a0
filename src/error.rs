//! # Error Types
//!
//! Custom error types for the ground station using `thiserror`.

use thiserror::Error;

/// Main error type for the ground station
#[derive(Debug, Error)]
pub enum GroundStationError {
    /// Frame did not have the fixed wire size
    #[error("Frame length error: expected 24 bytes, got {actual}")]
    FrameLength { actual: usize },

    /// Transport could not be opened (device absent, busy or hung)
    #[error("Failed to open {port}: {reason}")]
    TransportOpen { port: String, reason: String },

    /// Link dropped mid-session
    #[error("Transport read error: {0}")]
    TransportRead(String),

    /// Command sent to a link manager that has already stopped
    #[error("Telemetry link has stopped")]
    LinkStopped,

    /// Malformed tile coordinate
    #[error("Tile address error: {0}")]
    TileAddress(#[from] TileAddressError),

    /// Tile archive missing or corrupt at startup
    #[error("Tile archive {path} unavailable: {reason}")]
    ArchiveUnavailable { path: String, reason: String },

    /// Transient fault during a single tile lookup
    #[error("Tile lookup failed: {0}")]
    TileLookup(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// CSV sink errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tile coordinates that fall outside the addressable grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileAddressError {
    #[error("zoom {0} exceeds the maximum supported zoom")]
    ZoomOutOfRange(u32),

    #[error("row {row} is outside the grid at zoom {zoom}")]
    RowOutOfRange { zoom: u32, row: u32 },
}

/// Result type alias for the ground station
pub type Result<T> = std::result::Result<T, GroundStationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_length_message_carries_actual_length() {
        let err = GroundStationError::FrameLength { actual: 17 };
        assert_eq!(err.to_string(), "Frame length error: expected 24 bytes, got 17");
    }

    #[test]
    fn test_tile_address_converts() {
        let err: GroundStationError = TileAddressError::RowOutOfRange { zoom: 2, row: 99 }.into();
        assert!(matches!(
            err,
            GroundStationError::TileAddress(TileAddressError::RowOutOfRange { zoom: 2, row: 99 })
        ));
        assert!(err.to_string().contains("row 99"));
    }
}
