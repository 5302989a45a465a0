//! # Frame Protocol Constants and Types
//!
//! Wire layout of a position frame. There is no sync byte, length field or
//! checksum: a frame is exactly three IEEE-754 doubles in little-endian order.

/// Size of one encoded `f64` field
pub const FRAME_FIELD_SIZE: usize = 8;

/// Number of fields in a frame (latitude, longitude, altitude)
pub const FRAME_FIELD_COUNT: usize = 3;

/// Total frame size on the wire (24 bytes)
pub const FRAME_SIZE: usize = FRAME_FIELD_SIZE * FRAME_FIELD_COUNT;

/// Byte offsets of each field within a frame
pub const LATITUDE_OFFSET: usize = 0;
pub const LONGITUDE_OFFSET: usize = 8;
pub const ALTITUDE_OFFSET: usize = 16;

/// Raw frame buffer
pub type RawFrame = [u8; FRAME_SIZE];

/// Geographic position carried by a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in meters
    pub altitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}
