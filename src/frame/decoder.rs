//! # Frame Decoder
//!
//! Decodes 24-byte wire frames into positions. No range validation is done
//! here; a frame carrying NaN or out-of-range degrees decodes as-is.

use super::protocol::*;
use crate::error::{GroundStationError, Result};

/// Decode a complete position frame
///
/// # Arguments
///
/// * `frame` - Frame bytes, must be exactly 24 bytes long
///
/// # Returns
///
/// * `Result<Position>` - Decoded position
///
/// # Errors
///
/// Returns `FrameLength` carrying the actual length if `frame` is not 24 bytes.
/// A partial position is never returned.
pub fn decode_position_frame(frame: &[u8]) -> Result<Position> {
    let frame: &RawFrame = frame
        .try_into()
        .map_err(|_| GroundStationError::FrameLength { actual: frame.len() })?;

    Ok(Position {
        latitude: read_f64_le(frame, LATITUDE_OFFSET),
        longitude: read_f64_le(frame, LONGITUDE_OFFSET),
        altitude: read_f64_le(frame, ALTITUDE_OFFSET),
    })
}

fn read_f64_le(frame: &RawFrame, offset: usize) -> f64 {
    let mut field = [0u8; FRAME_FIELD_SIZE];
    field.copy_from_slice(&frame[offset..offset + FRAME_FIELD_SIZE]);
    f64::from_le_bytes(field)
}
