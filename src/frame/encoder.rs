//! # Frame Encoder
//!
//! Encodes a position into a 24-byte wire frame.

use super::protocol::*;

/// Encode a position into a complete frame
///
/// # Arguments
///
/// * `position` - Latitude, longitude and altitude to encode
///
/// # Returns
///
/// * `RawFrame` - 24 bytes: latitude, longitude, altitude as little-endian f64
///
/// # Examples
///
/// ```
/// use ground_station::frame::encoder::encode_position_frame;
/// use ground_station::frame::protocol::Position;
///
/// let frame = encode_position_frame(&Position::new(39.9208, 32.8541, 890.0));
/// assert_eq!(frame.len(), 24);
/// ```
pub fn encode_position_frame(position: &Position) -> RawFrame {
    let mut frame = [0u8; FRAME_SIZE];

    frame[LATITUDE_OFFSET..LATITUDE_OFFSET + FRAME_FIELD_SIZE]
        .copy_from_slice(&position.latitude.to_le_bytes());
    frame[LONGITUDE_OFFSET..LONGITUDE_OFFSET + FRAME_FIELD_SIZE]
        .copy_from_slice(&position.longitude.to_le_bytes());
    frame[ALTITUDE_OFFSET..ALTITUDE_OFFSET + FRAME_FIELD_SIZE]
        .copy_from_slice(&position.altitude.to_le_bytes());

    frame
}
