//! # Binary Frame Module
//!
//! Codec for the fixed-size position frame sent by the vehicle.
//!
//! This module handles:
//! - Frame layout constants (3 × little-endian f64, 24 bytes)
//! - Encoding a position into a frame
//! - Decoding a frame back into a position, rejecting any other length

pub mod protocol;
pub mod encoder;
pub mod decoder;
