//! # Ground Station Library
//!
//! Core of a UAV ground station: telemetry acquisition over a serial radio
//! link and an offline map tile server.
//!
//! The telemetry side polls the vehicle for 24-byte position frames and
//! falls back to a deterministic simulated trajectory whenever the link is
//! down, so consumers always receive a record per poll. The tile side serves
//! PNG tiles from an MBTiles archive over HTTP.

pub mod config;
pub mod error;
pub mod frame;
pub mod link;
pub mod logging;
pub mod telemetry;
pub mod tiles;
