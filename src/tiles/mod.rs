//! # Offline Tiles
//!
//! Map tiles served from a local MBTiles archive so the ground station works
//! without internet access.

pub mod archive;
pub mod coords;
pub mod server;

pub use archive::{MbTilesArchive, TileSource};
pub use coords::{TileKey, TmsRow, XyzRow, MAX_ZOOM};
pub use server::{TileServerBuilder, TileServerHandle};
