//! # MBTiles Archive Reader
//!
//! Read-only access to an MBTiles file (SQLite with a `tiles` table keyed by
//! `zoom_level`, `tile_column` and TMS `tile_row`).
//!
//! Connections are kept in a small idle pool. A lookup checks one out, runs
//! its query and hands it back, so concurrent lookups each get their own
//! connection and never queue behind one another.

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::coords::{flip_row, TileKey, TmsRow};
use crate::error::{GroundStationError, Result};

const TILE_QUERY: &str =
    "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3";

/// Idle connections kept around between requests
const MAX_IDLE_CONNECTIONS: usize = 8;

/// Anything that can resolve an archive-addressed tile to PNG bytes
pub trait TileSource: Send + Sync + 'static {
    /// Look up a tile. `Ok(None)` means the archive has no such tile.
    fn lookup(&self, key: &TileKey<TmsRow>) -> Result<Option<Bytes>>;
}

/// One row of the archive inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileInventoryEntry {
    pub zoom: u32,
    pub column: u32,
    pub tms_row: u32,
    /// `None` when the stored row lies outside the grid for its zoom
    pub xyz_row: Option<u32>,
    pub size_bytes: u64,
}

/// MBTiles archive opened read-only
pub struct MbTilesArchive {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl std::fmt::Debug for MbTilesArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MbTilesArchive")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl MbTilesArchive {
    /// Open an archive and verify it has a readable `tiles` table
    ///
    /// # Errors
    ///
    /// Returns `ArchiveUnavailable` if the file is missing, is not a SQLite
    /// database, or has no `tiles` table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.is_file() {
            return Err(unavailable(&path, "file not found"));
        }

        let conn = open_read_only(&path).map_err(|e| unavailable(&path, e))?;
        conn.prepare(TILE_QUERY).map_err(|e| unavailable(&path, e))?;

        info!("Opened tile archive {}", path.display());
        Ok(Self {
            path,
            idle: Mutex::new(vec![conn]),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name/value pairs from the `metadata` table, empty if the table is absent
    pub fn metadata(&self) -> Result<Vec<(String, String)>> {
        self.with_connection(|conn| {
            let has_table: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
                [],
                |row| row.get(0),
            )?;
            if !has_table {
                return Ok(Vec::new());
            }

            let mut stmt = conn.prepare("SELECT name, value FROM metadata ORDER BY name")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
    }

    /// Every tile in the archive with its size, ordered by zoom, column, row
    pub fn inventory(&self) -> Result<Vec<TileInventoryEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT zoom_level, tile_column, tile_row, length(tile_data) FROM tiles \
                 ORDER BY zoom_level, tile_column, tile_row",
            )?;
            let rows = stmt.query_map([], |row| {
                let zoom: u32 = row.get(0)?;
                let tms_row: u32 = row.get(2)?;
                Ok(TileInventoryEntry {
                    zoom,
                    column: row.get(1)?,
                    tms_row,
                    xyz_row: flip_row(zoom, tms_row).ok(),
                    size_bytes: row.get::<_, Option<i64>>(3)?.unwrap_or(0).max(0) as u64,
                })
            })?;
            rows.collect()
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.checkout()?;
        match f(&conn) {
            Ok(value) => {
                self.checkin(conn);
                Ok(value)
            }
            // A failed connection is dropped rather than reused
            Err(e) => Err(GroundStationError::TileLookup(e.to_string())),
        }
    }

    fn checkout(&self) -> Result<Connection> {
        if let Some(conn) = self.idle.lock().pop() {
            return Ok(conn);
        }

        debug!("Opening additional connection to {}", self.path.display());
        open_read_only(&self.path).map_err(|e| GroundStationError::TileLookup(e.to_string()))
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }
}

impl TileSource for MbTilesArchive {
    fn lookup(&self, key: &TileKey<TmsRow>) -> Result<Option<Bytes>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(TILE_QUERY)?;
            let blob: Option<Vec<u8>> = stmt
                .query_row((key.zoom, key.column, key.row.0), |row| row.get(0))
                .optional()?;
            Ok(blob.map(Bytes::from))
        })
    }
}

fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn unavailable(path: &Path, reason: impl std::fmt::Display) -> GroundStationError {
    GroundStationError::ArchiveUnavailable {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
pub mod fixtures {
    use rusqlite::Connection;
    use std::path::{Path, PathBuf};

    /// Tile bytes stored at zoom 2, column 3, TMS row 2 (XYZ row 1)
    pub const SAMPLE_TILE: &[u8] = b"\x89PNG\r\n\x1a\nsample-tile";

    /// Write a small MBTiles archive into `dir`
    pub fn create_archive(dir: &Path) -> PathBuf {
        let path = dir.join("fixture.mbtiles");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT, value TEXT);
             CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);
             INSERT INTO metadata VALUES ('name', 'fixture'), ('format', 'png');",
        )
        .unwrap();

        let insert = "INSERT INTO tiles VALUES (?1, ?2, ?3, ?4)";
        conn.execute(insert, (2u32, 3u32, 2u32, SAMPLE_TILE)).unwrap();
        conn.execute(insert, (0u32, 0u32, 0u32, &b"\x89PNGworld"[..])).unwrap();
        conn.execute(insert, (1u32, 1u32, 0u32, &b"\x89PNGz1"[..])).unwrap();
        path
    }
}
