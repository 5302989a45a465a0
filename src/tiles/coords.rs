//! Tile coordinate mapping between the public XYZ ("slippy map") scheme and
//! the TMS rows stored in MBTiles archives.
//!
//! XYZ counts rows from the top of the map, TMS from the bottom. The two
//! conventions are separate types so a row can't be used in the wrong one
//! without going through [`flip_row`].

use std::fmt;

use crate::error::TileAddressError;

/// Highest zoom level accepted
pub const MAX_ZOOM: u32 = 30;

/// Row in XYZ convention (origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XyzRow(pub u32);

/// Row in TMS convention (origin bottom-left), as stored in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TmsRow(pub u32);

/// Tile address with its row in convention `R`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey<R> {
    pub zoom: u32,
    pub column: u32,
    pub row: R,
}

impl TileKey<XyzRow> {
    pub fn xyz(zoom: u32, column: u32, row: u32) -> Self {
        Self {
            zoom,
            column,
            row: XyzRow(row),
        }
    }

    /// Convert to the row convention stored in the archive
    pub fn to_archive(self) -> Result<TileKey<TmsRow>, TileAddressError> {
        Ok(TileKey {
            zoom: self.zoom,
            column: self.column,
            row: TmsRow(flip_row(self.zoom, self.row.0)?),
        })
    }
}

impl TileKey<TmsRow> {
    pub fn tms(zoom: u32, column: u32, row: u32) -> Self {
        Self {
            zoom,
            column,
            row: TmsRow(row),
        }
    }

    /// Convert back to the public row convention
    pub fn to_public(self) -> Result<TileKey<XyzRow>, TileAddressError> {
        Ok(TileKey {
            zoom: self.zoom,
            column: self.column,
            row: XyzRow(flip_row(self.zoom, self.row.0)?),
        })
    }
}

impl fmt::Display for TileKey<XyzRow> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.column, self.row.0)
    }
}

impl fmt::Display for TileKey<TmsRow> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{} (tms)", self.zoom, self.column, self.row.0)
    }
}

/// Number of rows (and columns) in the grid at `zoom`
pub fn grid_size(zoom: u32) -> Result<u64, TileAddressError> {
    if zoom > MAX_ZOOM {
        return Err(TileAddressError::ZoomOutOfRange(zoom));
    }
    Ok(1u64 << zoom)
}

/// Mirror a row across the grid: `2^zoom - 1 - row`
///
/// The mapping is its own inverse, so it converts XYZ to TMS and back.
///
/// # Errors
///
/// - `ZoomOutOfRange` if `zoom` is above [`MAX_ZOOM`]
/// - `RowOutOfRange` if `row` is not in `[0, 2^zoom - 1]`
pub fn flip_row(zoom: u32, row: u32) -> Result<u32, TileAddressError> {
    let size = grid_size(zoom)?;
    if u64::from(row) >= size {
        return Err(TileAddressError::RowOutOfRange { zoom, row });
    }
    Ok((size - 1 - u64::from(row)) as u32)
}
