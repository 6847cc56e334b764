//! Splits an encode request into a deterministic grid of tiles.
//!
//! `columns = floor(sqrt(tiles))` and `rows = tiles / columns`, both with
//! truncating integer arithmetic. When `tiles` is not an exact
//! `columns * rows` product fewer tiles than requested are produced, and the
//! `width % columns` / `height % rows` remainder pixels are never covered.
//! Descriptors are emitted column by column: the outer loop walks X, the inner
//! loop walks Y.
//!
//! Stepping `x += tile_width` while `x < width` would emit an extra sliver
//! column (and row) whenever the frame does not divide evenly. The grid is
//! capped at `columns * rows` instead, so no sliver tiles exist.

use tilecast_model::{EncodeRequest, TileDescriptor};

/// Grid dimensions derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileGrid {
    pub fn for_request(request: &EncodeRequest) -> Self {
        let (columns, rows) = columns_rows(request.tile_count);
        let tile_width = request.width.checked_div(columns).unwrap_or(0);
        let tile_height = request.height.checked_div(rows).unwrap_or(0);

        Self {
            columns,
            rows,
            tile_width,
            tile_height,
        }
    }

    /// A grid with a zero-sized cell emits nothing.
    pub fn is_empty(&self) -> bool {
        self.columns == 0 || self.rows == 0 || self.tile_width == 0 || self.tile_height == 0
    }

    pub fn tile_count(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.columns * self.rows
        }
    }
}

fn columns_rows(tiles: u32) -> (u32, u32) {
    let columns = tiles.isqrt();
    let rows = tiles.checked_div(columns).unwrap_or(0);
    (columns, rows)
}

/// Lazily partition `request`. Each call starts a fresh sequence.
pub fn partition(request: &EncodeRequest) -> TilePartition {
    TilePartition {
        grid: TileGrid::for_request(request),
        source_file_name: request.source_file_name(),
        source_path: request.source_path.clone(),
        column: 0,
        row: 0,
        index: 0,
    }
}

#[derive(Debug, Clone)]
pub struct TilePartition {
    grid: TileGrid,
    source_file_name: String,
    source_path: String,
    column: u32,
    row: u32,
    index: u32,
}

impl TilePartition {
    pub fn grid(&self) -> TileGrid {
        self.grid
    }
}

impl Iterator for TilePartition {
    type Item = TileDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.grid.is_empty() || self.column >= self.grid.columns {
            return None;
        }

        let descriptor = TileDescriptor {
            index: self.index,
            source_file_name: self.source_file_name.clone(),
            source_path: self.source_path.clone(),
            origin_x: self.column * self.grid.tile_width,
            origin_y: self.row * self.grid.tile_height,
            tile_width: self.grid.tile_width,
            tile_height: self.grid.tile_height,
        };

        self.index += 1;
        self.row += 1;
        if self.row == self.grid.rows {
            self.row = 0;
            self.column += 1;
        }

        Some(descriptor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.tile_count().saturating_sub(self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TilePartition {}
