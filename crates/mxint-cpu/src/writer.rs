//! Scatter completed tiles into the row-major result matrix

use crate::tile::OutputTile;
use mxint_core::dims::{Dims, COL_TILE, ROW_TILE};

/// Places tiles at `C[row_tile * ROW_TILE + i][col_tile * COL_TILE + j]`.
///
/// Tile pairs cover disjoint cells, so writers for different pairs never
/// touch the same element.
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    n: usize,
}

impl OutputWriter {
    pub fn new(dims: &Dims) -> Self {
        Self { n: dims.n() }
    }

    /// Length of the horizontal band of C owned by one row tile
    pub fn band_len(&self) -> usize {
        ROW_TILE * self.n
    }

    /// Write a tile into the full result matrix
    pub fn write(&self, c: &mut [i32], tile: &OutputTile) {
        let band_len = self.band_len();
        let start = tile.row_tile * band_len;
        self.write_band(&mut c[start..start + band_len], tile);
    }

    /// Write a tile into the band of C belonging to its row tile
    pub fn write_band(&self, band: &mut [i32], tile: &OutputTile) {
        debug_assert_eq!(band.len(), self.band_len());
        let col_start = tile.col_tile * COL_TILE;

        for (row, values) in band.chunks_exact_mut(self.n).zip(tile.values.iter()) {
            row[col_start..col_start + COL_TILE].copy_from_slice(values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_with(row_tile: usize, col_tile: usize, base: i32) -> OutputTile {
        let mut values = [[0i32; COL_TILE]; ROW_TILE];
        for (i, row) in values.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = base + (i * COL_TILE + j) as i32;
            }
        }
        OutputTile { row_tile, col_tile, values }
    }

    #[test]
    fn test_write_offsets() {
        let dims = Dims::new(32, 16, 48).unwrap();
        let writer = OutputWriter::new(&dims);
        let mut c = vec![-1i32; dims.output_len()];

        writer.write(&mut c, &tile_with(1, 2, 1000));

        // first cell of the tile
        assert_eq!(c[16 * 48 + 32], 1000);
        // last cell of the tile
        assert_eq!(c[31 * 48 + 47], 1000 + 255);
        // row 17, col 33
        assert_eq!(c[17 * 48 + 33], 1000 + 17);
        // neighbours untouched
        assert_eq!(c[16 * 48 + 31], -1);
        assert_eq!(c[15 * 48 + 32], -1);
        assert_eq!(c.iter().filter(|&&v| v != -1).count(), 256);
    }

    #[test]
    fn test_all_tiles_cover_matrix_once() {
        let dims = Dims::new(48, 16, 32).unwrap();
        let writer = OutputWriter::new(&dims);
        let mut hits = vec![0u32; dims.output_len()];
        let mut c = vec![0i32; dims.output_len()];

        for rt in 0..dims.num_m_tiles() {
            for ct in 0..dims.num_n_tiles() {
                let tile = tile_with(rt, ct, 1);
                writer.write(&mut c, &tile);
                for (h, v) in hits.iter_mut().zip(&c) {
                    if *v != 0 {
                        *h += 1;
                    }
                }
                c.fill(0);
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
    }
}
