//! Tile compute unit: a 16x16 grid of multiply-accumulate cells
//!
//! For one (row tile, column tile) pair the unit stages both cache slices
//! into small working buffers, zeroes its accumulator and runs the full
//! K-deep reduction. The working buffers are stored step-major
//! (`[k][lane]`), so each reduction step reads one contiguous run of
//! `ROW_TILE` activations and one of `COL_TILE` weights and the inner
//! 16x16 update vectorizes.

use crate::cache::{ActivationCache, WeightCache};
use mxint_core::dims::{COL_TILE, ROW_TILE};

/// One completed `ROW_TILE x COL_TILE` block of C
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTile {
    pub row_tile: usize,
    pub col_tile: usize,
    pub values: [[i32; COL_TILE]; ROW_TILE],
}

impl OutputTile {
    pub fn get(&self, i: usize, j: usize) -> i32 {
        self.values[i][j]
    }
}

/// Working buffers for one tile pair, reused across pairs on the same worker
#[derive(Debug, Clone)]
pub struct TileComputeUnit {
    k: usize,
    /// `[k][i]` activations for the current row tile
    a_work: Vec<i8>,
    /// `[k][j]` weights for the current column tile
    w_work: Vec<i8>,
    acc: [[i32; COL_TILE]; ROW_TILE],
}

impl TileComputeUnit {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            a_work: vec![0; k * ROW_TILE],
            w_work: vec![0; k * COL_TILE],
            acc: [[0; COL_TILE]; ROW_TILE],
        }
    }

    pub fn depth(&self) -> usize {
        self.k
    }

    /// Compute one output tile from the resident caches.
    ///
    /// Both tile indices must be in range for the caches.
    pub fn compute(
        &mut self,
        activations: &ActivationCache,
        weights: &WeightCache,
        m_tile: usize,
        n_tile: usize,
    ) -> OutputTile {
        self.stage(activations.tile(m_tile), weights.tile(n_tile));
        self.reduce();

        OutputTile { row_tile: m_tile, col_tile: n_tile, values: self.acc }
    }

    /// Copy the cache slices into the step-major working buffers
    fn stage(&mut self, a_tile: &[i8], w_tile: &[i8]) {
        let k = self.k;
        debug_assert_eq!(a_tile.len(), ROW_TILE * k);
        debug_assert_eq!(w_tile.len(), COL_TILE * k);

        for (i, row) in a_tile.chunks_exact(k).enumerate() {
            for (step, &a) in row.iter().enumerate() {
                self.a_work[step * ROW_TILE + i] = a;
            }
        }
        for (j, column) in w_tile.chunks_exact(k).enumerate() {
            for (step, &w) in column.iter().enumerate() {
                self.w_work[step * COL_TILE + j] = w;
            }
        }
    }

    /// K sequential steps; the 256 cell updates inside a step are independent
    fn reduce(&mut self) {
        self.acc = [[0; COL_TILE]; ROW_TILE];

        for (a_step, w_step) in
            self.a_work.chunks_exact(ROW_TILE).zip(self.w_work.chunks_exact(COL_TILE))
        {
            for (acc_row, &a) in self.acc.iter_mut().zip(a_step) {
                let a = a as i32;
                for (cell, &w) in acc_row.iter_mut().zip(w_step) {
                    *cell += a * w as i32;
                }
            }
        }
    }
}
