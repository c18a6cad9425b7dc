//! On-chip style operand caches
//!
//! Both caches hold the full working set for one invocation as a single
//! flat buffer indexed `[tile][lane][k]`. A lane is a row of A for the
//! activation cache and a column of W for the weight cache. Every slot is
//! written by exactly one loader iteration, so tiles load independently.

use mxint_core::dims::{Dims, COL_TILE, ROW_TILE};
use mxint_core::quant::dequantize_at;
use rayon::prelude::*;

/// Entire activation matrix, one `ROW_TILE x K` slice per row tile
#[derive(Debug, Clone)]
pub struct ActivationCache {
    data: Vec<i8>,
    k: usize,
}

impl ActivationCache {
    /// Phase 1: copy A[M, K] into `[m_tile][row][k]` slots.
    ///
    /// `activations` must hold exactly `dims.activation_len()` values.
    pub fn load(dims: &Dims, activations: &[i8], parallel: bool) -> Self {
        let k = dims.k();
        let tile_len = ROW_TILE * k;
        let mut data = vec![0i8; dims.num_m_tiles() * tile_len];

        let load_tile = |(m_tile, slot): (usize, &mut [i8])| {
            for (i, row) in slot.chunks_exact_mut(k).enumerate() {
                let m_idx = m_tile * ROW_TILE + i;
                row.copy_from_slice(&activations[m_idx * k..(m_idx + 1) * k]);
            }
        };

        if parallel {
            data.par_chunks_mut(tile_len).enumerate().for_each(load_tile);
        } else {
            data.chunks_mut(tile_len).enumerate().for_each(load_tile);
        }

        Self { data, k }
    }

    /// The `ROW_TILE x K` slice for one row tile, row-major
    #[inline]
    pub fn tile(&self, m_tile: usize) -> &[i8] {
        let tile_len = ROW_TILE * self.k;
        &self.data[m_tile * tile_len..(m_tile + 1) * tile_len]
    }

    /// Cached value for row `i` of tile `m_tile` at depth `k`
    #[inline]
    pub fn get(&self, m_tile: usize, i: usize, k: usize) -> i8 {
        self.data[(m_tile * ROW_TILE + i) * self.k + k]
    }

    pub fn num_tiles(&self) -> usize {
        self.data.len() / (ROW_TILE * self.k)
    }

    /// Resident size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Entire dequantized weight matrix, one `COL_TILE x K` slice per column tile
#[derive(Debug, Clone)]
pub struct WeightCache {
    data: Vec<i8>,
    k: usize,
}

impl WeightCache {
    /// Phase 2: dequantize W into `[n_tile][col][k]` slots.
    ///
    /// Each weight is unpacked exactly once here; tile pairs only ever read
    /// the cached int8 values. `packed` and `scales` must match `dims`.
    pub fn load(dims: &Dims, packed: &[u8], scales: &[u8], parallel: bool) -> Self {
        let k = dims.k();
        let n = dims.n();
        let tile_len = COL_TILE * k;
        let mut data = vec![0i8; dims.num_n_tiles() * tile_len];

        let load_tile = |(n_tile, slot): (usize, &mut [i8])| {
            for (j, column) in slot.chunks_exact_mut(k).enumerate() {
                let n_idx = n_tile * COL_TILE + j;
                for (kk, w) in column.iter_mut().enumerate() {
                    *w = dequantize_at(packed, scales, kk * n + n_idx);
                }
            }
        };

        if parallel {
            data.par_chunks_mut(tile_len).enumerate().for_each(load_tile);
        } else {
            data.chunks_mut(tile_len).enumerate().for_each(load_tile);
        }

        Self { data, k }
    }

    /// The `COL_TILE x K` slice for one column tile, column-major
    #[inline]
    pub fn tile(&self, n_tile: usize) -> &[i8] {
        let tile_len = COL_TILE * self.k;
        &self.data[n_tile * tile_len..(n_tile + 1) * tile_len]
    }

    /// Cached value for column `j` of tile `n_tile` at depth `k`
    #[inline]
    pub fn get(&self, n_tile: usize, j: usize, k: usize) -> i8 {
        self.data[(n_tile * COL_TILE + j) * self.k + k]
    }

    pub fn num_tiles(&self) -> usize {
        self.data.len() / (COL_TILE * self.k)
    }

    /// Resident size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxint_core::quant::dequantize_matrix;

    fn ramp_activations(dims: &Dims) -> Vec<i8> {
        (0..dims.activation_len()).map(|i| ((i % 251) as i32 - 125) as i8).collect()
    }

    fn ramp_weights(dims: &Dims) -> (Vec<u8>, Vec<u8>) {
        let packed = (0..dims.packed_len()).map(|i| (i * 37 % 256) as u8).collect();
        let scales = (0..dims.scales_len()).map(|i| (i % 4) as u8).collect();
        (packed, scales)
    }

    #[test]
    fn test_activation_cache_layout() {
        let dims = Dims::new(32, 48, 16).unwrap();
        let a = ramp_activations(&dims);
        let cache = ActivationCache::load(&dims, &a, false);

        assert_eq!(cache.num_tiles(), 2);
        assert_eq!(cache.size_bytes(), 32 * 48);
        for m in 0..32 {
            for k in 0..48 {
                assert_eq!(cache.get(m / ROW_TILE, m % ROW_TILE, k), a[m * 48 + k]);
            }
        }
        assert_eq!(cache.tile(1)[0], a[16 * 48]);
    }

    #[test]
    fn test_weight_cache_holds_dequantized_columns() {
        let dims = Dims::new(16, 32, 48).unwrap();
        let (packed, scales) = ramp_weights(&dims);
        let cache = WeightCache::load(&dims, &packed, &scales, false);
        let w = dequantize_matrix(&packed, &scales, 32, 48).unwrap();

        assert_eq!(cache.num_tiles(), 3);
        for n in 0..48 {
            for k in 0..32 {
                assert_eq!(cache.get(n / COL_TILE, n % COL_TILE, k), w[k * 48 + n]);
            }
        }
        // column-major within a tile
        assert_eq!(cache.tile(2)[1], w[48 + 32]);
    }

    #[test]
    fn test_parallel_load_matches_sequential() {
        let dims = Dims::new(64, 64, 64).unwrap();
        let a = ramp_activations(&dims);
        let (packed, scales) = ramp_weights(&dims);

        let seq_a = ActivationCache::load(&dims, &a, false);
        let par_a = ActivationCache::load(&dims, &a, true);
        assert_eq!(seq_a.data, par_a.data);

        let seq_w = WeightCache::load(&dims, &packed, &scales, false);
        let par_w = WeightCache::load(&dims, &packed, &scales, true);
        assert_eq!(seq_w.data, par_w.data);
    }
}
