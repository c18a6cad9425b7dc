//! Matrix dimensions and tiling constants
//!
//! Tile and group sizes are fixed at build time. `Dims` carries the
//! per-invocation M/K/N triple and is only constructible through
//! [`Dims::new`], which enforces every precondition the engine relies on.

use crate::error::{Error, Result};
use serde::Serialize;

/// Rows of A (and C) covered by one tile
pub const ROW_TILE: usize = 16;

/// Columns of W (and C) covered by one tile
pub const COL_TILE: usize = 16;

/// Consecutive linearly-indexed weights sharing one scale code
pub const GROUP_SIZE: usize = 16;

/// Reference sizing: 8 row tiles, 4096-deep reduction, 32 column tiles
pub const REFERENCE_M: usize = 128;
pub const REFERENCE_K: usize = 4096;
pub const REFERENCE_N: usize = 512;

/// Largest magnitude of a single int8 x int8 product: (-128) * (-128)
pub const MAX_PRODUCT_MAGNITUDE: i64 = 128 * 128;

/// Deepest reduction an int32 accumulator can absorb without overflow,
/// rounded down to a whole number of scale groups.
pub const MAX_REDUCTION_DEPTH: usize = {
    let raw = (i32::MAX as i64 / MAX_PRODUCT_MAGNITUDE) as usize;
    raw - raw % GROUP_SIZE
};

// A full reference-sized reduction must fit in the accumulator.
const _: () = assert!(REFERENCE_K <= MAX_REDUCTION_DEPTH);
const _: () = assert!(REFERENCE_M % ROW_TILE == 0 && REFERENCE_N % COL_TILE == 0);

/// Validated GEMM dimensions: C[M, N] = A[M, K] x W[K, N]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dims {
    m: usize,
    k: usize,
    n: usize,
}

impl Dims {
    /// Validate a dimension triple.
    ///
    /// M must be a positive multiple of [`ROW_TILE`], N a positive multiple of
    /// [`COL_TILE`], and K a positive multiple of [`GROUP_SIZE`] no larger than
    /// [`MAX_REDUCTION_DEPTH`].
    pub fn new(m: usize, k: usize, n: usize) -> Result<Self> {
        if m == 0 || m % ROW_TILE != 0 {
            return Err(Error::InvalidDimension(format!(
                "M must be a positive multiple of {}, got {}",
                ROW_TILE, m
            )));
        }
        if n == 0 || n % COL_TILE != 0 {
            return Err(Error::InvalidDimension(format!(
                "N must be a positive multiple of {}, got {}",
                COL_TILE, n
            )));
        }
        if k == 0 || k % GROUP_SIZE != 0 {
            return Err(Error::InvalidDimension(format!(
                "K must be a positive multiple of {}, got {}",
                GROUP_SIZE, k
            )));
        }
        check_accumulator_bound(k)?;

        Ok(Self { m, k, n })
    }

    /// The reference sizing (128 x 4096 x 512)
    pub fn reference() -> Self {
        Self { m: REFERENCE_M, k: REFERENCE_K, n: REFERENCE_N }
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn num_m_tiles(&self) -> usize {
        self.m / ROW_TILE
    }

    pub fn num_n_tiles(&self) -> usize {
        self.n / COL_TILE
    }

    /// Element count of the activation matrix A
    pub fn activation_len(&self) -> usize {
        self.m * self.k
    }

    /// Element count of the logical (unpacked) weight matrix W
    pub fn weight_len(&self) -> usize {
        self.k * self.n
    }

    /// Byte count of the packed weight buffer (two nibbles per byte)
    pub fn packed_len(&self) -> usize {
        self.weight_len().div_ceil(2)
    }

    /// Number of scale codes (one per group)
    pub fn scales_len(&self) -> usize {
        self.weight_len() / GROUP_SIZE
    }

    /// Element count of the result matrix C
    pub fn output_len(&self) -> usize {
        self.m * self.n
    }

    /// Integer operations per invocation (one multiply + one add per MAC)
    pub fn ops(&self) -> u64 {
        2 * self.m as u64 * self.k as u64 * self.n as u64
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M={}, K={}, N={}", self.m, self.k, self.n)
    }
}

/// Static accumulator bound: `k * 128 * 128` must stay inside `i32`.
pub fn check_accumulator_bound(k: usize) -> Result<()> {
    if k > MAX_REDUCTION_DEPTH {
        return Err(Error::AccumulatorOverflow(format!(
            "K={} exceeds the int32 accumulation limit of {} (|a*w| <= {})",
            k, MAX_REDUCTION_DEPTH, MAX_PRODUCT_MAGNITUDE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_dims() {
        let dims = Dims::reference();
        assert_eq!(dims, Dims::new(128, 4096, 512).unwrap());
        assert_eq!(dims.num_m_tiles(), 8);
        assert_eq!(dims.num_n_tiles(), 32);
        assert_eq!(dims.packed_len(), 4096 * 512 / 2);
        assert_eq!(dims.scales_len(), 4096 * 512 / 16);
    }

    #[test]
    fn test_smallest_legal_config() {
        let dims = Dims::new(ROW_TILE, GROUP_SIZE, COL_TILE).unwrap();
        assert_eq!(dims.num_m_tiles(), 1);
        assert_eq!(dims.num_n_tiles(), 1);
        assert_eq!(dims.scales_len(), 16);
    }

    #[test]
    fn test_rejects_unaligned() {
        assert!(matches!(Dims::new(15, 16, 16), Err(Error::InvalidDimension(_))));
        assert!(matches!(Dims::new(16, 16, 24), Err(Error::InvalidDimension(_))));
        assert!(matches!(Dims::new(16, 8, 16), Err(Error::InvalidDimension(_))));
        assert!(matches!(Dims::new(0, 16, 16), Err(Error::InvalidDimension(_))));
        assert!(matches!(Dims::new(16, 0, 16), Err(Error::InvalidDimension(_))));
    }

    #[test]
    fn test_accumulator_bound() {
        assert_eq!(MAX_REDUCTION_DEPTH % GROUP_SIZE, 0);
        let worst = MAX_REDUCTION_DEPTH as i64 * MAX_PRODUCT_MAGNITUDE;
        assert!(worst <= i32::MAX as i64);
        // one more group would overflow
        let next = (MAX_REDUCTION_DEPTH + GROUP_SIZE) as i64 * MAX_PRODUCT_MAGNITUDE;
        assert!(next > i32::MAX as i64);

        assert!(Dims::new(16, MAX_REDUCTION_DEPTH, 16).is_ok());
        assert!(matches!(
            Dims::new(16, MAX_REDUCTION_DEPTH + GROUP_SIZE, 16),
            Err(Error::AccumulatorOverflow(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dims::new(16, 32, 48).unwrap().to_string(), "M=16, K=32, N=48");
    }
}
