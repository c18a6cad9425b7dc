//! Three-phase tiled engine
//!
//! 1. Load every activation tile into the activation cache.
//! 2. Dequantize every weight tile into the weight cache, once.
//! 3. Sweep all (row tile, column tile) pairs, each producing one output tile.
//!
//! Phases 1 and 2 complete before phase 3 starts; phase 3 only reads the
//! caches. With a parallel backend, tile pairs are distributed across the
//! pool and each worker keeps its own working buffers.

use crate::cache::{ActivationCache, WeightCache};
use crate::tile::{OutputTile, TileComputeUnit};
use crate::writer::OutputWriter;
use crate::CpuBackend;
use mxint_core::dims::Dims;
use mxint_core::error::{Error, Result};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Wall-clock time spent in each phase of one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub load_activations: Duration,
    pub load_weights: Duration,
    pub compute: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.load_activations + self.load_weights + self.compute
    }
}

/// Both caches, fully populated and read-only
#[derive(Debug, Clone)]
pub struct LoadedCaches {
    dims: Dims,
    activations: ActivationCache,
    weights: WeightCache,
}

impl LoadedCaches {
    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn activations(&self) -> &ActivationCache {
        &self.activations
    }

    pub fn weights(&self) -> &WeightCache {
        &self.weights
    }

    /// Compute one tile pair with caller-owned working buffers
    pub fn compute_tile_with(
        &self,
        unit: &mut TileComputeUnit,
        m_tile: usize,
        n_tile: usize,
    ) -> Result<OutputTile> {
        self.check_tile(m_tile, n_tile)?;
        if unit.depth() != self.dims.k() {
            return Err(Error::InvalidShape(format!(
                "Tile unit depth {} does not match K={}",
                unit.depth(),
                self.dims.k()
            )));
        }
        Ok(unit.compute(&self.activations, &self.weights, m_tile, n_tile))
    }

    /// Compute one tile pair with fresh working buffers
    pub fn compute_tile(&self, m_tile: usize, n_tile: usize) -> Result<OutputTile> {
        self.compute_tile_with(&mut TileComputeUnit::new(self.dims.k()), m_tile, n_tile)
    }

    fn check_tile(&self, m_tile: usize, n_tile: usize) -> Result<()> {
        if m_tile >= self.dims.num_m_tiles() || n_tile >= self.dims.num_n_tiles() {
            return Err(Error::InvalidShape(format!(
                "Tile ({}, {}) out of range for {}x{} tiles",
                m_tile,
                n_tile,
                self.dims.num_m_tiles(),
                self.dims.num_n_tiles()
            )));
        }
        Ok(())
    }
}

/// Cache-resident MXINT4 x INT8 matmul engine
#[derive(Debug)]
pub struct Engine {
    backend: CpuBackend,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    pub fn new(backend: CpuBackend) -> Result<Self> {
        let pool = backend.build_pool()?;
        log::debug!(
            "Engine ready: parallel={}, threads={}",
            backend.parallel,
            backend.effective_threads()
        );
        Ok(Self { backend, pool })
    }

    pub fn backend(&self) -> &CpuBackend {
        &self.backend
    }

    /// C[M, N] = A[M, K] x dequant(W)[K, N]
    pub fn compute(
        &self,
        activations: &[i8],
        weights_packed: &[u8],
        scales: &[u8],
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<Vec<i32>> {
        let dims = Dims::new(m, k, n)?;
        let mut result = vec![0i32; dims.output_len()];
        self.compute_into(&dims, activations, weights_packed, scales, &mut result)?;
        Ok(result)
    }

    /// Like [`Engine::compute`], writing every cell of `result`
    pub fn compute_into(
        &self,
        dims: &Dims,
        activations: &[i8],
        weights_packed: &[u8],
        scales: &[u8],
        result: &mut [i32],
    ) -> Result<PhaseTimings> {
        check_len("Result", result.len(), dims.output_len())?;

        let (caches, mut timings) = self.load_timed(dims, activations, weights_packed, scales)?;

        let start = Instant::now();
        self.install(|| self.run_tiles(&caches, result));
        timings.compute = start.elapsed();

        log::info!(
            "{}: {} tile pairs in {:.2?} (load A {:.2?}, load W {:.2?}, compute {:.2?})",
            dims,
            dims.num_m_tiles() * dims.num_n_tiles(),
            timings.total(),
            timings.load_activations,
            timings.load_weights,
            timings.compute
        );

        Ok(timings)
    }

    /// Run phases 1 and 2 only
    pub fn load(
        &self,
        dims: &Dims,
        activations: &[i8],
        weights_packed: &[u8],
        scales: &[u8],
    ) -> Result<LoadedCaches> {
        self.load_timed(dims, activations, weights_packed, scales).map(|(caches, _)| caches)
    }

    fn load_timed(
        &self,
        dims: &Dims,
        activations: &[i8],
        weights_packed: &[u8],
        scales: &[u8],
    ) -> Result<(LoadedCaches, PhaseTimings)> {
        check_len("Activation", activations.len(), dims.activation_len())?;
        check_len("Packed weight", weights_packed.len(), dims.packed_len())?;
        check_len("Scale table", scales.len(), dims.scales_len())?;

        let parallel = self.backend.parallel;
        let mut timings = PhaseTimings::default();

        let start = Instant::now();
        let activations = self.install(|| ActivationCache::load(dims, activations, parallel));
        timings.load_activations = start.elapsed();
        log::debug!(
            "Phase 1: cached {} activation tiles ({} bytes) in {:.2?}",
            activations.num_tiles(),
            activations.size_bytes(),
            timings.load_activations
        );

        let start = Instant::now();
        let weights =
            self.install(|| WeightCache::load(dims, weights_packed, scales, parallel));
        timings.load_weights = start.elapsed();
        log::debug!(
            "Phase 2: dequantized {} weight tiles ({} bytes) in {:.2?}",
            weights.num_tiles(),
            weights.size_bytes(),
            timings.load_weights
        );

        Ok((LoadedCaches { dims: *dims, activations, weights }, timings))
    }

    /// Phase 3: every tile pair, written through the output writer
    fn run_tiles(&self, caches: &LoadedCaches, result: &mut [i32]) {
        let dims = caches.dims;
        let writer = OutputWriter::new(&dims);
        let k = dims.k();

        if !self.backend.parallel {
            let mut unit = TileComputeUnit::new(k);
            for (m_tile, band) in result.chunks_exact_mut(writer.band_len()).enumerate() {
                for n_tile in 0..dims.num_n_tiles() {
                    let tile = unit.compute(&caches.activations, &caches.weights, m_tile, n_tile);
                    writer.write_band(band, &tile);
                }
            }
            return;
        }

        // Each row tile owns a disjoint band of C; column tiles inside a band
        // are computed in parallel and then written into it.
        result.par_chunks_exact_mut(writer.band_len()).enumerate().for_each(|(m_tile, band)| {
            let tiles: Vec<OutputTile> = (0..dims.num_n_tiles())
                .into_par_iter()
                .map_init(
                    || TileComputeUnit::new(k),
                    |unit, n_tile| {
                        log::trace!("tile ({}, {})", m_tile, n_tile);
                        unit.compute(&caches.activations, &caches.weights, m_tile, n_tile)
                    },
                )
                .collect();
            for tile in &tiles {
                writer.write_band(band, tile);
            }
        });
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        // The default backend never builds a dedicated pool
        Self { backend: CpuBackend::default(), pool: None }
    }
}

/// One-shot invocation with the default parallel engine
pub fn compute(
    activations: &[i8],
    weights_packed: &[u8],
    scales: &[u8],
    m: usize,
    k: usize,
    n: usize,
) -> Result<Vec<i32>> {
    Engine::default().compute(activations, weights_packed, scales, m, k, n)
}

fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::InvalidShape(format!(
            "{} buffer size mismatch: expected {}, got {}",
            what, expected, actual
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::reference_matmul;

    fn inputs(dims: &Dims) -> (Vec<i8>, Vec<u8>, Vec<u8>) {
        let a = (0..dims.activation_len()).map(|i| ((i * 7 % 255) as i32 - 127) as i8).collect();
        let packed = (0..dims.packed_len()).map(|i| (i * 13 % 256) as u8).collect();
        let scales = (0..dims.scales_len()).map(|i| (i * 3 % 4) as u8).collect();
        (a, packed, scales)
    }

    #[test]
    fn test_end_to_end_constant() {
        let result = compute(&[1i8; 256], &[0x11u8; 128], &[0u8; 16], 16, 16, 16).unwrap();
        assert_eq!(result, vec![16i32; 256]);
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let dims = Dims::new(48, 64, 80).unwrap();
        let (a, packed, scales) = inputs(&dims);

        let seq = Engine::new(CpuBackend::sequential()).unwrap();
        let par = Engine::new(CpuBackend::new().with_threads(3)).unwrap();
        let expected = reference_matmul(&a, &packed, &scales, 48, 64, 80).unwrap();

        assert_eq!(seq.compute(&a, &packed, &scales, 48, 64, 80).unwrap(), expected);
        assert_eq!(par.compute(&a, &packed, &scales, 48, 64, 80).unwrap(), expected);
    }

    #[test]
    fn test_compute_into_overwrites() {
        let dims = Dims::new(16, 32, 32).unwrap();
        let (a, packed, scales) = inputs(&dims);
        let mut result = vec![i32::MIN; dims.output_len()];

        let engine = Engine::default();
        let timings = engine.compute_into(&dims, &a, &packed, &scales, &mut result).unwrap();
        assert!(timings.total() >= timings.compute);
        assert_eq!(result, reference_matmul(&a, &packed, &scales, 16, 32, 32).unwrap());
    }

    #[test]
    fn test_rejects_bad_buffers() {
        let engine = Engine::default();
        let err = engine.compute(&[0i8; 255], &[0u8; 128], &[0u8; 16], 16, 16, 16);
        assert!(matches!(err, Err(Error::InvalidShape(_))));
        let err = engine.compute(&[0i8; 256], &[0u8; 127], &[0u8; 16], 16, 16, 16);
        assert!(matches!(err, Err(Error::InvalidShape(_))));
        let err = engine.compute(&[0i8; 256], &[0u8; 128], &[0u8; 15], 16, 16, 16);
        assert!(matches!(err, Err(Error::InvalidShape(_))));
        let err = engine.compute(&[0i8; 256], &[0u8; 128], &[0u8; 16], 16, 16, 8);
        assert!(matches!(err, Err(Error::InvalidDimension(_))));

        let dims = Dims::new(16, 16, 16).unwrap();
        let mut short = vec![0i32; 255];
        let err = engine.compute_into(&dims, &[0i8; 256], &[0u8; 128], &[0u8; 16], &mut short);
        assert!(matches!(err, Err(Error::InvalidShape(_))));
    }

    #[test]
    fn test_tile_api_bounds() {
        let dims = Dims::new(32, 16, 16).unwrap();
        let (a, packed, scales) = inputs(&dims);
        let caches = Engine::default().load(&dims, &a, &packed, &scales).unwrap();

        assert!(caches.compute_tile(1, 0).is_ok());
        assert!(caches.compute_tile(2, 0).is_err());
        assert!(caches.compute_tile(0, 1).is_err());
        let mut wrong_depth = TileComputeUnit::new(32);
        assert!(caches.compute_tile_with(&mut wrong_depth, 0, 0).is_err());
    }
}
