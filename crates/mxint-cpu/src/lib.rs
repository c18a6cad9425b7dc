//! CPU backend for mxint
//!
//! Provides the cache-resident tiled engine for C = A x W with int8
//! activations, MXINT4 weights and int32 accumulation, plus a naive
//! reference used for validation.

pub mod cache;
pub mod engine;
pub mod reference;
pub mod tile;
pub mod writer;

pub use cache::{ActivationCache, WeightCache};
pub use engine::{compute, Engine, LoadedCaches, PhaseTimings};
pub use reference::{reference_matmul, reference_matmul_dequantized};
pub use tile::{OutputTile, TileComputeUnit};
pub use writer::OutputWriter;

use mxint_core::error::{Error, Result};

/// CPU backend configuration
#[derive(Debug, Clone)]
pub struct CpuBackend {
    /// Number of threads to use (0 = global rayon pool)
    pub num_threads: usize,
    /// Spread cache loading and tile pairs across threads
    pub parallel: bool,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            num_threads: 0, // Global pool
            parallel: true,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    /// Single-threaded sweep in row-tile, column-tile order
    pub fn sequential() -> Self {
        Self { num_threads: 0, parallel: false }
    }

    /// Threads the engine will actually use
    pub fn effective_threads(&self) -> usize {
        match (self.parallel, self.num_threads) {
            (false, _) => 1,
            (true, 0) => rayon::current_num_threads(),
            (true, n) => n,
        }
    }

    /// Build a dedicated pool when a thread count is pinned
    pub(crate) fn build_pool(&self) -> Result<Option<rayon::ThreadPool>> {
        if !self.parallel || self.num_threads == 0 {
            return Ok(None);
        }
        if self.num_threads > num_cpus::get() {
            log::warn!(
                "Requested {} threads but only {} logical CPUs are available",
                self.num_threads,
                num_cpus::get()
            );
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("mxint-worker-{}", i))
            .build()
            .map(Some)
            .map_err(|e| Error::BackendError(e.to_string()))
    }
}
