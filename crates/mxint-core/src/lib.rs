//! Core primitives for mxint
//!
//! This crate provides the data-format building blocks of the tiled
//! MXINT4 x INT8 matrix multiply engine:
//! - Tiling and group constants, validated dimensions
//! - The 4-bit weight dequantizer
//! - The quantization producer for weights and activations
//! - The static int32 accumulator bound

pub mod dims;
pub mod error;
pub mod quant;

pub use dims::{
    check_accumulator_bound, Dims, COL_TILE, GROUP_SIZE, MAX_REDUCTION_DEPTH, ROW_TILE,
};
pub use error::{Error, Result};
pub use quant::{
    dequantize, dequantize_at, dequantize_matrix, quantize_activations, quantize_mxint4,
    PackedWeights,
};

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
