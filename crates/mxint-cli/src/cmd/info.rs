use anyhow::Result;
use mxint_core::dims::{COL_TILE, GROUP_SIZE, MAX_REDUCTION_DEPTH, ROW_TILE};

use super::DimsArgs;

pub fn run(args: DimsArgs) -> Result<()> {
    let dims = args.dims()?;

    println!("Configuration: {}", dims);
    println!("  Tiles:        {} x {} of {}x{}", dims.num_m_tiles(), dims.num_n_tiles(), ROW_TILE, COL_TILE);
    println!("  Group size:   {}", GROUP_SIZE);
    println!("  Max K (i32):  {}", MAX_REDUCTION_DEPTH);
    println!("  GOPs:         {:.3}", dims.ops() as f64 / 1e9);
    println!();
    println!("Inputs:");
    println!("  Activations:  {} bytes (INT8)", dims.activation_len());
    println!("  Weights:      {} bytes (MXINT4 packed)", dims.packed_len());
    println!("  Scales:       {} codes", dims.scales_len());
    println!("Caches:");
    println!("  Activation:   {} bytes", dims.num_m_tiles() * ROW_TILE * dims.k());
    println!("  Weight:       {} bytes (dequantized INT8)", dims.num_n_tiles() * COL_TILE * dims.k());
    println!("  Working set:  {} bytes per tile pair", (ROW_TILE + COL_TILE) * dims.k() + ROW_TILE * COL_TILE * 4);
    println!("Output:         {} bytes (INT32)", dims.output_len() * 4);

    Ok(())
}
