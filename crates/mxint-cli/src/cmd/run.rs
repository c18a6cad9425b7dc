use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use mxint_core::dims::Dims;
use mxint_core::quant::{quantize_activations, quantize_mxint4};
use mxint_cpu::{reference_matmul, CpuBackend, Engine, PhaseTimings};

use super::DimsArgs;
use crate::data::{self, Pattern};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    dims: DimsArgs,

    /// Input data pattern.
    #[arg(long, value_enum, default_value_t = Pattern::Ramp)]
    pattern: Pattern,

    /// Seed for the random pattern.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads (0 = one per logical CPU).
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Sweep tile pairs on a single thread.
    #[arg(long, conflicts_with = "threads")]
    sequential: bool,

    /// Number of leading results to print.
    #[arg(long, default_value_t = 10)]
    show: usize,

    /// Print a JSON report instead of the text summary.
    #[arg(long)]
    json: bool,
}

/// Outcome of one harness run
#[derive(Serialize)]
struct RunReport {
    dims: Dims,
    pattern: Pattern,
    threads: usize,
    gops: f64,
    reference_ms: f64,
    load_activations_ms: f64,
    load_weights_ms: f64,
    compute_ms: f64,
    engine_gops_per_s: f64,
    errors: usize,
    passed: bool,
}

pub fn run(args: RunArgs) -> Result<bool> {
    let dims = args.dims.dims()?;
    let backend = if args.sequential {
        CpuBackend::sequential()
    } else {
        CpuBackend::new().with_threads(args.threads)
    };
    let engine = Engine::new(backend).context("failed to start engine")?;

    if !args.json {
        println!("16x16 Systolic Array with MXINT4");
        println!("{}", dims);
        println!("GOPs: {}", dims.ops() as f64 / 1e9);
    }

    let inputs = data::generate(&dims, args.pattern, args.seed);
    let activations = quantize_activations(&inputs.activations)?;
    let weights = quantize_mxint4(&inputs.weights, dims.k(), dims.n())?;

    if !args.json {
        println!("Quantized data:");
        println!("  Activations: {} INT8", activations.len());
        println!("  Weights: {} bytes (MXINT4 packed)", weights.packed.len());
        println!("  Scales: {} factors", weights.scales.len());
        println!("\nRunning CPU reference...");
    }

    let start = Instant::now();
    let expected = reference_matmul(
        &activations,
        &weights.packed,
        &weights.scales,
        dims.m(),
        dims.k(),
        dims.n(),
    )?;
    let reference_time = start.elapsed();
    log::debug!("Reference finished in {:.2?}", reference_time);

    if !args.json {
        println!("Running engine ({} threads)...", engine.backend().effective_threads());
    }

    let mut actual = vec![0i32; dims.output_len()];
    let timings =
        engine.compute_into(&dims, &activations, &weights.packed, &weights.scales, &mut actual)?;

    let errors = actual.iter().zip(&expected).filter(|(a, e)| a != e).count();
    let passed = errors == 0;

    if args.json {
        let report = build_report(&dims, &args, &engine, reference_time.as_secs_f64(), &timings, errors);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(passed);
    }

    println!("\nFirst {} results:", args.show.min(dims.output_len()));
    println!("Index\tEngine\tCPU\tDiff");
    for (i, (a, e)) in actual.iter().zip(&expected).take(args.show).enumerate() {
        println!("{}\t{}\t{}\t{}", i, a, e, a - e);
    }

    println!(
        "\nPhases: load A {:.2?}, load W {:.2?}, compute {:.2?} ({:.2} GOP/s)",
        timings.load_activations,
        timings.load_weights,
        timings.compute,
        throughput(&dims, &timings)
    );
    println!("Errors: {} / {}", errors, dims.output_len());
    println!("{}", if passed { "PASS!" } else { "FAIL!" });

    Ok(passed)
}

fn throughput(dims: &Dims, timings: &PhaseTimings) -> f64 {
    let secs = timings.total().as_secs_f64();
    if secs > 0.0 {
        dims.ops() as f64 / 1e9 / secs
    } else {
        0.0
    }
}

fn build_report(
    dims: &Dims,
    args: &RunArgs,
    engine: &Engine,
    reference_secs: f64,
    timings: &PhaseTimings,
    errors: usize,
) -> RunReport {
    RunReport {
        dims: *dims,
        pattern: args.pattern,
        threads: engine.backend().effective_threads(),
        gops: dims.ops() as f64 / 1e9,
        reference_ms: reference_secs * 1e3,
        load_activations_ms: timings.load_activations.as_secs_f64() * 1e3,
        load_weights_ms: timings.load_weights.as_secs_f64() * 1e3,
        compute_ms: timings.compute.as_secs_f64() * 1e3,
        engine_gops_per_s: throughput(dims, timings),
        errors,
        passed: errors == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(m: usize, k: usize, n: usize, pattern: Pattern) -> RunArgs {
        RunArgs {
            dims: DimsArgs { m, k, n },
            pattern,
            seed: 1,
            threads: 0,
            sequential: false,
            show: 4,
            json: true,
        }
    }

    #[test]
    fn test_small_runs_pass() {
        assert!(run(args(32, 64, 48, Pattern::Ramp)).unwrap());
        assert!(run(args(16, 32, 16, Pattern::Random)).unwrap());
    }

    #[test]
    fn test_rejects_bad_dims() {
        assert!(run(args(20, 64, 48, Pattern::Ramp)).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let dims = Dims::new(16, 16, 16).unwrap();
        let engine = Engine::new(CpuBackend::sequential()).unwrap();
        let report = build_report(
            &dims,
            &args(16, 16, 16, Pattern::Random),
            &engine,
            0.001,
            &PhaseTimings::default(),
            0,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dims"]["k"], 16);
        assert_eq!(json["pattern"], "random");
        assert_eq!(json["threads"], 1);
        assert_eq!(json["passed"], true);
    }
}
