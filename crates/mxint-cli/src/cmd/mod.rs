pub mod info;
pub mod run;

use clap::{Args, Subcommand};
use mxint_core::dims::{Dims, REFERENCE_K, REFERENCE_M, REFERENCE_N};

#[derive(Subcommand)]
pub enum Command {
    /// Generate inputs, run reference and engine, compare bit-for-bit.
    Run(run::RunArgs),

    /// Show buffer and cache sizes for a configuration.
    Info(DimsArgs),
}

/// Matrix dimensions: C[M, N] = A[M, K] x W[K, N].
#[derive(Args, Debug, Clone)]
pub struct DimsArgs {
    /// Rows of A and C (multiple of 16).
    #[arg(long, default_value_t = REFERENCE_M)]
    pub m: usize,

    /// Reduction depth (multiple of 16).
    #[arg(long, default_value_t = REFERENCE_K)]
    pub k: usize,

    /// Columns of W and C (multiple of 16).
    #[arg(long, default_value_t = REFERENCE_N)]
    pub n: usize,
}

impl DimsArgs {
    pub fn dims(&self) -> anyhow::Result<Dims> {
        Ok(Dims::new(self.m, self.k, self.n)?)
    }
}

/// Returns whether the command succeeded; `false` maps to exit status 1.
pub fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Info(args) => info::run(args).map(|_| true),
    }
}
