mod cmd;
mod data;

use anyhow::Result;
use clap::Parser;

/// mxint: harness for the tiled MXINT4 x INT8 matmul engine.
#[derive(Parser)]
#[command(name = "mxint", version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: cmd::Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let passed = cmd::run(cli.command)?;
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
