use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod report;

use commands::{analyze::AnalyzeArgs, compile::CompileArgs};

#[derive(Parser)]
#[command(name = "tansa")]
#[command(about = "Solidity static analysis: compile, lower to IR, run detectors")]
#[command(version)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a target and run the vulnerability detectors
    Analyze(AnalyzeArgs),

    /// Compile a target and print per-contract ABI and runtime bytecode
    Compile(CompileArgs),

    /// List the available detectors
    Detectors,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Analyze(args) => commands::analyze::execute(args),
        Commands::Compile(args) => commands::compile::execute(args),
        Commands::Detectors => commands::detectors::execute(),
    }
}
