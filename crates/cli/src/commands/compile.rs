use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use tansa_analyzer::Analyzer;

#[derive(Args)]
pub struct CompileArgs {
    /// A .sol file or a directory to scan for .sol files
    pub target: PathBuf,

    /// Write the ABI/bytecode JSON here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: CompileArgs) -> Result<()> {
    let analyzer = Analyzer::new(&args.target)?;
    let artifacts = analyzer.deployment_artifacts();

    println!(
        "{} compiled {} contract(s)",
        "==".bright_green(),
        artifacts.len()
    );

    let combined: Vec<_> = artifacts
        .iter()
        .map(|artifact| {
            json!({
                "contract": artifact.contract,
                "abi": artifact.abi,
                "bytecode_runtime": artifact.bytecode_runtime,
            })
        })
        .collect();
    let rendered = serde_json::to_string_pretty(&combined)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("artifacts written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
