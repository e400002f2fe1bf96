use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;

use tansa_analyzer::findings::Impact;
use tansa_analyzer::{Analyzer, DetectorRegistry};

use crate::report;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// A .sol file or a directory to scan for .sol files
    pub target: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
    pub format: ReportFormat,

    /// Run only these detector ids (default: all)
    #[arg(short, long)]
    pub detectors: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Markdown,
}

pub fn execute(args: AnalyzeArgs) -> Result<()> {
    let analyzer = Analyzer::new(&args.target)?;

    let registry = if args.detectors.is_empty() {
        DetectorRegistry::with_defaults()
    } else {
        let mut filtered = DetectorRegistry::new();
        let all = DetectorRegistry::with_defaults();
        for detector in all.detectors() {
            if args.detectors.iter().any(|id| id == detector.id()) {
                filtered.register_arc(detector.clone());
            }
        }
        if filtered.is_empty() {
            anyhow::bail!("no detector matches {:?}", args.detectors);
        }
        filtered
    };

    let run = analyzer.run_detectors(&registry);
    print_summary(&run);

    let rendered = match args.format {
        ReportFormat::Json => report::to_json(&run)?,
        ReportFormat::Markdown => report::to_markdown(&run),
    };

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn print_summary(run: &tansa_analyzer::DetectorRun) {
    let count = |impact: Impact| {
        run.findings
            .iter()
            .filter(|f| f.impact == impact)
            .count()
    };

    println!();
    println!(
        "{} {} finding(s)",
        "==".bright_blue(),
        run.findings.len().to_string().bold()
    );
    println!("   {} {}", "high:".bright_red(), count(Impact::High));
    println!("   {} {}", "medium:".yellow(), count(Impact::Medium));
    println!("   {} {}", "low:".bright_yellow(), count(Impact::Low));
    println!(
        "   {} {}",
        "informational:".bright_blue(),
        count(Impact::Informational)
    );

    for failure in &run.failures {
        println!(
            "{} detector '{}' failed: {}",
            "!!".bright_red().bold(),
            failure.id,
            failure.reason
        );
    }
    println!();
}
