use anyhow::Result;
use colored::Colorize;

use tansa_analyzer::DetectorRegistry;

pub fn execute() -> Result<()> {
    let registry = DetectorRegistry::with_defaults();

    println!("{:<20} {:<15} {:<12} title", "id", "impact", "confidence");
    println!("{}", "-".repeat(70));
    for detector in registry.detectors() {
        println!(
            "{:<20} {:<15} {:<12} {}",
            detector.id().bold(),
            detector.impact().to_string(),
            detector.confidence().to_string(),
            detector.doc().title
        );
    }
    Ok(())
}
