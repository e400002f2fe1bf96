//! Report rendering for detector runs: pretty JSON for machines, Markdown
//! for humans.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use tansa_analyzer::findings::Impact;
use tansa_analyzer::DetectorRun;

pub fn to_json(run: &DetectorRun) -> Result<String> {
    let failures: Vec<_> = run
        .failures
        .iter()
        .map(|f| json!({"detector": f.id, "reason": f.reason}))
        .collect();
    let document = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "findings": run.findings,
        "failed_detectors": failures,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn to_markdown(run: &DetectorRun) -> String {
    let mut md = String::from("# Analysis Report\n\n");
    md.push_str(&format!("Generated: {}\n\n", Utc::now().to_rfc3339()));

    let count = |impact: Impact| run.findings.iter().filter(|f| f.impact == impact).count();
    md.push_str("## Summary\n\n");
    md.push_str(&format!("- High: {}\n", count(Impact::High)));
    md.push_str(&format!("- Medium: {}\n", count(Impact::Medium)));
    md.push_str(&format!("- Low: {}\n", count(Impact::Low)));
    md.push_str(&format!(
        "- Informational: {}\n\n",
        count(Impact::Informational)
    ));

    if !run.failures.is_empty() {
        md.push_str("## Failed detectors\n\n");
        for failure in &run.failures {
            md.push_str(&format!("- `{}`: {}\n", failure.id, failure.reason));
        }
        md.push('\n');
    }

    if !run.findings.is_empty() {
        md.push_str("## Findings\n\n");
        for finding in &run.findings {
            md.push_str(&format!(
                "### [{}] {} ({} / {})\n\n",
                finding.impact, finding.check, finding.impact, finding.confidence
            ));
            md.push_str(&format!("{}\n\n", finding.description.en));
            if !finding.description.kr.is_empty() {
                md.push_str(&format!("{}\n\n", finding.description.kr));
            }
            if !finding.elements.is_empty() {
                md.push_str("**Elements:**\n");
                for element in &finding.elements {
                    md.push_str(&format!(
                        "- {} `{}` ({}:{})\n",
                        element.kind,
                        element.name,
                        element.source_mapping.filename,
                        element
                            .source_mapping
                            .lines
                            .first()
                            .copied()
                            .unwrap_or_default()
                    ));
                }
                md.push('\n');
            }
            if let Some(recommendation) = &finding.recommendation {
                md.push_str(&format!("**Recommendation:** {}\n\n", recommendation.en));
            }
        }
    }

    md
}
