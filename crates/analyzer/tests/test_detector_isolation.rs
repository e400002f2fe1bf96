//! A failing detector loses only its own contribution: sibling detectors
//! still report, and the failure is recorded instead of aborting the run.

use std::path::Path;

use anyhow::anyhow;
use serde_json::json;

use tansa_analyzer::detectors::{AnalysisContext, Detector, DetectorDoc, DetectorRegistry};
use tansa_analyzer::findings::{BilingualText, Confidence, Finding, Impact};
use tansa_analyzer::solc::invoker::CombinedJson;
use tansa_analyzer::Analyzer;

const EMPTY_DOC: DetectorDoc = DetectorDoc {
    title: "test",
    description: "",
    exploit_scenario: "",
    recommendation: "",
    description_kr: "",
    exploit_scenario_kr: "",
    recommendation_kr: "",
    references: &[],
};

struct GoodDetector;

impl Detector for GoodDetector {
    fn id(&self) -> &'static str {
        "good-detector"
    }
    fn impact(&self) -> Impact {
        Impact::Low
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn doc(&self) -> DetectorDoc {
        EMPTY_DOC
    }
    fn detect(&self, _ctx: &AnalysisContext) -> anyhow::Result<Vec<Finding>> {
        Ok(vec![Finding::new(
            self.id(),
            self.impact(),
            self.confidence(),
            BilingualText::english("always fires"),
        )
        .finalize()])
    }
}

struct ThrowingDetector;

impl Detector for ThrowingDetector {
    fn id(&self) -> &'static str {
        "throwing-detector"
    }
    fn impact(&self) -> Impact {
        Impact::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn doc(&self) -> DetectorDoc {
        EMPTY_DOC
    }
    fn detect(&self, _ctx: &AnalysisContext) -> anyhow::Result<Vec<Finding>> {
        Err(anyhow!("internal analysis exploded"))
    }
}

struct PanickingDetector;

impl Detector for PanickingDetector {
    fn id(&self) -> &'static str {
        "panicking-detector"
    }
    fn impact(&self) -> Impact {
        Impact::High
    }
    fn confidence(&self) -> Confidence {
        Confidence::High
    }
    fn doc(&self) -> DetectorDoc {
        EMPTY_DOC
    }
    fn detect(&self, _ctx: &AnalysisContext) -> anyhow::Result<Vec<Finding>> {
        panic!("unexpected model shape")
    }
}

fn minimal_analyzer(working_dir: &Path) -> Analyzer {
    let combined: CombinedJson = serde_json::from_value(json!({
        "sources": {"t.sol": {"AST": {
            "nodeType": "SourceUnit",
            "nodes": [{
                "nodeType": "ContractDefinition",
                "id": 1,
                "name": "T",
                "contractKind": "contract",
                "abstract": false,
                "baseContracts": [],
                "linearizedBaseContracts": [1],
                "src": "0:12:0",
                "nodes": []
            }]
        }}},
        "contracts": {}
    }))
    .unwrap();
    Analyzer::from_combined_json("t.sol", working_dir, "0.8.19", combined).unwrap()
}

#[test]
fn test_throwing_detector_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = minimal_analyzer(dir.path());

    let mut registry = DetectorRegistry::new();
    registry.register(GoodDetector);
    registry.register(ThrowingDetector);

    let run = analyzer.run_detectors(&registry);
    assert_eq!(run.findings.len(), 1);
    assert_eq!(run.findings[0].check, "good-detector");
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].id, "throwing-detector");
    assert!(run.failures[0].reason.contains("exploded"));
}

#[test]
fn test_panicking_detector_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = minimal_analyzer(dir.path());

    let mut registry = DetectorRegistry::new();
    registry.register(PanickingDetector);
    registry.register(GoodDetector);

    let run = analyzer.run_detectors(&registry);
    assert_eq!(run.findings.len(), 1);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].id, "panicking-detector");
}

#[test]
fn test_registration_order_is_execution_order() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = minimal_analyzer(dir.path());

    struct Named(&'static str);
    impl Detector for Named {
        fn id(&self) -> &'static str {
            self.0
        }
        fn impact(&self) -> Impact {
            Impact::Informational
        }
        fn confidence(&self) -> Confidence {
            Confidence::Low
        }
        fn doc(&self) -> DetectorDoc {
            EMPTY_DOC
        }
        fn detect(&self, _ctx: &AnalysisContext) -> anyhow::Result<Vec<Finding>> {
            Ok(vec![Finding::new(
                self.0,
                Impact::Informational,
                Confidence::Low,
                BilingualText::english(self.0),
            )
            .finalize()])
        }
    }

    let mut registry = DetectorRegistry::new();
    registry.register(Named("first"));
    registry.register(Named("second"));
    registry.register(Named("third"));

    let run = analyzer.run_detectors(&registry);
    let order: Vec<_> = run.findings.iter().map(|f| f.check.as_str()).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}
