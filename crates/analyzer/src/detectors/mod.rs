//! Detector engine
//!
//! A detector is a predicate over the declaration/IR model producing zero
//! or more findings. Detectors register into an ordered registry and run in
//! registration order; a detector that fails only loses its own
//! contribution — the failure is recorded and logged, and sibling
//! detectors still run.

pub mod assembly_usage;
pub mod integer_overflow;
pub mod timestamp;
pub mod tx_origin;
pub mod unchecked_send;
pub mod weak_prng;

pub use assembly_usage::AssemblyUsage;
pub use integer_overflow::IntegerOverflow;
pub use timestamp::TimestampComparison;
pub use tx_origin::TxOriginAuth;
pub use unchecked_send::UncheckedSend;
pub use weak_prng::WeakPrng;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use rayon::prelude::*;
use tracing::warn;

use crate::cfg::Node;
use crate::compilation::Compilation;
use crate::findings::{BilingualText, Confidence, Element, Finding, Impact, SourceMapping};
use crate::model::{CompilationModel, Contract, Function, SourceSpan};

/// Everything a detector may inspect: the typed model plus the compilation
/// artifacts behind it (for source text and line mapping).
pub struct AnalysisContext<'a> {
    pub model: &'a CompilationModel,
    pub compilation: &'a Compilation,
}

/// The narrative text a detector ships with its findings, in both
/// languages the report renders.
#[derive(Debug, Clone, Copy)]
pub struct DetectorDoc {
    pub title: &'static str,
    pub description: &'static str,
    pub exploit_scenario: &'static str,
    pub recommendation: &'static str,
    pub description_kr: &'static str,
    pub exploit_scenario_kr: &'static str,
    pub recommendation_kr: &'static str,
    pub references: &'static [&'static str],
}

pub trait Detector: Send + Sync {
    fn id(&self) -> &'static str;

    fn impact(&self) -> Impact;

    fn confidence(&self) -> Confidence;

    fn doc(&self) -> DetectorDoc;

    fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<Finding>>;

    /// A finding pre-filled with this detector's classification and
    /// narrative text; callers add elements and finalize.
    fn base_finding(&self, description: BilingualText) -> Finding {
        let doc = self.doc();
        Finding::new(self.id(), self.impact(), self.confidence(), description)
            .with_exploit_scenario(BilingualText::new(
                doc.exploit_scenario,
                doc.exploit_scenario_kr,
            ))
            .with_recommendation(BilingualText::new(doc.recommendation, doc.recommendation_kr))
            .with_references(doc.references.iter().map(|r| r.to_string()).collect())
    }
}

/// One detector's recorded failure; the run carries on without it.
#[derive(Debug, Clone)]
pub struct DetectorFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct DetectorRun {
    pub findings: Vec<Finding>,
    pub failures: Vec<DetectorFailure>,
}

impl DetectorRun {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered detector set. Registration order is execution order, and each
/// detector's findings keep that detector's internal enumeration order.
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in detector, in the order reports list them.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(WeakPrng);
        registry.register(TimestampComparison);
        registry.register(TxOriginAuth);
        registry.register(UncheckedSend);
        registry.register(IntegerOverflow);
        registry.register(AssemblyUsage);
        registry
    }

    pub fn register<D: Detector + 'static>(&mut self, detector: D) {
        self.detectors.push(Arc::new(detector));
    }

    pub fn register_arc(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    pub fn detectors(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Runs every detector sequentially in registration order.
    pub fn run(&self, ctx: &AnalysisContext) -> DetectorRun {
        let mut run = DetectorRun::default();
        for detector in &self.detectors {
            match Self::run_one(detector.as_ref(), ctx) {
                Ok(findings) => run.findings.extend(findings),
                Err(reason) => {
                    warn!(detector = detector.id(), %reason, "detector failed");
                    run.failures.push(DetectorFailure {
                        id: detector.id().to_string(),
                        reason,
                    });
                }
            }
        }
        run
    }

    /// Parallel variant. Output order still follows registration order;
    /// findings within one detector keep that detector's own order.
    pub fn run_parallel(&self, ctx: &AnalysisContext) -> DetectorRun {
        let results: Vec<_> = self
            .detectors
            .par_iter()
            .map(|detector| (detector.id(), Self::run_one(detector.as_ref(), ctx)))
            .collect();

        let mut run = DetectorRun::default();
        for (id, result) in results {
            match result {
                Ok(findings) => run.findings.extend(findings),
                Err(reason) => {
                    warn!(detector = id, %reason, "detector failed");
                    run.failures.push(DetectorFailure {
                        id: id.to_string(),
                        reason,
                    });
                }
            }
        }
        run
    }

    fn run_one(
        detector: &dyn Detector,
        ctx: &AnalysisContext,
    ) -> std::result::Result<Vec<Finding>, String> {
        match catch_unwind(AssertUnwindSafe(|| detector.detect(ctx))) {
            Ok(Ok(findings)) => Ok(findings),
            Ok(Err(error)) => Err(error.to_string()),
            Err(panic) => Err(panic_message(panic)),
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "detector panicked".to_string()
    }
}

/// `SourceMapping` for a span inside a contract's file, with the line
/// resolved when source text is available.
pub fn span_mapping(ctx: &AnalysisContext, contract: &Contract, span: SourceSpan) -> SourceMapping {
    let lines = ctx
        .compilation
        .get_line_from_offset(&contract.filename, span.start)
        .map(|(line, _)| vec![line])
        .unwrap_or_default();
    let starting_column = ctx
        .compilation
        .get_line_from_offset(&contract.filename, span.start)
        .map(|(_, column)| column)
        .unwrap_or(0);
    SourceMapping {
        filename: contract.filename.relative.clone(),
        start: span.start,
        length: span.length,
        lines,
        starting_column,
    }
}

pub fn contract_element(ctx: &AnalysisContext, contract: &Contract) -> Element {
    Element::new("contract", &contract.name)
        .with_source_mapping(span_mapping(ctx, contract, contract.src))
}

pub fn function_element(ctx: &AnalysisContext, contract: &Contract, function: &Function) -> Element {
    Element::new("function", function.signature())
        .with_source_mapping(span_mapping(ctx, contract, function.src))
        .with_parent(contract_element(ctx, contract))
}

pub fn node_element(
    ctx: &AnalysisContext,
    contract: &Contract,
    function: &Function,
    node: &Node,
) -> Element {
    let span = node
        .src
        .as_deref()
        .and_then(SourceSpan::parse)
        .unwrap_or_default();
    Element::new("node", &node.description)
        .with_source_mapping(span_mapping(ctx, contract, span))
        .with_parent(function_element(ctx, contract, function))
}
