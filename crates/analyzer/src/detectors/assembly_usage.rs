//! Inline assembly surfacing.

use anyhow::Result;

use crate::cfg::NodeType;
use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};

/// Surfaces inline assembly blocks. Assembly bypasses the type system and
/// the IR lowering (those nodes carry `Unsupported` operations), so its
/// presence is worth a reviewer's attention even when nothing else fires.
pub struct AssemblyUsage;

const DOC: DetectorDoc = DetectorDoc {
    title: "Inline assembly",
    description: "The function contains an inline assembly block. Assembly skips the compiler's \
        safety checks and is invisible to most static analysis, so it deserves manual review.",
    exploit_scenario: "Hand-written assembly that mis-computes a storage slot silently corrupts \
        unrelated state variables.",
    recommendation: "Prefer Solidity-level constructs; when assembly is unavoidable, keep the \
        block minimal and document its invariants.",
    description_kr: "함수에 인라인 어셈블리 블록이 포함되어 있습니다. 어셈블리는 컴파일러의 안전 \
        검사를 우회하므로 수동 검토가 필요합니다.",
    exploit_scenario_kr: "잘못 계산된 스토리지 슬롯에 쓰는 어셈블리는 관련 없는 상태 변수를 \
        손상시킬 수 있습니다.",
    recommendation_kr: "가능하면 Solidity 수준의 구문을 사용하고, 어셈블리가 불가피한 경우 블록을 \
        최소화하는 것이 좋습니다.",
    references: &[],
};

impl Detector for AssemblyUsage {
    fn id(&self) -> &'static str {
        "assembly-usage"
    }

    fn impact(&self) -> Impact {
        Impact::Informational
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    fn doc(&self) -> DetectorDoc {
        DOC
    }

    fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for contract in ctx.model.contracts_derived() {
            for function in contract.all_function_bodies() {
                for node in function.nodes() {
                    if node.node_type != NodeType::Assembly {
                        continue;
                    }
                    let description = BilingualText::new(
                        format!(
                            "{}.{} uses inline assembly",
                            contract.name, function.name
                        ),
                        format!(
                            "{}.{} 함수는 인라인 어셈블리를 사용합니다",
                            contract.name, function.name
                        ),
                    );
                    findings.push(
                        self.base_finding(description)
                            .with_element(function_element(ctx, contract, function))
                            .with_element(node_element(ctx, contract, function, node))
                            .finalize(),
                    );
                }
            }
        }
        Ok(findings)
    }
}
