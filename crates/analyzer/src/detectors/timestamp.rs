//! Comparisons that gate control flow on `block.timestamp`.

use anyhow::Result;

use crate::analysis::is_dependent;
use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};
use crate::ir::{Builtin, Operation, Variable};
use crate::model::Function;

/// Flags boolean comparisons (including `require`/`assert` conditions)
/// whose operands depend on `block.timestamp` or `now`. Miners can shift
/// the timestamp by several seconds, so exact deadlines and time-window
/// checks are softer than they look.
pub struct TimestampComparison;

const DOC: DetectorDoc = DetectorDoc {
    title: "Block timestamp comparison",
    description: "Control flow depends on block.timestamp. Validators choose the timestamp \
        within protocol bounds, so comparisons against it can be nudged by the block producer.",
    exploit_scenario: "An auction closes when `block.timestamp > deadline`. A colluding \
        validator stamps the block a few seconds early or late to include or exclude last-moment \
        bids.",
    recommendation: "Tolerate timestamp drift: avoid equality checks against timestamps, and \
        do not gate high-value transitions on second-level precision.",
    description_kr: "block.timestamp에 의존하는 조건문입니다. 블록 생성자가 타임스탬프를 조절할 수 \
        있어 비교 결과가 조작될 수 있습니다.",
    exploit_scenario_kr: "검증자는 블록 타임스탬프를 몇 초 단위로 조절하여 마감 직전의 거래를 \
        포함하거나 제외할 수 있습니다.",
    recommendation_kr: "타임스탬프와의 동등 비교를 피하고, 초 단위 정밀도에 의존하는 로직을 \
        사용하지 않는 것이 좋습니다.",
    references: &[
        "https://docs.soliditylang.org/en/latest/units-and-global-variables.html#block-and-transaction-properties",
    ],
};

impl Detector for TimestampComparison {
    fn id(&self) -> &'static str {
        "timestamp"
    }

    fn impact(&self) -> Impact {
        Impact::Low
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    fn doc(&self) -> DetectorDoc {
        DOC
    }

    fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for contract in ctx.model.contracts_derived() {
            for function in contract.all_function_bodies() {
                for node in function.nodes() {
                    if !node_compares_timestamp(function, node) {
                        continue;
                    }
                    let description = BilingualText::new(
                        format!(
                            "{}.{} compares against block.timestamp: \"{}\"",
                            contract.name, function.name, node.description
                        ),
                        format!(
                            "{}.{} 함수는 block.timestamp를 비교 조건으로 사용합니다: \"{}\"",
                            contract.name, function.name, node.description
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

fn node_compares_timestamp(function: &Function, node: &crate::cfg::Node) -> bool {
    let timestamp = Variable::Builtin(Builtin::BlockTimestamp);
    let now = Variable::Builtin(Builtin::Now);

    node.irs.iter().any(|ir| match ir {
        Operation::Binary {
            operator,
            left,
            right,
            ..
        } if operator.returns_bool() => [left, right].into_iter().any(|operand| {
            is_dependent(operand, &timestamp, &function.cfg)
                || is_dependent(operand, &now, &function.cfg)
        }),
        _ => false,
    })
}
