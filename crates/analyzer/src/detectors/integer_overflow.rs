//! Wrapping arithmetic on pre-0.8.0 compilers.

use anyhow::Result;

use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};
use crate::ir::{Operation, Variable};
use crate::solc::SolcVersion;

/// Flags overflow-capable arithmetic when the unit was compiled with a
/// pre-0.8.0 toolchain, where `+`/`-`/`*`/`**` wrap silently. On 0.8.0 and
/// later the compiler inserts checked arithmetic and the detector stays
/// quiet.
pub struct IntegerOverflow;

const DOC: DetectorDoc = DetectorDoc {
    title: "Integer overflow",
    description: "Before Solidity 0.8.0, arithmetic wraps on overflow without reverting. \
        Balances and counters computed with unchecked wrapping can be driven past their range by \
        attacker-chosen inputs.",
    exploit_scenario: "A 0.7.x token computes `balances[to] += amount`. Transferring an amount \
        that wraps the recipient's balance past 2**256 mints value out of thin air.",
    recommendation: "Compile with Solidity >= 0.8.0, or guard every arithmetic operation with a \
        checked-math library such as SafeMath.",
    description_kr: "Solidity 0.8.0 이전 버전에서는 산술 연산이 오버플로 시 revert 없이 \
        순환합니다.",
    exploit_scenario_kr: "0.7.x 토큰에서 잔액 덧셈이 2**256을 넘으면 값이 순환하여 잔액이 \
        조작됩니다.",
    recommendation_kr: "Solidity 0.8.0 이상으로 컴파일하거나 SafeMath 같은 검증 라이브러리를 \
        사용하는 것이 좋습니다.",
    references: &["https://swcregistry.io/docs/SWC-101"],
};

impl Detector for IntegerOverflow {
    fn id(&self) -> &'static str {
        "integer-overflow"
    }

    fn impact(&self) -> Impact {
        Impact::High
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    fn doc(&self) -> DetectorDoc {
        DOC
    }

    fn detect(&self, ctx: &AnalysisContext) -> Result<Vec<Finding>> {
        // "0.7.6+commit.7338295f" and bare "0.7.6" both resolve here.
        let version = ctx
            .model
            .compiler_version
            .split('+')
            .next()
            .unwrap_or_default()
            .parse::<SolcVersion>();
        match version {
            Ok(version) if !version.has_builtin_overflow_protection() => {}
            _ => return Ok(Vec::new()),
        }

        let mut findings = Vec::new();
        for contract in ctx.model.contracts_derived() {
            for function in contract.all_function_bodies() {
                for node in function.nodes() {
                    if !has_wrapping_arithmetic(node) {
                        continue;
                    }
                    let description = BilingualText::new(
                        format!(
                            "{}.{} performs unchecked arithmetic on a pre-0.8.0 compiler: \"{}\"",
                            contract.name, function.name, node.description
                        ),
                        format!(
                            "{}.{} 함수는 0.8.0 이전 컴파일러에서 검사되지 않는 산술 연산을 \
                             수행합니다: \"{}\"",
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

fn has_wrapping_arithmetic(node: &crate::cfg::Node) -> bool {
    node.irs.iter().any(|ir| {
        matches!(
            ir,
            Operation::Binary { operator, left, right, .. }
                if operator.can_overflow() && !is_constant_fold(left, right)
        )
    })
}

/// Two literal operands fold at compile time; no runtime overflow exists.
fn is_constant_fold(left: &Variable, right: &Variable) -> bool {
    matches!(left, Variable::Constant(_)) && matches!(right, Variable::Constant(_))
}
