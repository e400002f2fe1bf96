//! Value transfers whose success flag is ignored.

use anyhow::Result;

use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};
use crate::ir::{Operation, Variable};
use crate::model::Function;

/// Flags `send` and low-level `call` operations whose boolean result is
/// never read anywhere in the function. A failed transfer then passes
/// silently and the contract's accounting diverges from reality.
pub struct UncheckedSend;

const DOC: DetectorDoc = DetectorDoc {
    title: "Unchecked transfer result",
    description: "send and the low-level call family return false on failure instead of \
        reverting. When the result is dropped, a failed Ether transfer leaves state changes in \
        place as if it had succeeded.",
    exploit_scenario: "A withdrawal function zeroes the user's balance and then calls \
        `user.send(amount)` without checking the result. A recipient contract whose receive \
        function reverts makes the send fail; the balance is already zero and the funds are \
        stranded.",
    recommendation: "Check every transfer result (`require(ok, ...)`), or use `transfer`, or \
        follow the checks-effects-interactions pattern with an explicit failure path.",
    description_kr: "send와 low-level call은 실패 시 revert 대신 false를 반환합니다. 반환값을 \
        확인하지 않으면 전송 실패가 조용히 무시됩니다.",
    exploit_scenario_kr: "잔액을 먼저 0으로 만든 뒤 send 결과를 확인하지 않으면, 전송이 실패해도 \
        잔액은 이미 차감된 상태가 됩니다.",
    recommendation_kr: "모든 전송의 반환값을 require로 확인하거나 transfer를 사용하는 것이 \
        좋습니다.",
    references: &["https://swcregistry.io/docs/SWC-104"],
};

impl Detector for UncheckedSend {
    fn id(&self) -> &'static str {
        "unchecked-send"
    }

    fn impact(&self) -> Impact {
        Impact::Medium
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
                    for ir in &node.irs {
                        let Some(result) = unchecked_transfer_result(ir) else {
                            continue;
                        };
                        if is_read_anywhere(function, result) {
                            continue;
                        }
                        let description = BilingualText::new(
                            format!(
                                "{}.{} ignores the return value of a value transfer: \"{}\"",
                                contract.name, function.name, node.description
                            ),
                            format!(
                                "{}.{} 함수는 이더 전송의 반환값을 확인하지 않습니다: \"{}\"",
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
        }
        Ok(findings)
    }
}

/// The result variable of a failure-signalling transfer, when present.
/// `transfer` reverts on its own and is excluded.
fn unchecked_transfer_result(ir: &Operation<Variable>) -> Option<&Variable> {
    match ir {
        Operation::Send {
            lvalue: Some(result),
            reverts_on_failure: false,
            ..
        } => Some(result),
        Operation::LowLevelCall {
            lvalue: Some(result),
            function,
            ..
        } if function == "call" => Some(result),
        _ => None,
    }
}

fn is_read_anywhere(function: &Function, variable: &Variable) -> bool {
    function
        .cfg
        .operations()
        .any(|op| op.read().iter().any(|operand| *operand == variable))
}
