//! `tx.origin` used for authorization.

use anyhow::Result;

use crate::analysis::is_dependent;
use crate::cfg::NodeType;
use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};
use crate::ir::{Builtin, Operation, Variable};
use crate::model::Function;

/// Flags conditionals (`if`, `require`, `assert`) whose condition depends
/// on `tx.origin`. `tx.origin` names the transaction signer, not the
/// caller, so any contract the user interacts with can pass the check on
/// their behalf.
pub struct TxOriginAuth;

const DOC: DetectorDoc = DetectorDoc {
    title: "Authorization through tx.origin",
    description: "tx.origin is the externally owned account that signed the transaction, not \
        the immediate caller. Authorization based on it can be proxied through any contract the \
        legitimate user is tricked into calling.",
    exploit_scenario: "A wallet checks `require(tx.origin == owner)`. A phishing contract's \
        innocuous-looking function forwards a call into the wallet; because the owner signed the \
        outer transaction, the check passes and funds move.",
    recommendation: "Authorize with `msg.sender`. Reserve tx.origin for explicitly rejecting \
        contract intermediaries (`tx.origin == msg.sender`).",
    description_kr: "tx.origin은 트랜잭션 서명자를 가리키며 직접 호출자를 의미하지 않습니다. \
        tx.origin 기반 권한 검사는 중간 컨트랙트를 통해 우회될 수 있습니다.",
    exploit_scenario_kr: "피싱 컨트랙트가 지갑 함수를 대신 호출하면 소유자가 서명한 트랜잭션이므로 \
        `require(tx.origin == owner)` 검사를 통과하게 됩니다.",
    recommendation_kr: "권한 검사는 msg.sender를 사용하는 것이 좋습니다.",
    references: &[
        "https://docs.soliditylang.org/en/latest/security-considerations.html#tx-origin",
    ],
};

impl Detector for TxOriginAuth {
    fn id(&self) -> &'static str {
        "tx-origin"
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
                    if !guards_with_tx_origin(function, node) {
                        continue;
                    }
                    let description = BilingualText::new(
                        format!(
                            "{}.{} authorizes with tx.origin: \"{}\"",
                            contract.name, function.name, node.description
                        ),
                        format!(
                            "{}.{} 함수는 tx.origin으로 권한을 검사합니다: \"{}\"",
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

fn guards_with_tx_origin(function: &Function, node: &crate::cfg::Node) -> bool {
    let origin = Variable::Builtin(Builtin::TxOrigin);

    let is_guard = node.node_type == NodeType::If || node.contains_require_or_assert();
    if !is_guard {
        return false;
    }

    node.irs.iter().any(|ir| match ir {
        Operation::Condition { value } => is_dependent(value, &origin, &function.cfg),
        Operation::SolidityCall { arguments, .. } => arguments
            .iter()
            .any(|argument| is_dependent(argument, &origin, &function.cfg)),
        _ => false,
    })
}
