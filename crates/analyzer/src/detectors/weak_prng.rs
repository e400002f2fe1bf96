//! Weak PRNG detection: randomness derived from block values.

use anyhow::Result;

use crate::analysis::is_dependent;
use crate::detectors::{
    function_element, node_element, AnalysisContext, Detector, DetectorDoc,
};
use crate::findings::{BilingualText, Confidence, Finding, Impact};
use crate::ir::{Builtin, BuiltinFunction, Operation, Variable};
use crate::model::Function;

/// Flags modulo operations whose operands derive from miner-influenced
/// block values (`block.timestamp`, `now`, `block.number`,
/// `block.difficulty`) or from `blockhash`/`keccak256` outputs seeded with
/// them.
pub struct WeakPrng;

const DOC: DetectorDoc = DetectorDoc {
    title: "Weak PRNG",
    description: "Random numbers derived from block variables are predictable: the values are \
        identical for every transaction in a block and miners can influence them. Any lottery or \
        reward logic seeded this way can be gamed.",
    exploit_scenario: "A guessing game computes \
        `uint(keccak256(abi.encodePacked(blockhash(block.number - 1), block.timestamp))) % range` \
        to pick a winner. An attacker contract reproduces the identical computation in the same \
        block, submits the \"guess\" and drains the prize pool.",
    recommendation: "Do not seed randomness with block variables or blockhash. Use a \
        commit-reveal scheme or an external VRF (e.g. Chainlink VRF) instead.",
    description_kr: "블록 변수로 생성한 난수는 예측 가능합니다. 같은 블록 안에서는 값이 동일하고, \
        채굴자가 값에 영향을 줄 수 있습니다.",
    exploit_scenario_kr: "공격자는 같은 블록에서 동일한 계산을 재현하여 당첨 번호를 미리 알아내고 \
        상금을 가져갈 수 있습니다.",
    recommendation_kr: "블록 변수나 blockhash를 난수 시드로 사용하지 말고, commit-reveal 방식이나 \
        Chainlink VRF 같은 외부 난수 오라클을 사용하는 것이 좋습니다.",
    references: &[
        "https://www.slowmist.com/articles/solidity-security/Common-Vulnerabilities-in-Solidity-Randomness.html",
        "https://medium.com/rektify-ai/bad-randomness-in-solidity-8b0e4a393858",
    ],
};

impl Detector for WeakPrng {
    fn id(&self) -> &'static str {
        "weak-prng"
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
        let mut findings = Vec::new();
        for contract in ctx.model.contracts_derived() {
            for function in contract.all_function_bodies() {
                for node_id in bad_prng_nodes(function) {
                    let node = &function.cfg.nodes()[node_id];
                    let description = BilingualText::new(
                        format!(
                            "{}.{} uses a weak PRNG: \"{}\"",
                            contract.name,
                            function.name,
                            node.description
                        ),
                        format!(
                            "{}.{} 함수는 블록 변수를 이용하여 난수를 생성합니다: \"{}\"",
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

fn entropy_sources() -> [Variable; 4] {
    [
        Variable::Builtin(Builtin::BlockTimestamp),
        Variable::Builtin(Builtin::Now),
        Variable::Builtin(Builtin::BlockNumber),
        Variable::Builtin(Builtin::BlockDifficulty),
    ]
}

fn bad_prng_nodes(function: &Function) -> Vec<usize> {
    let sources = entropy_sources();

    // Hash outputs seeded by block entropy count as entropy themselves.
    let mut tainted_hashes: Vec<Variable> = Vec::new();
    for op in function.cfg.operations() {
        if let Operation::SolidityCall {
            lvalue: Some(lvalue),
            function: called,
            arguments,
        } = op
        {
            let seeds_entropy = called.is_hash() || *called == BuiltinFunction::Blockhash;
            if seeds_entropy
                && arguments.iter().any(|argument| {
                    sources
                        .iter()
                        .any(|source| is_dependent(argument, source, &function.cfg))
                })
            {
                tainted_hashes.push(lvalue.clone());
            }
        }
    }

    let mut flagged = Vec::new();
    for node in function.nodes() {
        let is_bad = node.irs.iter().any(|ir| {
            let Operation::Binary {
                operator,
                left,
                right,
                ..
            } = ir
            else {
                return false;
            };
            if *operator != crate::ir::BinaryOperator::Modulo {
                return false;
            }
            [left, right].into_iter().any(|operand| {
                sources
                    .iter()
                    .chain(tainted_hashes.iter())
                    .any(|source| is_dependent(operand, source, &function.cfg))
            })
        });
        if is_bad {
            flagged.push(node.id);
        }
    }
    flagged
}
