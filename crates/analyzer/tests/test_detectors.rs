//! Per-detector behavior over hand-built compiler artifacts.

use std::path::Path;

use serde_json::{json, Value};

use tansa_analyzer::detectors::DetectorRegistry;
use tansa_analyzer::findings::Impact;
use tansa_analyzer::solc::invoker::CombinedJson;
use tansa_analyzer::Analyzer;

fn function_node(name: &str, body: Value) -> Value {
    json!({
        "nodeType": "FunctionDefinition",
        "name": name,
        "kind": "function",
        "visibility": "public",
        "stateMutability": "nonpayable",
        "virtual": false,
        "overrides": null,
        "src": "0:0:0",
        "parameters": {"parameters": []},
        "returnParameters": {"parameters": []},
        "modifiers": [],
        "body": body
    })
}

fn analyzer_with_function(version: &str, function: Value, working_dir: &Path) -> Analyzer {
    let combined: CombinedJson = serde_json::from_value(json!({
        "sources": {"d.sol": {"AST": {
            "nodeType": "SourceUnit",
            "nodes": [{
                "nodeType": "ContractDefinition",
                "id": 1,
                "name": "D",
                "contractKind": "contract",
                "abstract": false,
                "baseContracts": [],
                "linearizedBaseContracts": [1],
                "src": "0:0:0",
                "nodes": [function]
            }]
        }}},
        "contracts": {}
    }))
    .unwrap();
    Analyzer::from_combined_json("d.sol", working_dir, version, combined).unwrap()
}

fn checks_fired(analyzer: &Analyzer) -> Vec<String> {
    analyzer
        .run_detectors(&DetectorRegistry::with_defaults())
        .findings
        .iter()
        .map(|f| f.check.clone())
        .collect()
}

#[test]
fn test_tx_origin_in_require_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let body = json!({
        "nodeType": "Block",
        "statements": [{
            "nodeType": "ExpressionStatement",
            "expression": {
                "nodeType": "FunctionCall",
                "kind": "functionCall",
                "src": "10:30:0",
                "expression": {"nodeType": "Identifier", "name": "require"},
                "arguments": [{
                    "nodeType": "BinaryOperation",
                    "operator": "==",
                    "leftExpression": {
                        "nodeType": "MemberAccess",
                        "memberName": "origin",
                        "expression": {"nodeType": "Identifier", "name": "tx"}
                    },
                    "rightExpression": {"nodeType": "Identifier", "name": "owner"}
                }]
            }
        }]
    });
    let analyzer = analyzer_with_function("0.8.19", function_node("guarded", body), dir.path());
    let checks = checks_fired(&analyzer);
    assert!(checks.contains(&"tx-origin".to_string()), "{checks:?}");
}

#[test]
fn test_unused_send_result_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let send_call = json!({
        "nodeType": "FunctionCall",
        "kind": "functionCall",
        "src": "10:20:0",
        "expression": {
            "nodeType": "MemberAccess",
            "memberName": "send",
            "expression": {
                "nodeType": "Identifier",
                "name": "recipient",
                "typeDescriptions": {"typeString": "address payable"}
            }
        },
        "arguments": [{"nodeType": "Identifier", "name": "amount"}]
    });
    let body = json!({
        "nodeType": "Block",
        "statements": [{"nodeType": "ExpressionStatement", "expression": send_call}]
    });
    let analyzer = analyzer_with_function("0.8.19", function_node("pay", body), dir.path());
    let checks = checks_fired(&analyzer);
    assert!(checks.contains(&"unchecked-send".to_string()), "{checks:?}");
}

#[test]
fn test_checked_send_result_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let send_call = json!({
        "nodeType": "FunctionCall",
        "kind": "functionCall",
        "src": "10:20:0",
        "expression": {
            "nodeType": "MemberAccess",
            "memberName": "send",
            "expression": {
                "nodeType": "Identifier",
                "name": "recipient",
                "typeDescriptions": {"typeString": "address payable"}
            }
        },
        "arguments": [{"nodeType": "Identifier", "name": "amount"}]
    });
    let body = json!({
        "nodeType": "Block",
        "statements": [
            {
                "nodeType": "VariableDeclarationStatement",
                "declarations": [{
                    "nodeType": "VariableDeclaration",
                    "name": "ok",
                    "typeName": {"nodeType": "ElementaryTypeName", "name": "bool"},
                    "typeDescriptions": {"typeString": "bool"}
                }],
                "initialValue": send_call
            },
            {
                "nodeType": "ExpressionStatement",
                "expression": {
                    "nodeType": "FunctionCall",
                    "kind": "functionCall",
                    "expression": {"nodeType": "Identifier", "name": "require"},
                    "arguments": [{"nodeType": "Identifier", "name": "ok"}]
                }
            }
        ]
    });
    let analyzer = analyzer_with_function("0.8.19", function_node("pay", body), dir.path());
    let checks = checks_fired(&analyzer);
    assert!(!checks.contains(&"unchecked-send".to_string()), "{checks:?}");
}

#[test]
fn test_timestamp_comparison_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let body = json!({
        "nodeType": "Block",
        "statements": [{
            "nodeType": "IfStatement",
            "condition": {
                "nodeType": "BinaryOperation",
                "operator": ">",
                "src": "10:25:0",
                "leftExpression": {
                    "nodeType": "MemberAccess",
                    "memberName": "timestamp",
                    "expression": {"nodeType": "Identifier", "name": "block"}
                },
                "rightExpression": {"nodeType": "Identifier", "name": "deadline"}
            },
            "trueBody": {"nodeType": "Block", "statements": []},
            "falseBody": null
        }]
    });
    let analyzer = analyzer_with_function("0.8.19", function_node("close", body), dir.path());
    let checks = checks_fired(&analyzer);
    assert!(checks.contains(&"timestamp".to_string()), "{checks:?}");
}

#[test]
fn test_overflow_only_fires_before_0_8() {
    let body = json!({
        "nodeType": "Block",
        "statements": [{
            "nodeType": "ExpressionStatement",
            "expression": {
                "nodeType": "Assignment",
                "operator": "+=",
                "src": "10:10:0",
                "leftHandSide": {"nodeType": "Identifier", "name": "total"},
                "rightHandSide": {"nodeType": "Identifier", "name": "amount"}
            }
        }]
    });

    let dir = tempfile::tempdir().unwrap();
    let old = analyzer_with_function("0.7.6", function_node("add", body.clone()), dir.path());
    assert!(checks_fired(&old).contains(&"integer-overflow".to_string()));

    let new = analyzer_with_function(
        "0.8.19+commit.7dd6d404",
        function_node("add", body),
        dir.path(),
    );
    assert!(!checks_fired(&new).contains(&"integer-overflow".to_string()));
}

#[test]
fn test_inline_assembly_is_informational() {
    let dir = tempfile::tempdir().unwrap();
    let body = json!({
        "nodeType": "Block",
        "statements": [{"nodeType": "InlineAssembly", "src": "10:40:0"}]
    });
    let analyzer = analyzer_with_function("0.8.19", function_node("raw", body), dir.path());
    let run = analyzer.run_detectors(&DetectorRegistry::with_defaults());
    let finding = run
        .findings
        .iter()
        .find(|f| f.check == "assembly-usage")
        .expect("assembly surfaced");
    assert_eq!(finding.impact, Impact::Informational);
}
