//! Storage slot assignment against the EVM packing rules, including the
//! inheritance-then-declaration ordering.

use std::path::Path;

use serde_json::{json, Value};

use tansa_analyzer::solc::invoker::CombinedJson;
use tansa_analyzer::Analyzer;

fn state_variable(name: &str, type_name: Value) -> Value {
    json!({
        "nodeType": "VariableDeclaration",
        "name": name,
        "stateVariable": true,
        "constant": false,
        "mutability": "mutable",
        "visibility": "internal",
        "typeName": type_name,
        "src": "0:0:0"
    })
}

fn elementary(name: &str) -> Value {
    json!({"nodeType": "ElementaryTypeName", "name": name})
}

fn contract_node(id: i64, name: &str, bases: &[(i64, &str)], members: Vec<Value>) -> Value {
    let base_contracts: Vec<Value> = bases
        .iter()
        .map(|(_, base)| json!({"baseName": {"name": base}}))
        .collect();
    let mut linearized = vec![json!(id)];
    linearized.extend(bases.iter().map(|(base_id, _)| json!(base_id)));
    json!({
        "nodeType": "ContractDefinition",
        "id": id,
        "name": name,
        "contractKind": "contract",
        "abstract": false,
        "baseContracts": base_contracts,
        "linearizedBaseContracts": linearized,
        "src": "0:0:0",
        "nodes": members
    })
}

fn analyzer_for(nodes: Vec<Value>, working_dir: &Path) -> Analyzer {
    let combined: CombinedJson = serde_json::from_value(json!({
        "sources": {"s.sol": {"AST": {"nodeType": "SourceUnit", "nodes": nodes}}},
        "contracts": {}
    }))
    .unwrap();
    Analyzer::from_combined_json("s.sol", working_dir, "0.8.19", combined).unwrap()
}

#[test]
fn test_value_types_pack_into_one_slot() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(
        vec![contract_node(
            1,
            "Packed",
            &[],
            vec![
                state_variable("a", elementary("uint8")),
                state_variable("b", elementary("uint8")),
                state_variable("c", elementary("uint256")),
            ],
        )],
        dir.path(),
    );
    let model = &analyzer.units()[0].models[0];
    let contract = model.contract("Packed").unwrap();

    assert_eq!(model.storage_layout_of(contract, "a").unwrap(), (0, 0));
    assert_eq!(model.storage_layout_of(contract, "b").unwrap(), (0, 1));
    // c does not fit in the 30 remaining bytes of slot 0.
    assert_eq!(model.storage_layout_of(contract, "c").unwrap(), (1, 0));
}

#[test]
fn test_mapping_always_starts_a_fresh_slot() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(
        vec![contract_node(
            1,
            "WithMapping",
            &[],
            vec![
                state_variable("flag", elementary("bool")),
                state_variable(
                    "balances",
                    json!({
                        "nodeType": "Mapping",
                        "keyType": elementary("address"),
                        "valueType": elementary("uint256")
                    }),
                ),
                state_variable("after_map", elementary("uint8")),
            ],
        )],
        dir.path(),
    );
    let model = &analyzer.units()[0].models[0];
    let contract = model.contract("WithMapping").unwrap();

    assert_eq!(model.storage_layout_of(contract, "flag").unwrap(), (0, 0));
    assert_eq!(
        model.storage_layout_of(contract, "balances").unwrap(),
        (1, 0)
    );
    assert_eq!(
        model.storage_layout_of(contract, "after_map").unwrap(),
        (2, 0)
    );
}

#[test]
fn test_inherited_variables_come_first() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(
        vec![
            contract_node(
                1,
                "Base",
                &[],
                vec![state_variable("a", elementary("uint8"))],
            ),
            contract_node(
                2,
                "Child",
                &[(1, "Base")],
                vec![
                    state_variable("b", elementary("uint8")),
                    state_variable("c", elementary("uint256")),
                ],
            ),
        ],
        dir.path(),
    );
    let model = &analyzer.units()[0].models[0];
    let child = model.contract("Child").unwrap();

    assert_eq!(model.storage_layout_of(child, "a").unwrap(), (0, 0));
    assert_eq!(model.storage_layout_of(child, "b").unwrap(), (0, 1));
    assert_eq!(model.storage_layout_of(child, "c").unwrap(), (1, 0));
}

#[test]
fn test_constants_occupy_no_storage() {
    let dir = tempfile::tempdir().unwrap();
    let mut constant = state_variable("LIMIT", elementary("uint256"));
    constant["constant"] = json!(true);
    constant["mutability"] = json!("constant");

    let analyzer = analyzer_for(
        vec![contract_node(
            1,
            "WithConstant",
            &[],
            vec![constant, state_variable("x", elementary("uint256"))],
        )],
        dir.path(),
    );
    let model = &analyzer.units()[0].models[0];
    let contract = model.contract("WithConstant").unwrap();

    assert_eq!(model.storage_layout_of(contract, "x").unwrap(), (0, 0));
    assert!(model.storage_layout_of(contract, "LIMIT").is_err());
}

#[test]
fn test_derived_contracts_exclude_inherited_bases() {
    let dir = tempfile::tempdir().unwrap();
    let analyzer = analyzer_for(
        vec![
            contract_node(1, "Base", &[], vec![]),
            contract_node(2, "Child", &[(1, "Base")], vec![]),
        ],
        dir.path(),
    );
    let model = &analyzer.units()[0].models[0];
    let derived: Vec<_> = model.contracts_derived().map(|c| c.name.as_str()).collect();
    assert_eq!(derived, vec!["Child"]);
}
