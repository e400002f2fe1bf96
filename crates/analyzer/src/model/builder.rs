//! AST → declaration builder
//!
//! Converts raw compact-format AST trees into the typed contract model and
//! lowers every function body. This stage assumes a self-consistent AST
//! from a successful compile: an unresolved intra-unit reference is a
//! [`AnalyzerError::Parsing`], not a degraded result.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::cfg::build_cfg;
use crate::compilation::{Compilation, Filename};
use crate::error::{AnalyzerError, Result};
use crate::ir::{compute_ssa, lower_cfg, LoweringContext};
use crate::model::contract::{Contract, ContractKind};
use crate::model::declarations::{
    CustomError, EnumDeclaration, EventDeclaration, Mutability, Parameter, SourceSpan,
    StateVariable, Structure, Type, UsingFor, Visibility,
};
use crate::model::function::{Function, FunctionKind};
use crate::model::CompilationModel;

/// Builds one typed model per compilation unit.
pub fn build_model(compilation: &Compilation) -> Result<Vec<CompilationModel>> {
    let mut models = Vec::new();
    for unit in compilation.units().values() {
        let mut skeletons = Vec::new();
        for (filename, source_unit) in unit.source_units() {
            for node in source_unit.ast["nodes"].as_array().cloned().unwrap_or_default() {
                if node["nodeType"] == "ContractDefinition" {
                    skeletons.push((filename.clone(), node));
                }
            }
        }

        let registry = Registry::collect(&skeletons)?;

        let mut contracts = Vec::new();
        for (filename, node) in &skeletons {
            contracts.push(build_contract(filename, node, &registry)?);
        }

        let mut model = CompilationModel::new(unit.compiler_version().to_string(), contracts);
        let lowered = lower_bodies(&model, &skeletons, compilation)?;
        for (contract, function, is_modifier, cfg) in lowered {
            model.attach_cfg(&contract, &function, is_modifier, cfg);
        }
        models.push(model);
    }
    Ok(models)
}

/// Unit-wide name tables used to resolve references while building. The
/// linearization arrives as AST ids, so both directions are needed.
struct Registry {
    id_to_name: HashMap<i64, String>,
    names: HashSet<String>,
}

impl Registry {
    fn collect(skeletons: &[(Filename, Value)]) -> Result<Self> {
        let mut registry = Self {
            id_to_name: HashMap::new(),
            names: HashSet::new(),
        };
        for (_, node) in skeletons {
            let name = contract_name(node)?;
            if let Some(id) = node["id"].as_i64() {
                registry.id_to_name.insert(id, name.clone());
            }
            registry.names.insert(name);
        }
        Ok(registry)
    }
}

fn contract_name(node: &Value) -> Result<String> {
    node["name"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AnalyzerError::Parsing("contract definition without a name".into()))
}

fn build_contract(filename: &Filename, node: &Value, registry: &Registry) -> Result<Contract> {
    let name = contract_name(node)?;
    let kind = ContractKind::parse(node["contractKind"].as_str().unwrap_or("contract"));
    let is_abstract = node["abstract"].as_bool().unwrap_or(false);

    let mut base_names = Vec::new();
    for specifier in node["baseContracts"].as_array().cloned().unwrap_or_default() {
        let base = specifier["baseName"]["name"]
            .as_str()
            .or_else(|| specifier["baseName"]["pathNode"]["name"].as_str())
            .ok_or_else(|| {
                AnalyzerError::Parsing(format!("unresolvable base contract of '{name}'"))
            })?;
        if !registry.names.contains(base) {
            return Err(AnalyzerError::Parsing(format!(
                "contract '{name}' inherits unknown contract '{base}'"
            )));
        }
        base_names.push(base.to_string());
    }

    // The compiler emits the linearization as AST ids, most-derived first.
    let mut linearized_bases = Vec::new();
    let linearized_ids = node["linearizedBaseContracts"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    if linearized_ids.is_empty() {
        linearized_bases.push(name.clone());
        for base in &base_names {
            linearized_bases.push(base.clone());
        }
    } else {
        for id in linearized_ids {
            let id = id.as_i64().ok_or_else(|| {
                AnalyzerError::Parsing(format!("malformed linearization of '{name}'"))
            })?;
            let base = registry.id_to_name.get(&id).ok_or_else(|| {
                AnalyzerError::Parsing(format!(
                    "linearization of '{name}' references unknown declaration {id}"
                ))
            })?;
            linearized_bases.push(base.clone());
        }
    }

    let mut contract = Contract {
        name: name.clone(),
        kind,
        is_abstract,
        base_names,
        linearized_bases,
        state_variables: Vec::new(),
        structs: Vec::new(),
        enums: Vec::new(),
        events: Vec::new(),
        custom_errors: Vec::new(),
        functions: Vec::new(),
        modifiers: Vec::new(),
        using_for: Vec::new(),
        filename: filename.clone(),
        src: SourceSpan::from_node(node),
    };

    for member in node["nodes"].as_array().cloned().unwrap_or_default() {
        match member["nodeType"].as_str().unwrap_or("") {
            "VariableDeclaration" => {
                contract.state_variables.push(build_state_variable(&member, &name));
            }
            "FunctionDefinition" => {
                contract.functions.push(build_function(&member, &name));
            }
            "ModifierDefinition" => {
                contract.modifiers.push(build_modifier(&member, &name));
            }
            "StructDefinition" => {
                contract.structs.push(build_struct(&member, Some(name.clone())));
            }
            "EnumDefinition" => {
                contract.enums.push(build_enum(&member, Some(name.clone())));
            }
            "EventDefinition" => {
                contract.events.push(EventDeclaration {
                    name: member["name"].as_str().unwrap_or("").to_string(),
                    parameters: build_parameters(&member["parameters"]),
                    contract: Some(name.clone()),
                    src: SourceSpan::from_node(&member),
                });
            }
            "ErrorDefinition" => {
                contract.custom_errors.push(CustomError {
                    name: member["name"].as_str().unwrap_or("").to_string(),
                    parameters: build_parameters(&member["parameters"]),
                    contract: Some(name.clone()),
                    src: SourceSpan::from_node(&member),
                });
            }
            "UsingForDirective" => {
                let library = member["libraryName"]["name"]
                    .as_str()
                    .or_else(|| member["libraryName"]["pathNode"]["name"].as_str())
                    .unwrap_or("")
                    .to_string();
                let target = if member["typeName"].is_null() {
                    None
                } else {
                    Some(Type::from_type_name(&member["typeName"]).type_string())
                };
                contract.using_for.push(UsingFor { library, target });
            }
            other => {
                debug!(contract = %name, member = other, "skipping contract member");
            }
        }
    }

    Ok(contract)
}

fn build_state_variable(node: &Value, contract: &str) -> StateVariable {
    let mutability = node["mutability"].as_str().unwrap_or("mutable");
    StateVariable {
        name: node["name"].as_str().unwrap_or("").to_string(),
        ty: Type::from_type_name(&node["typeName"]),
        visibility: Visibility::parse(node["visibility"].as_str().unwrap_or("internal")),
        is_constant: node["constant"].as_bool().unwrap_or(false) || mutability == "constant",
        is_immutable: mutability == "immutable",
        contract: contract.to_string(),
        src: SourceSpan::from_node(node),
    }
}

fn build_parameters(parameter_list: &Value) -> Vec<Parameter> {
    parameter_list["parameters"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|p| Parameter {
            name: p["name"].as_str().unwrap_or("").to_string(),
            type_string: p["typeDescriptions"]["typeString"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| Type::from_type_name(&p["typeName"]).type_string()),
        })
        .collect()
}

fn build_function(node: &Value, contract: &str) -> Function {
    Function {
        name: node["name"].as_str().unwrap_or("").to_string(),
        kind: FunctionKind::parse(node["kind"].as_str().unwrap_or("function")),
        visibility: Visibility::parse(node["visibility"].as_str().unwrap_or("internal")),
        mutability: Mutability::parse(node["stateMutability"].as_str().unwrap_or("nonpayable")),
        parameters: build_parameters(&node["parameters"]),
        returns: build_parameters(&node["returnParameters"]),
        modifiers: node["modifiers"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| {
                m["modifierName"]["name"]
                    .as_str()
                    .or_else(|| m["modifierName"]["pathNode"]["name"].as_str())
                    .map(str::to_string)
            })
            .collect(),
        contract_declarer: contract.to_string(),
        is_virtual: node["virtual"].as_bool().unwrap_or(false),
        is_override: !node["overrides"].is_null(),
        cfg: crate::cfg::Cfg::new(),
        src: SourceSpan::from_node(node),
    }
}

fn build_modifier(node: &Value, contract: &str) -> Function {
    Function {
        name: node["name"].as_str().unwrap_or("").to_string(),
        kind: FunctionKind::Modifier,
        visibility: Visibility::Internal,
        mutability: Mutability::NonPayable,
        parameters: build_parameters(&node["parameters"]),
        returns: Vec::new(),
        modifiers: Vec::new(),
        contract_declarer: contract.to_string(),
        is_virtual: node["virtual"].as_bool().unwrap_or(false),
        is_override: !node["overrides"].is_null(),
        cfg: crate::cfg::Cfg::new(),
        src: SourceSpan::from_node(node),
    }
}

fn build_struct(node: &Value, contract: Option<String>) -> Structure {
    Structure {
        name: node["name"].as_str().unwrap_or("").to_string(),
        members: node["members"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|m| {
                (
                    m["name"].as_str().unwrap_or("").to_string(),
                    Type::from_type_name(&m["typeName"]),
                )
            })
            .collect(),
        contract,
        src: SourceSpan::from_node(node),
    }
}

fn build_enum(node: &Value, contract: Option<String>) -> EnumDeclaration {
    EnumDeclaration {
        name: node["name"].as_str().unwrap_or("").to_string(),
        values: node["members"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| m["name"].as_str().map(str::to_string))
            .collect(),
        contract,
        src: SourceSpan::from_node(node),
    }
}

/// Second pass: build each function's CFG, lower it, run SSA and attach
/// readable node descriptions. Needs the finished model for inheritance-
/// aware name resolution, so it runs after every contract exists and the
/// results are attached afterward.
fn lower_bodies(
    model: &CompilationModel,
    skeletons: &[(Filename, Value)],
    compilation: &Compilation,
) -> Result<Vec<(String, String, bool, crate::cfg::Cfg)>> {
    let mut lowered = Vec::new();
    for (filename, node) in skeletons {
        let name = contract_name(node)?;
        let Some(contract) = model.contract(&name) else {
            continue;
        };
        let ctx_base = lowering_context(model, contract);

        for member in node["nodes"].as_array().cloned().unwrap_or_default() {
            let member_kind = member["nodeType"].as_str().unwrap_or("");
            if member_kind != "FunctionDefinition" && member_kind != "ModifierDefinition" {
                continue;
            }
            if member["body"].is_null() {
                continue;
            }
            let function_name = member["name"].as_str().unwrap_or("");

            let mut ctx = ctx_base.clone();
            collect_locals(&member, &mut ctx.local_variables);

            let mut cfg = build_cfg(&member["body"]);
            lower_cfg(&mut cfg, &ctx)?;
            compute_ssa(&mut cfg);
            describe_nodes(&mut cfg, compilation, filename);

            lowered.push((
                name.clone(),
                function_name.to_string(),
                member_kind == "ModifierDefinition",
                cfg,
            ));
        }
    }
    Ok(lowered)
}

fn lowering_context(model: &CompilationModel, contract: &Contract) -> LoweringContext {
    let mut ctx = LoweringContext {
        contract: contract.name.clone(),
        ..Default::default()
    };

    // Most-derived first so shadowing state variables resolve to the
    // nearest declarer.
    for base_name in &contract.linearized_bases {
        if let Some(base) = model.contract(base_name) {
            for variable in &base.state_variables {
                ctx.state_variables
                    .entry(variable.name.clone())
                    .or_insert_with(|| base.name.clone());
            }
            for function in &base.functions {
                ctx.internal_functions.insert(function.name.clone());
            }
        }
    }

    for other in model.contracts() {
        ctx.contract_names.insert(other.name.clone());
        if other.is_library() {
            ctx.libraries.insert(other.name.clone());
        }
        for structure in &other.structs {
            ctx.type_names.insert(structure.name.clone());
        }
        for enumeration in &other.enums {
            ctx.type_names.insert(enumeration.name.clone());
        }
        for event in &other.events {
            ctx.events.insert(event.name.clone());
        }
    }

    ctx
}

/// Every `VariableDeclaration` nested in the member: parameters, named
/// returns and body locals.
fn collect_locals(node: &Value, locals: &mut HashSet<String>) {
    match node {
        Value::Object(map) => {
            if map.get("nodeType").and_then(Value::as_str) == Some("VariableDeclaration") {
                if let Some(name) = map.get("name").and_then(Value::as_str) {
                    if !name.is_empty() {
                        locals.insert(name.to_string());
                    }
                }
            }
            for value in map.values() {
                collect_locals(value, locals);
            }
        }
        Value::Array(values) => {
            for value in values {
                collect_locals(value, locals);
            }
        }
        _ => {}
    }
}

fn describe_nodes(cfg: &mut crate::cfg::Cfg, compilation: &Compilation, filename: &Filename) {
    let source = compilation.source_content(&filename.absolute);
    for node in cfg.nodes_mut() {
        let snippet = node
            .src
            .as_deref()
            .and_then(SourceSpan::parse)
            .and_then(|span| {
                source.as_ref().and_then(|text| {
                    text.get(span.start..span.start + span.length)
                        .map(|s| s.lines().next().unwrap_or(s).trim().to_string())
                })
            });
        node.description = snippet.unwrap_or_else(|| {
            node.irs
                .first()
                .map(|ir| ir.mnemonic().to_string())
                .unwrap_or_else(|| format!("{:?}", node.node_type))
        });
    }
}
