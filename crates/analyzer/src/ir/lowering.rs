//! Expression lowering
//!
//! Translates each CFG node's statement/expression tree into three-address
//! operations. Lowering is best-effort per node: a construct the engine
//! does not understand degrades that node to an `Unsupported` operation
//! with a diagnostic, and the rest of the function still lowers. An operand
//! that is not a valid rvalue (a type or function name in value position)
//! is different — it indicates the lowering itself is confused, and aborts
//! with [`AnalyzerError::Ir`].

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::cfg::{Cfg, NodeType};
use crate::error::{AnalyzerError, Result};
use crate::ir::operation::{BinaryOperator, BuiltinFunction, Ir, Operation, UnaryOperator};
use crate::ir::variable::{Builtin, Constant, Variable};

/// Name-resolution context for one function, assembled by the declaration
/// builder.
#[derive(Debug, Clone, Default)]
pub struct LoweringContext {
    /// The contract under analysis.
    pub contract: String,
    /// State variable name -> declaring contract (inherited included).
    pub state_variables: HashMap<String, String>,
    /// Parameters, named returns and locals declared anywhere in the body.
    pub local_variables: HashSet<String>,
    /// Functions statically dispatchable from this contract.
    pub internal_functions: HashSet<String>,
    /// Known library names in the compilation unit.
    pub libraries: HashSet<String>,
    /// All contract/interface names in the compilation unit.
    pub contract_names: HashSet<String>,
    /// Enum and struct names visible to the contract.
    pub type_names: HashSet<String>,
    /// Event names visible to the contract.
    pub events: HashSet<String>,
}

enum LowerError {
    /// Construct outside the supported surface; the node degrades.
    Unsupported(String),
    /// Internal inconsistency; aborts the whole lowering pass.
    Internal(String),
}

type LowerResult<T> = std::result::Result<T, LowerError>;

/// What an expression lowers to before it is forced into value position.
enum Operand {
    Var(Variable),
    TypeName(String),
    FunctionName(String),
    Library(String),
    LibraryMember { library: String, member: String },
    TypeMember { type_name: String, member: String },
    ExternalMember { base: Variable, member: String },
    AddressMember { base: Variable, member: String },
    AbiMember(String),
    Tuple(Vec<Operand>),
    Empty,
}

/// Lowers every node of `cfg` in place.
pub fn lower_cfg(cfg: &mut Cfg, ctx: &LoweringContext) -> Result<()> {
    let mut temp_counter = 0;
    let mut ref_counter = 0;

    for id in 0..cfg.len() {
        let node_type = cfg.node(id).node_type;
        let expression = cfg.node(id).expression.clone();

        let mut lowerer = Lowerer {
            ctx,
            temp_counter: &mut temp_counter,
            ref_counter: &mut ref_counter,
            ops: Vec::new(),
        };

        let outcome = lowerer.lower_node(node_type, expression.as_ref());
        let ops = match outcome {
            Ok(()) => lowerer.ops,
            Err(LowerError::Unsupported(reason)) => vec![Operation::Unsupported { reason }],
            Err(LowerError::Internal(reason)) => return Err(AnalyzerError::Ir(reason)),
        };
        cfg.node_mut(id).irs = ops;
    }
    Ok(())
}

struct Lowerer<'a> {
    ctx: &'a LoweringContext,
    temp_counter: &'a mut usize,
    ref_counter: &'a mut usize,
    ops: Vec<Ir>,
}

impl Lowerer<'_> {
    fn lower_node(&mut self, node_type: NodeType, expression: Option<&Value>) -> LowerResult<()> {
        match node_type {
            NodeType::Entry | NodeType::EndIf | NodeType::EndLoop => Ok(()),
            NodeType::Placeholder => {
                self.ops.push(Operation::Nop);
                Ok(())
            }
            NodeType::Assembly => {
                self.ops.push(Operation::Unsupported {
                    reason: "inline assembly block".into(),
                });
                Ok(())
            }
            NodeType::Expression => {
                if let Some(expression) = expression {
                    self.expression(expression)?;
                }
                Ok(())
            }
            NodeType::VariableDeclaration => {
                if let Some(statement) = expression {
                    self.variable_declaration(statement)?;
                }
                Ok(())
            }
            NodeType::Return => {
                let values = match expression.map(|s| &s["expression"]) {
                    None | Some(Value::Null) => Vec::new(),
                    Some(returned) if returned["nodeType"] == "TupleExpression" => {
                        let components =
                            returned["components"].as_array().cloned().unwrap_or_default();
                        components
                            .iter()
                            .filter(|c| !c.is_null())
                            .map(|c| self.rvalue(c))
                            .collect::<LowerResult<Vec<_>>>()?
                    }
                    Some(returned) => vec![self.rvalue(returned)?],
                };
                self.ops.push(Operation::Return { values });
                Ok(())
            }
            NodeType::If | NodeType::Loop => {
                if let Some(condition) = expression {
                    let value = self.rvalue(condition)?;
                    self.ops.push(Operation::Condition { value });
                }
                Ok(())
            }
        }
    }

    fn variable_declaration(&mut self, statement: &Value) -> LowerResult<()> {
        let declarations = statement["declarations"].as_array().cloned().unwrap_or_default();
        if statement["initialValue"].is_null() {
            return Ok(());
        }
        let rvalue = self.rvalue(&statement["initialValue"])?;
        for declaration in declarations.iter().filter(|d| !d.is_null()) {
            if let Some(name) = declaration["name"].as_str() {
                if !name.is_empty() {
                    self.ops.push(Operation::Assignment {
                        lvalue: Variable::local(name),
                        rvalue: rvalue.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Lowers `expr` and forces the result into value position.
    fn rvalue(&mut self, expr: &Value) -> LowerResult<Variable> {
        let operand = self.expression(expr)?;
        self.into_variable(operand)
    }

    fn into_variable(&mut self, operand: Operand) -> LowerResult<Variable> {
        match operand {
            Operand::Var(variable) => Ok(variable),
            Operand::Tuple(mut elements) if elements.len() == 1 => {
                self.into_variable(elements.remove(0))
            }
            Operand::ExternalMember { base, member }
            | Operand::AddressMember { base, member } => {
                // Un-called member reads (`addr.balance`, `token.owner`).
                let lvalue = self.new_reference(base.clone());
                self.ops.push(Operation::Member {
                    lvalue: lvalue.clone(),
                    base,
                    member,
                });
                Ok(lvalue)
            }
            Operand::TypeMember { type_name, member } => {
                // Enum members and similar compile-time constants.
                Ok(Variable::Constant(Constant::Str(format!(
                    "{type_name}.{member}"
                ))))
            }
            Operand::TypeName(name) | Operand::FunctionName(name) | Operand::Library(name) => {
                Err(LowerError::Internal(format!(
                    "'{name}' is not a valid rvalue"
                )))
            }
            Operand::LibraryMember { library, member } => Err(LowerError::Internal(format!(
                "'{library}.{member}' is not a valid rvalue"
            ))),
            Operand::AbiMember(member) => Err(LowerError::Internal(format!(
                "'abi.{member}' is not a valid rvalue"
            ))),
            Operand::Tuple(_) => Err(LowerError::Unsupported(
                "tuple expression in value position".into(),
            )),
            Operand::Empty => Err(LowerError::Unsupported(
                "empty expression in value position".into(),
            )),
        }
    }

    fn expression(&mut self, expr: &Value) -> LowerResult<Operand> {
        let node_type = expr["nodeType"].as_str().unwrap_or("");
        match node_type {
            "Literal" => self.literal(expr),
            "Identifier" => self.identifier(expr["name"].as_str().unwrap_or("")),
            "MemberAccess" => self.member_access(expr),
            "IndexAccess" => {
                let base = self.rvalue(&expr["baseExpression"])?;
                let index = self.rvalue(&expr["indexExpression"])?;
                let lvalue = self.new_reference(base.clone());
                self.ops.push(Operation::Index {
                    lvalue: lvalue.clone(),
                    base,
                    index,
                });
                Ok(Operand::Var(lvalue))
            }
            "BinaryOperation" => {
                let operator = expr["operator"].as_str().unwrap_or("");
                let operator = BinaryOperator::from_token(operator).ok_or_else(|| {
                    LowerError::Unsupported(format!("binary operator '{operator}'"))
                })?;
                let left = self.rvalue(&expr["leftExpression"])?;
                let right = self.rvalue(&expr["rightExpression"])?;
                let lvalue = self.new_temporary();
                self.ops.push(Operation::Binary {
                    lvalue: lvalue.clone(),
                    operator,
                    left,
                    right,
                });
                Ok(Operand::Var(lvalue))
            }
            "UnaryOperation" => self.unary(expr),
            "Assignment" => self.assignment(expr),
            "TupleExpression" => {
                let components = expr["components"].as_array().cloned().unwrap_or_default();
                let mut elements = Vec::new();
                for component in &components {
                    if component.is_null() {
                        elements.push(Operand::Empty);
                    } else {
                        elements.push(self.expression(component)?);
                    }
                }
                Ok(Operand::Tuple(elements))
            }
            "Conditional" => {
                let condition = self.rvalue(&expr["condition"])?;
                self.ops.push(Operation::Condition { value: condition });
                let on_true = self.rvalue(&expr["trueExpression"])?;
                let on_false = self.rvalue(&expr["falseExpression"])?;
                let lvalue = self.new_temporary();
                self.ops.push(Operation::Assignment {
                    lvalue: lvalue.clone(),
                    rvalue: on_true,
                });
                self.ops.push(Operation::Assignment {
                    lvalue: lvalue.clone(),
                    rvalue: on_false,
                });
                Ok(Operand::Var(lvalue))
            }
            "FunctionCall" => self.function_call(expr),
            "FunctionCallOptions" => {
                // Standalone options (not wrapped in a call) carry no
                // semantics of their own.
                self.expression(&expr["expression"])
            }
            "ElementaryTypeNameExpression" => {
                let name = expr["typeName"]["name"]
                    .as_str()
                    .or_else(|| expr["typeName"].as_str())
                    .unwrap_or("unknown");
                Ok(Operand::TypeName(name.to_string()))
            }
            "NewExpression" => {
                let type_string = expr["typeName"]["typeDescriptions"]["typeString"]
                    .as_str()
                    .unwrap_or("unknown");
                Ok(Operand::TypeName(format!("new {type_string}")))
            }
            other => Err(LowerError::Unsupported(format!(
                "unhandled expression '{other}'"
            ))),
        }
    }

    fn literal(&mut self, expr: &Value) -> LowerResult<Operand> {
        let kind = expr["kind"].as_str().unwrap_or("");
        let value = expr["value"].as_str();
        let constant = match kind {
            "bool" => Constant::Bool(value == Some("true")),
            "number" => Constant::Number(
                value
                    .or_else(|| expr["hexValue"].as_str())
                    .unwrap_or("0")
                    .to_string(),
            ),
            _ => Constant::Str(
                value
                    .or_else(|| expr["hexValue"].as_str())
                    .unwrap_or("")
                    .to_string(),
            ),
        };
        Ok(Operand::Var(Variable::Constant(constant)))
    }

    fn identifier(&mut self, name: &str) -> LowerResult<Operand> {
        if self.ctx.local_variables.contains(name) {
            return Ok(Operand::Var(Variable::local(name)));
        }
        if let Some(declarer) = self.ctx.state_variables.get(name) {
            return Ok(Operand::Var(Variable::state(declarer.clone(), name)));
        }
        if let Some(builtin) = Builtin::from_identifier(name) {
            return Ok(Operand::Var(Variable::Builtin(builtin)));
        }
        if self.ctx.libraries.contains(name) {
            return Ok(Operand::Library(name.to_string()));
        }
        if self.ctx.contract_names.contains(name) || self.ctx.type_names.contains(name) {
            return Ok(Operand::TypeName(name.to_string()));
        }
        if self.ctx.internal_functions.contains(name) {
            return Ok(Operand::FunctionName(name.to_string()));
        }
        // Unknown names are treated as top-level variables; they remain
        // valid rvalues for the dependency engine.
        Ok(Operand::Var(Variable::local(name)))
    }

    fn member_access(&mut self, expr: &Value) -> LowerResult<Operand> {
        let member = expr["memberName"].as_str().unwrap_or("").to_string();
        let base_expr = &expr["expression"];

        if base_expr["nodeType"] == "Identifier" {
            let base_name = base_expr["name"].as_str().unwrap_or("");
            if matches!(base_name, "block" | "msg" | "tx") {
                return match Builtin::from_member(base_name, &member) {
                    Some(builtin) => Ok(Operand::Var(Variable::Builtin(builtin))),
                    None => Err(LowerError::Unsupported(format!(
                        "unknown builtin {base_name}.{member}"
                    ))),
                };
            }
            if base_name == "abi" {
                return Ok(Operand::AbiMember(member));
            }
        }

        let base_type = base_expr["typeDescriptions"]["typeString"]
            .as_str()
            .unwrap_or("");

        match self.expression(base_expr)? {
            Operand::Library(library) => Ok(Operand::LibraryMember { library, member }),
            Operand::TypeName(type_name) => Ok(Operand::TypeMember { type_name, member }),
            Operand::FunctionName(name) => Err(LowerError::Unsupported(format!(
                "member '{member}' of function '{name}'"
            ))),
            operand => {
                let base = self.into_variable(operand)?;
                if member == "length" {
                    let lvalue = self.new_temporary();
                    self.ops.push(Operation::Length {
                        lvalue: lvalue.clone(),
                        value: base,
                    });
                    return Ok(Operand::Var(lvalue));
                }
                if matches!(
                    member.as_str(),
                    "send" | "transfer" | "call" | "delegatecall" | "staticcall"
                ) {
                    return Ok(Operand::AddressMember { base, member });
                }
                if base_type.starts_with("contract ") || base_type.starts_with("interface ") {
                    return Ok(Operand::ExternalMember { base, member });
                }
                let lvalue = self.new_reference(base.clone());
                self.ops.push(Operation::Member {
                    lvalue: lvalue.clone(),
                    base,
                    member,
                });
                Ok(Operand::Var(lvalue))
            }
        }
    }

    fn unary(&mut self, expr: &Value) -> LowerResult<Operand> {
        let operator = expr["operator"].as_str().unwrap_or("");
        let sub = &expr["subExpression"];
        match operator {
            "!" | "~" | "-" | "+" => {
                let operand = self.rvalue(sub)?;
                if operator == "+" {
                    return Ok(Operand::Var(operand));
                }
                let operator = UnaryOperator::from_token(operator)
                    .expect("token is one of the handled operators");
                let lvalue = self.new_temporary();
                self.ops.push(Operation::Unary {
                    lvalue: lvalue.clone(),
                    operator,
                    operand,
                });
                Ok(Operand::Var(lvalue))
            }
            "++" | "--" => {
                let target = self.lvalue_of(sub)?;
                let operator = if operator == "++" {
                    BinaryOperator::Addition
                } else {
                    BinaryOperator::Subtraction
                };
                let temporary = self.new_temporary();
                self.ops.push(Operation::Binary {
                    lvalue: temporary.clone(),
                    operator,
                    left: target.clone(),
                    right: Variable::Constant(Constant::Number("1".into())),
                });
                self.ops.push(Operation::Assignment {
                    lvalue: target.clone(),
                    rvalue: temporary,
                });
                Ok(Operand::Var(target))
            }
            "delete" => {
                let target = self.lvalue_of(sub)?;
                self.ops.push(Operation::Assignment {
                    lvalue: target.clone(),
                    rvalue: Variable::Constant(Constant::Number("0".into())),
                });
                Ok(Operand::Var(target))
            }
            other => Err(LowerError::Unsupported(format!(
                "unary operator '{other}'"
            ))),
        }
    }

    fn assignment(&mut self, expr: &Value) -> LowerResult<Operand> {
        let operator = expr["operator"].as_str().unwrap_or("=");
        let rvalue = self.rvalue(&expr["rightHandSide"])?;
        let lhs_expr = &expr["leftHandSide"];

        if lhs_expr["nodeType"] == "TupleExpression" {
            let components = lhs_expr["components"].as_array().cloned().unwrap_or_default();
            for component in components.iter().filter(|c| !c.is_null()) {
                let target = self.lvalue_of(component)?;
                self.ops.push(Operation::Assignment {
                    lvalue: target,
                    rvalue: rvalue.clone(),
                });
            }
            return Ok(Operand::Empty);
        }

        let target = self.lvalue_of(lhs_expr)?;
        if let Some(token) = operator.strip_suffix('=').filter(|t| !t.is_empty()) {
            let binary_operator = BinaryOperator::from_token(token).ok_or_else(|| {
                LowerError::Unsupported(format!("compound assignment '{operator}'"))
            })?;
            let temporary = self.new_temporary();
            self.ops.push(Operation::Binary {
                lvalue: temporary.clone(),
                operator: binary_operator,
                left: target.clone(),
                right: rvalue,
            });
            self.ops.push(Operation::Assignment {
                lvalue: target.clone(),
                rvalue: temporary,
            });
        } else {
            self.ops.push(Operation::Assignment {
                lvalue: target.clone(),
                rvalue,
            });
        }
        Ok(Operand::Var(target))
    }

    /// Resolves an expression in write position. Index and member accesses
    /// produce reference variables; a write through a reference is also a
    /// write to its base.
    fn lvalue_of(&mut self, expr: &Value) -> LowerResult<Variable> {
        match expr["nodeType"].as_str().unwrap_or("") {
            "Identifier" => {
                let operand = self.identifier(expr["name"].as_str().unwrap_or(""))?;
                let variable = self.into_variable(operand)?;
                if !variable.is_assignable() {
                    return Err(LowerError::Internal(format!(
                        "cannot assign to '{variable}'"
                    )));
                }
                Ok(variable)
            }
            "IndexAccess" => {
                let base = self.rvalue(&expr["baseExpression"])?;
                let index = self.rvalue(&expr["indexExpression"])?;
                let lvalue = self.new_reference(base.clone());
                self.ops.push(Operation::Index {
                    lvalue: lvalue.clone(),
                    base,
                    index,
                });
                Ok(lvalue)
            }
            "MemberAccess" => {
                let base = self.rvalue(&expr["expression"])?;
                let member = expr["memberName"].as_str().unwrap_or("").to_string();
                let lvalue = self.new_reference(base.clone());
                self.ops.push(Operation::Member {
                    lvalue: lvalue.clone(),
                    base,
                    member,
                });
                Ok(lvalue)
            }
            other => Err(LowerError::Unsupported(format!(
                "unhandled assignment target '{other}'"
            ))),
        }
    }

    fn function_call(&mut self, expr: &Value) -> LowerResult<Operand> {
        let kind = expr["kind"].as_str().unwrap_or("functionCall");

        let mut arguments = Vec::new();
        for argument in expr["arguments"].as_array().cloned().unwrap_or_default() {
            arguments.push(self.rvalue(&argument)?);
        }

        // `{value: ...}` options wrap the callee expression.
        let mut callee = expr["expression"].clone();
        let mut call_value = None;
        if callee["nodeType"] == "FunctionCallOptions" {
            let names = callee["names"].as_array().cloned().unwrap_or_default();
            let options = callee["options"].as_array().cloned().unwrap_or_default();
            for (name, option) in names.iter().zip(options.iter()) {
                let lowered = self.rvalue(option)?;
                if name.as_str() == Some("value") {
                    call_value = Some(lowered);
                }
            }
            callee = callee["expression"].clone();
        }

        if kind == "typeConversion" {
            let target_type = expr["typeDescriptions"]["typeString"]
                .as_str()
                .unwrap_or("unknown")
                .to_string();
            let value = arguments.into_iter().next().ok_or_else(|| {
                LowerError::Unsupported("type conversion without operand".into())
            })?;
            let lvalue = self.new_temporary();
            self.ops.push(Operation::TypeConversion {
                lvalue: lvalue.clone(),
                value,
                target_type,
            });
            return Ok(Operand::Var(lvalue));
        }

        match callee["nodeType"].as_str().unwrap_or("") {
            "Identifier" => {
                let name = callee["name"].as_str().unwrap_or("");
                if let Some(function) = BuiltinFunction::from_identifier(name) {
                    return self.solidity_call(function, arguments);
                }
                if kind == "structConstructorCall" {
                    let lvalue = self.new_temporary();
                    self.ops.push(Operation::SolidityCall {
                        lvalue: Some(lvalue.clone()),
                        function: BuiltinFunction::Other(format!("struct {name}")),
                        arguments,
                    });
                    return Ok(Operand::Var(lvalue));
                }
                if self.ctx.events.contains(name) {
                    self.ops.push(Operation::SolidityCall {
                        lvalue: None,
                        function: BuiltinFunction::Other(format!("emit {name}")),
                        arguments,
                    });
                    return Ok(Operand::Empty);
                }
                // Internal static dispatch; unknown names resolve here too
                // (inherited or file-level functions).
                let lvalue = self.new_temporary();
                self.ops.push(Operation::InternalCall {
                    lvalue: Some(lvalue.clone()),
                    function: name.to_string(),
                    arguments,
                });
                Ok(Operand::Var(lvalue))
            }
            "MemberAccess" => {
                let operand = self.member_access(&callee)?;
                self.member_call(operand, arguments, call_value)
            }
            "NewExpression" => {
                let type_string = callee["typeName"]["typeDescriptions"]["typeString"]
                    .as_str()
                    .unwrap_or("unknown");
                let lvalue = self.new_temporary();
                self.ops.push(Operation::SolidityCall {
                    lvalue: Some(lvalue.clone()),
                    function: BuiltinFunction::Other(format!("new {type_string}")),
                    arguments,
                });
                Ok(Operand::Var(lvalue))
            }
            other => Err(LowerError::Unsupported(format!(
                "unhandled call target '{other}'"
            ))),
        }
    }

    fn member_call(
        &mut self,
        callee: Operand,
        arguments: Vec<Variable>,
        call_value: Option<Variable>,
    ) -> LowerResult<Operand> {
        match callee {
            Operand::AbiMember(member) => {
                let function = BuiltinFunction::from_abi_member(&member)
                    .unwrap_or_else(|| BuiltinFunction::Other(format!("abi.{member}")));
                self.solidity_call(function, arguments)
            }
            Operand::LibraryMember { library, member } => {
                let lvalue = self.new_temporary();
                self.ops.push(Operation::LibraryCall {
                    lvalue: Some(lvalue.clone()),
                    library,
                    function: member,
                    arguments,
                });
                Ok(Operand::Var(lvalue))
            }
            Operand::TypeMember { type_name, member } => {
                if self.ctx.libraries.contains(&type_name) {
                    let lvalue = self.new_temporary();
                    self.ops.push(Operation::LibraryCall {
                        lvalue: Some(lvalue.clone()),
                        library: type_name,
                        function: member,
                        arguments,
                    });
                    return Ok(Operand::Var(lvalue));
                }
                let lvalue = self.new_temporary();
                self.ops.push(Operation::InternalCall {
                    lvalue: Some(lvalue.clone()),
                    function: format!("{type_name}.{member}"),
                    arguments,
                });
                Ok(Operand::Var(lvalue))
            }
            Operand::AddressMember { base, member } => match member.as_str() {
                "send" => {
                    let value = arguments.into_iter().next().ok_or_else(|| {
                        LowerError::Unsupported("send without a value argument".into())
                    })?;
                    let lvalue = self.new_temporary();
                    self.ops.push(Operation::Send {
                        lvalue: Some(lvalue.clone()),
                        destination: base,
                        value,
                        reverts_on_failure: false,
                    });
                    Ok(Operand::Var(lvalue))
                }
                "transfer" => {
                    let value = arguments.into_iter().next().ok_or_else(|| {
                        LowerError::Unsupported("transfer without a value argument".into())
                    })?;
                    self.ops.push(Operation::Send {
                        lvalue: None,
                        destination: base,
                        value,
                        reverts_on_failure: true,
                    });
                    Ok(Operand::Empty)
                }
                _ => {
                    let lvalue = self.new_temporary();
                    self.ops.push(Operation::LowLevelCall {
                        lvalue: Some(lvalue.clone()),
                        destination: base,
                        function: member,
                        arguments,
                        call_value,
                    });
                    Ok(Operand::Var(lvalue))
                }
            },
            Operand::ExternalMember { base, member } => {
                let lvalue = self.new_temporary();
                self.ops.push(Operation::HighLevelCall {
                    lvalue: Some(lvalue.clone()),
                    destination: base,
                    function: member,
                    arguments,
                    call_value,
                });
                Ok(Operand::Var(lvalue))
            }
            Operand::Var(variable) => {
                // Calls through function-typed values keep static dispatch
                // by name; precise targets are out of reach here.
                let lvalue = self.new_temporary();
                self.ops.push(Operation::InternalCall {
                    lvalue: Some(lvalue.clone()),
                    function: variable.name(),
                    arguments,
                });
                Ok(Operand::Var(lvalue))
            }
            _ => Err(LowerError::Unsupported("unhandled member call".into())),
        }
    }

    fn solidity_call(
        &mut self,
        function: BuiltinFunction,
        arguments: Vec<Variable>,
    ) -> LowerResult<Operand> {
        let produces_value = !matches!(
            function,
            BuiltinFunction::Require
                | BuiltinFunction::Assert
                | BuiltinFunction::Revert
                | BuiltinFunction::Selfdestruct
        );
        let lvalue = produces_value.then(|| self.new_temporary());
        self.ops.push(Operation::SolidityCall {
            lvalue: lvalue.clone(),
            function,
            arguments,
        });
        Ok(match lvalue {
            Some(lvalue) => Operand::Var(lvalue),
            None => Operand::Empty,
        })
    }

    fn new_temporary(&mut self) -> Variable {
        let index = *self.temp_counter;
        *self.temp_counter += 1;
        Variable::Temporary { index }
    }

    fn new_reference(&mut self, base: Variable) -> Variable {
        let index = *self.ref_counter;
        *self.ref_counter += 1;
        Variable::Reference {
            index,
            base: Box::new(base.dereferenced().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::build_cfg;
    use serde_json::json;

    fn context() -> LoweringContext {
        let mut ctx = LoweringContext {
            contract: "C".into(),
            ..Default::default()
        };
        ctx.local_variables.insert("x".into());
        ctx.state_variables.insert("total".into(), "C".into());
        ctx
    }

    fn lower_body(body: serde_json::Value, ctx: &LoweringContext) -> Cfg {
        let mut cfg = build_cfg(&body);
        lower_cfg(&mut cfg, ctx).unwrap();
        cfg
    }

    #[test]
    fn test_modulo_on_block_timestamp() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "Return",
                "expression": {
                    "nodeType": "BinaryOperation",
                    "operator": "%",
                    "leftExpression": {"nodeType": "Identifier", "name": "x"},
                    "rightExpression": {
                        "nodeType": "MemberAccess",
                        "memberName": "timestamp",
                        "expression": {"nodeType": "Identifier", "name": "block"}
                    }
                }
            }]
        });
        let cfg = lower_body(body, &context());
        let binary = cfg
            .operations()
            .find(|op| matches!(op, Operation::Binary { .. }))
            .unwrap();
        match binary {
            Operation::Binary {
                operator,
                left,
                right,
                ..
            } => {
                assert_eq!(*operator, BinaryOperator::Modulo);
                assert_eq!(left, &Variable::local("x"));
                assert_eq!(right, &Variable::Builtin(Builtin::BlockTimestamp));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_compound_assignment_reads_target() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "ExpressionStatement",
                "expression": {
                    "nodeType": "Assignment",
                    "operator": "+=",
                    "leftHandSide": {"nodeType": "Identifier", "name": "total"},
                    "rightHandSide": {"nodeType": "Identifier", "name": "x"}
                }
            }]
        });
        let cfg = lower_body(body, &context());
        let ops: Vec<_> = cfg.operations().collect();
        assert!(matches!(ops[0], Operation::Binary { left, .. }
            if *left == Variable::state("C", "total")));
        assert!(matches!(ops[1], Operation::Assignment { lvalue, .. }
            if *lvalue == Variable::state("C", "total")));
    }

    #[test]
    fn test_mapping_write_goes_through_reference() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "ExpressionStatement",
                "expression": {
                    "nodeType": "Assignment",
                    "operator": "=",
                    "leftHandSide": {
                        "nodeType": "IndexAccess",
                        "baseExpression": {"nodeType": "Identifier", "name": "total"},
                        "indexExpression": {"nodeType": "Identifier", "name": "x"}
                    },
                    "rightHandSide": {"nodeType": "Identifier", "name": "x"}
                }
            }]
        });
        let cfg = lower_body(body, &context());
        let assignment = cfg
            .operations()
            .find(|op| matches!(op, Operation::Assignment { .. }))
            .unwrap();
        match assignment {
            Operation::Assignment { lvalue, .. } => {
                assert_eq!(lvalue.dereferenced(), &Variable::state("C", "total"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_transfer_lowers_to_reverting_send() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "ExpressionStatement",
                "expression": {
                    "nodeType": "FunctionCall",
                    "kind": "functionCall",
                    "arguments": [{"nodeType": "Identifier", "name": "x"}],
                    "expression": {
                        "nodeType": "MemberAccess",
                        "memberName": "transfer",
                        "expression": {
                            "nodeType": "Identifier",
                            "name": "recipient",
                            "typeDescriptions": {"typeString": "address payable"}
                        }
                    }
                }
            }]
        });
        let cfg = lower_body(body, &context());
        let send = cfg
            .operations()
            .find(|op| matches!(op, Operation::Send { .. }))
            .unwrap();
        assert!(matches!(
            send,
            Operation::Send {
                reverts_on_failure: true,
                lvalue: None,
                ..
            }
        ));
    }

    #[test]
    fn test_require_has_no_lvalue() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "ExpressionStatement",
                "expression": {
                    "nodeType": "FunctionCall",
                    "kind": "functionCall",
                    "arguments": [{"nodeType": "Identifier", "name": "x"}],
                    "expression": {"nodeType": "Identifier", "name": "require"}
                }
            }]
        });
        let cfg = lower_body(body, &context());
        assert!(cfg.nodes()[1].contains_require_or_assert());
        let call = cfg.operations().next().unwrap();
        assert!(call.lvalue().is_none());
    }

    #[test]
    fn test_unknown_construct_degrades_to_unsupported() {
        let body = json!({
            "nodeType": "Block",
            "statements": [{
                "nodeType": "ExpressionStatement",
                "expression": {"nodeType": "SomethingNovel"}
            }]
        });
        let cfg = lower_body(body, &context());
        assert!(matches!(
            cfg.operations().next().unwrap(),
            Operation::Unsupported { .. }
        ));
    }
}
