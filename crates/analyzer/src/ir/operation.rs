//! Three-address operations
//!
//! [`Operation`] is generic over its variable namespace so the non-SSA and
//! SSA forms are the same shape with different identities: `Operation<Variable>`
//! is produced by the lowering pass, `Operation<SsaVariable>` by the SSA
//! pass. Every operation exposes the operands it reads and the value it
//! defines, which is all the data-dependency engine needs.

use std::fmt;

use serde::Serialize;

use crate::ir::variable::{SsaVariable, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOperator {
    Power,
    Multiplication,
    Division,
    Modulo,
    Addition,
    Subtraction,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "**" => Some(Self::Power),
            "*" => Some(Self::Multiplication),
            "/" => Some(Self::Division),
            "%" => Some(Self::Modulo),
            "+" => Some(Self::Addition),
            "-" => Some(Self::Subtraction),
            "<<" => Some(Self::LeftShift),
            ">>" => Some(Self::RightShift),
            "&" => Some(Self::BitwiseAnd),
            "^" => Some(Self::BitwiseXor),
            "|" => Some(Self::BitwiseOr),
            "<" => Some(Self::Less),
            ">" => Some(Self::Greater),
            "<=" => Some(Self::LessEqual),
            ">=" => Some(Self::GreaterEqual),
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "&&" => Some(Self::LogicalAnd),
            "||" => Some(Self::LogicalOr),
            _ => None,
        }
    }

    /// Operators whose result is boolean.
    pub fn returns_bool(&self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Greater
                | Self::LessEqual
                | Self::GreaterEqual
                | Self::Equal
                | Self::NotEqual
                | Self::LogicalAnd
                | Self::LogicalOr
        )
    }

    /// Arithmetic that can wrap on pre-0.8.0 compilers.
    pub fn can_overflow(&self) -> bool {
        matches!(
            self,
            Self::Power | Self::Multiplication | Self::Addition | Self::Subtraction
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOperator {
    Not,
    BitwiseNot,
    Minus,
}

impl UnaryOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "!" => Some(Self::Not),
            "~" => Some(Self::BitwiseNot),
            "-" => Some(Self::Minus),
            _ => None,
        }
    }
}

/// Language-level builtin callables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinFunction {
    Require,
    Assert,
    Revert,
    Keccak256,
    Sha256,
    Ripemd160,
    Ecrecover,
    Blockhash,
    AddMod,
    MulMod,
    Selfdestruct,
    Gasleft,
    AbiEncode,
    AbiEncodePacked,
    AbiDecode,
    Other(String),
}

impl BuiltinFunction {
    pub fn from_identifier(name: &str) -> Option<Self> {
        match name {
            "require" => Some(Self::Require),
            "assert" => Some(Self::Assert),
            "revert" => Some(Self::Revert),
            "keccak256" | "sha3" => Some(Self::Keccak256),
            "sha256" => Some(Self::Sha256),
            "ripemd160" => Some(Self::Ripemd160),
            "ecrecover" => Some(Self::Ecrecover),
            "blockhash" => Some(Self::Blockhash),
            "addmod" => Some(Self::AddMod),
            "mulmod" => Some(Self::MulMod),
            "selfdestruct" | "suicide" => Some(Self::Selfdestruct),
            "gasleft" => Some(Self::Gasleft),
            _ => None,
        }
    }

    pub fn from_abi_member(member: &str) -> Option<Self> {
        match member {
            "encode" => Some(Self::AbiEncode),
            "encodePacked" => Some(Self::AbiEncodePacked),
            "decode" => Some(Self::AbiDecode),
            _ => None,
        }
    }

    /// Hash functions whose output is only as unpredictable as its inputs.
    pub fn is_hash(&self) -> bool {
        matches!(self, Self::Keccak256 | Self::Sha256 | Self::Ripemd160)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operation<V> {
    Assignment {
        lvalue: V,
        rvalue: V,
    },
    Binary {
        lvalue: V,
        operator: BinaryOperator,
        left: V,
        right: V,
    },
    Unary {
        lvalue: V,
        operator: UnaryOperator,
        operand: V,
    },
    TypeConversion {
        lvalue: V,
        value: V,
        target_type: String,
    },
    /// Static dispatch within the analyzed contract (or its bases).
    InternalCall {
        lvalue: Option<V>,
        function: String,
        arguments: Vec<V>,
    },
    /// Cross-contract call through a contract-typed expression.
    HighLevelCall {
        lvalue: Option<V>,
        destination: V,
        function: String,
        arguments: Vec<V>,
        call_value: Option<V>,
    },
    /// Statically dispatched library call.
    LibraryCall {
        lvalue: Option<V>,
        library: String,
        function: String,
        arguments: Vec<V>,
    },
    /// `call`/`delegatecall`/`staticcall` on an address.
    LowLevelCall {
        lvalue: Option<V>,
        destination: V,
        function: String,
        arguments: Vec<V>,
        call_value: Option<V>,
    },
    /// `send` (returns bool) or `transfer` (reverts on failure).
    Send {
        lvalue: Option<V>,
        destination: V,
        value: V,
        reverts_on_failure: bool,
    },
    SolidityCall {
        lvalue: Option<V>,
        function: BuiltinFunction,
        arguments: Vec<V>,
    },
    Index {
        lvalue: V,
        base: V,
        index: V,
    },
    Member {
        lvalue: V,
        base: V,
        member: String,
    },
    Length {
        lvalue: V,
        value: V,
    },
    Condition {
        value: V,
    },
    Return {
        values: Vec<V>,
    },
    /// A construct the lowering does not understand. Control-flow shape is
    /// preserved; the diagnostic names what was skipped.
    Unsupported {
        reason: String,
    },
    Nop,
}

impl<V> Operation<V> {
    /// Operands consumed by this operation.
    pub fn read(&self) -> Vec<&V> {
        match self {
            Self::Assignment { rvalue, .. } => vec![rvalue],
            Self::Binary { left, right, .. } => vec![left, right],
            Self::Unary { operand, .. } => vec![operand],
            Self::TypeConversion { value, .. } => vec![value],
            Self::InternalCall { arguments, .. } => arguments.iter().collect(),
            Self::HighLevelCall {
                destination,
                arguments,
                call_value,
                ..
            }
            | Self::LowLevelCall {
                destination,
                arguments,
                call_value,
                ..
            } => {
                let mut read = vec![destination];
                read.extend(arguments.iter());
                read.extend(call_value.iter());
                read
            }
            Self::LibraryCall { arguments, .. } => arguments.iter().collect(),
            Self::Send {
                destination, value, ..
            } => vec![destination, value],
            Self::SolidityCall { arguments, .. } => arguments.iter().collect(),
            Self::Index { base, index, .. } => vec![base, index],
            Self::Member { base, .. } => vec![base],
            Self::Length { value, .. } => vec![value],
            Self::Condition { value } => vec![value],
            Self::Return { values } => values.iter().collect(),
            Self::Unsupported { .. } | Self::Nop => Vec::new(),
        }
    }

    /// The value this operation defines, when it produces one.
    pub fn lvalue(&self) -> Option<&V> {
        match self {
            Self::Assignment { lvalue, .. }
            | Self::Binary { lvalue, .. }
            | Self::Unary { lvalue, .. }
            | Self::TypeConversion { lvalue, .. }
            | Self::Index { lvalue, .. }
            | Self::Member { lvalue, .. }
            | Self::Length { lvalue, .. } => Some(lvalue),
            Self::InternalCall { lvalue, .. }
            | Self::HighLevelCall { lvalue, .. }
            | Self::LibraryCall { lvalue, .. }
            | Self::LowLevelCall { lvalue, .. }
            | Self::Send { lvalue, .. }
            | Self::SolidityCall { lvalue, .. } => lvalue.as_ref(),
            Self::Condition { .. }
            | Self::Return { .. }
            | Self::Unsupported { .. }
            | Self::Nop => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Assignment { .. } => "assignment",
            Self::Binary { .. } => "binary",
            Self::Unary { .. } => "unary",
            Self::TypeConversion { .. } => "type-conversion",
            Self::InternalCall { .. } => "internal-call",
            Self::HighLevelCall { .. } => "high-level-call",
            Self::LibraryCall { .. } => "library-call",
            Self::LowLevelCall { .. } => "low-level-call",
            Self::Send { .. } => "send",
            Self::SolidityCall { .. } => "solidity-call",
            Self::Index { .. } => "index",
            Self::Member { .. } => "member",
            Self::Length { .. } => "length",
            Self::Condition { .. } => "condition",
            Self::Return { .. } => "return",
            Self::Unsupported { .. } => "unsupported",
            Self::Nop => "nop",
        }
    }
}

/// The lowering pass output.
pub type Ir = Operation<Variable>;
/// The SSA pass output.
pub type SsaIr = Operation<SsaVariable>;

impl<V: fmt::Display> fmt::Display for Operation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assignment { lvalue, rvalue } => write!(f, "{lvalue} := {rvalue}"),
            Self::Binary {
                lvalue,
                operator,
                left,
                right,
            } => write!(f, "{lvalue} = {left} {operator:?} {right}"),
            Self::Unary {
                lvalue,
                operator,
                operand,
            } => write!(f, "{lvalue} = {operator:?} {operand}"),
            Self::TypeConversion {
                lvalue,
                value,
                target_type,
            } => write!(f, "{lvalue} = convert {value} to {target_type}"),
            Self::InternalCall {
                lvalue, function, ..
            } => match lvalue {
                Some(lvalue) => write!(f, "{lvalue} = {function}()"),
                None => write!(f, "{function}()"),
            },
            Self::HighLevelCall {
                destination,
                function,
                ..
            } => write!(f, "{destination}.{function}()"),
            Self::LibraryCall {
                library, function, ..
            } => write!(f, "{library}.{function}()"),
            Self::LowLevelCall {
                destination,
                function,
                ..
            } => write!(f, "{destination}.{function}()"),
            Self::Send {
                destination,
                value,
                reverts_on_failure,
                ..
            } => {
                let name = if *reverts_on_failure { "transfer" } else { "send" };
                write!(f, "{destination}.{name}({value})")
            }
            Self::SolidityCall { function, .. } => write!(f, "{function:?}()"),
            Self::Index { lvalue, base, index } => write!(f, "{lvalue} -> {base}[{index}]"),
            Self::Member {
                lvalue,
                base,
                member,
            } => write!(f, "{lvalue} -> {base}.{member}"),
            Self::Length { lvalue, value } => write!(f, "{lvalue} = {value}.length"),
            Self::Condition { value } => write!(f, "condition {value}"),
            Self::Return { values } => {
                write!(f, "return")?;
                for value in values {
                    write!(f, " {value}")?;
                }
                Ok(())
            }
            Self::Unsupported { reason } => write!(f, "unsupported: {reason}"),
            Self::Nop => write!(f, "nop"),
        }
    }
}
