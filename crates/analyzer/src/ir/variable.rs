//! IR variable namespaces
//!
//! Two universes exist in parallel: [`Variable`] is the non-SSA form, where
//! one identity is reused across reassignment, and [`SsaVariable`] is the
//! versioned form produced by the SSA pass, where each write mints a fresh
//! version.

use std::fmt;

use serde::Serialize;

/// Solidity environment values readable by any contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Builtin {
    BlockBaseFee,
    BlockChainId,
    BlockCoinbase,
    BlockDifficulty,
    BlockGasLimit,
    BlockNumber,
    BlockTimestamp,
    MsgData,
    MsgSender,
    MsgSig,
    MsgValue,
    TxGasPrice,
    TxOrigin,
    /// Pre-0.7.0 alias for `block.timestamp`.
    Now,
    This,
}

impl Builtin {
    pub fn from_identifier(name: &str) -> Option<Self> {
        match name {
            "now" => Some(Self::Now),
            "this" => Some(Self::This),
            _ => None,
        }
    }

    pub fn from_member(base: &str, member: &str) -> Option<Self> {
        match (base, member) {
            ("block", "basefee") => Some(Self::BlockBaseFee),
            ("block", "chainid") => Some(Self::BlockChainId),
            ("block", "coinbase") => Some(Self::BlockCoinbase),
            ("block", "difficulty") | ("block", "prevrandao") => Some(Self::BlockDifficulty),
            ("block", "gaslimit") => Some(Self::BlockGasLimit),
            ("block", "number") => Some(Self::BlockNumber),
            ("block", "timestamp") => Some(Self::BlockTimestamp),
            ("msg", "data") => Some(Self::MsgData),
            ("msg", "sender") => Some(Self::MsgSender),
            ("msg", "sig") => Some(Self::MsgSig),
            ("msg", "value") => Some(Self::MsgValue),
            ("tx", "gasprice") => Some(Self::TxGasPrice),
            ("tx", "origin") => Some(Self::TxOrigin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockBaseFee => "block.basefee",
            Self::BlockChainId => "block.chainid",
            Self::BlockCoinbase => "block.coinbase",
            Self::BlockDifficulty => "block.difficulty",
            Self::BlockGasLimit => "block.gaslimit",
            Self::BlockNumber => "block.number",
            Self::BlockTimestamp => "block.timestamp",
            Self::MsgData => "msg.data",
            Self::MsgSender => "msg.sender",
            Self::MsgSig => "msg.sig",
            Self::MsgValue => "msg.value",
            Self::TxGasPrice => "tx.gasprice",
            Self::TxOrigin => "tx.origin",
            Self::Now => "now",
            Self::This => "this",
        }
    }

    /// Block-derived values miners can influence; the classic weak
    /// randomness seeds.
    pub fn is_block_entropy(&self) -> bool {
        matches!(
            self,
            Self::BlockTimestamp | Self::BlockNumber | Self::BlockDifficulty | Self::Now
        )
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Constant {
    Number(String),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(n),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Non-SSA variable identity. State variables are qualified by their
/// declaring contract; temporaries and references are numbered per
/// function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Variable {
    State { contract: String, name: String },
    Local { name: String },
    Temporary { index: usize },
    /// An lvalue produced by index/member access. Writes through a
    /// reference are also writes to its base.
    Reference { index: usize, base: Box<Variable> },
    Builtin(Builtin),
    Constant(Constant),
}

impl Variable {
    pub fn state(contract: impl Into<String>, name: impl Into<String>) -> Self {
        Self::State {
            contract: contract.into(),
            name: name.into(),
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::Local { name: name.into() }
    }

    pub fn name(&self) -> String {
        match self {
            Self::State { name, .. } => name.clone(),
            Self::Local { name } => name.clone(),
            Self::Temporary { index } => format!("TMP_{index}"),
            Self::Reference { index, .. } => format!("REF_{index}"),
            Self::Builtin(builtin) => builtin.as_str().to_string(),
            Self::Constant(constant) => constant.to_string(),
        }
    }

    /// Whether a write to this variable is assignable at all. Builtins and
    /// constants are read-only.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::Builtin(_) | Self::Constant(_))
    }

    /// The base a reference ultimately points into, or the variable itself.
    pub fn dereferenced(&self) -> &Variable {
        match self {
            Self::Reference { base, .. } => base.dereferenced(),
            other => other,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// SSA form: the base variable plus a definition version. Version 0 is the
/// value on entry (parameters, initial state); every write mints version
/// `n + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SsaVariable {
    pub base: Variable,
    pub version: usize,
}

impl SsaVariable {
    pub fn new(base: Variable, version: usize) -> Self {
        Self { base, version }
    }

    pub fn initial(base: Variable) -> Self {
        Self { base, version: 0 }
    }
}

impl fmt::Display for SsaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_member_resolution() {
        assert_eq!(
            Builtin::from_member("block", "timestamp"),
            Some(Builtin::BlockTimestamp)
        );
        assert_eq!(Builtin::from_member("tx", "origin"), Some(Builtin::TxOrigin));
        assert_eq!(Builtin::from_member("block", "bogus"), None);
    }

    #[test]
    fn test_block_entropy_classification() {
        assert!(Builtin::BlockTimestamp.is_block_entropy());
        assert!(Builtin::Now.is_block_entropy());
        assert!(!Builtin::MsgSender.is_block_entropy());
    }

    #[test]
    fn test_reference_dereferences_to_base() {
        let balances = Variable::state("Token", "balances");
        let reference = Variable::Reference {
            index: 0,
            base: Box::new(balances.clone()),
        };
        assert_eq!(reference.dereferenced(), &balances);
    }

    #[test]
    fn test_constants_are_not_assignable() {
        assert!(!Variable::Constant(Constant::Bool(true)).is_assignable());
        assert!(Variable::local("x").is_assignable());
    }
}
