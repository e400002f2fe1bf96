use crate::cfg::{Cfg, Node};
use crate::ir::variable::{SsaVariable, Variable};
use crate::model::declarations::{Mutability, Parameter, SourceSpan, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
    Receive,
    Modifier,
}

impl FunctionKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "constructor" => Self::Constructor,
            "fallback" => Self::Fallback,
            "receive" => Self::Receive,
            "modifier" => Self::Modifier,
            _ => Self::Function,
        }
    }
}

/// A function or modifier with its lowered body. `contract_declarer` names
/// the contract that declared it, which differs from the contract under
/// analysis for inherited members.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Parameter>,
    pub modifiers: Vec<String>,
    pub contract_declarer: String,
    pub is_virtual: bool,
    pub is_override: bool,
    pub cfg: Cfg,
    pub src: SourceSpan,
}

impl Function {
    pub fn signature(&self) -> String {
        let parameters: Vec<&str> = self
            .parameters
            .iter()
            .map(|p| p.type_string.as_str())
            .collect();
        format!("{}({})", self.name, parameters.join(","))
    }

    pub fn nodes(&self) -> &[Node] {
        self.cfg.nodes()
    }

    pub fn is_modifier(&self) -> bool {
        self.kind == FunctionKind::Modifier
    }

    /// Whether `variable`'s value in this function can originate from
    /// `source` through a def-use chain.
    pub fn is_dependent(&self, variable: &Variable, source: &Variable) -> bool {
        crate::analysis::is_dependent(variable, source, &self.cfg)
    }

    pub fn is_dependent_ssa(&self, variable: &SsaVariable, source: &SsaVariable) -> bool {
        crate::analysis::is_dependent_ssa(variable, source, &self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_joins_parameter_types() {
        let function = Function {
            name: "transfer".into(),
            kind: FunctionKind::Function,
            visibility: Visibility::Public,
            mutability: Mutability::NonPayable,
            parameters: vec![
                Parameter {
                    name: "to".into(),
                    type_string: "address".into(),
                },
                Parameter {
                    name: "amount".into(),
                    type_string: "uint256".into(),
                },
            ],
            returns: vec![],
            modifiers: vec![],
            contract_declarer: "Token".into(),
            is_virtual: false,
            is_override: false,
            cfg: Cfg::new(),
            src: SourceSpan::default(),
        };
        assert_eq!(function.signature(), "transfer(address,uint256)");
    }
}
