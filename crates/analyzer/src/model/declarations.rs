//! Typed declarations shared across the contract model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub length: usize,
}

impl SourceSpan {
    /// Parses the compiler's `start:length:fileIndex` pointer.
    pub fn parse(src: &str) -> Option<Self> {
        let mut parts = src.split(':');
        let start = parts.next()?.parse().ok()?;
        let length = parts.next()?.parse().ok()?;
        Some(Self { start, length })
    }

    pub fn from_node(node: &Value) -> Self {
        node["src"]
            .as_str()
            .and_then(Self::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => Self::Public,
            "external" => Self::External,
            "private" => Self::Private,
            _ => Self::Internal,
        }
    }

    /// Callable from outside the contract.
    pub fn is_exposed(&self) -> bool {
        matches!(self, Self::Public | Self::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    NonPayable,
    Payable,
    View,
    Pure,
}

impl Mutability {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "payable" => Self::Payable,
            "view" => Self::View,
            "pure" => Self::Pure,
            _ => Self::NonPayable,
        }
    }

    pub fn can_modify_state(&self) -> bool {
        matches!(self, Self::NonPayable | Self::Payable)
    }
}

/// A declared type, reconstructed from the compiler's `typeName` nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Elementary(String),
    Mapping { key: Box<Type>, value: Box<Type> },
    Array { base: Box<Type>, length: Option<u64> },
    UserDefined(String),
    Function(String),
    Unknown(String),
}

impl Type {
    pub fn from_type_name(node: &Value) -> Self {
        match node["nodeType"].as_str().unwrap_or("") {
            "ElementaryTypeName" => {
                Self::Elementary(node["name"].as_str().unwrap_or("unknown").to_string())
            }
            "Mapping" => Self::Mapping {
                key: Box::new(Self::from_type_name(&node["keyType"])),
                value: Box::new(Self::from_type_name(&node["valueType"])),
            },
            "ArrayTypeName" => {
                let length = node["length"]["value"]
                    .as_str()
                    .and_then(|v| v.parse().ok());
                Self::Array {
                    base: Box::new(Self::from_type_name(&node["baseType"])),
                    length,
                }
            }
            "UserDefinedTypeName" => {
                let name = node["pathNode"]["name"]
                    .as_str()
                    .or_else(|| node["name"].as_str())
                    .unwrap_or("unknown");
                // Qualified references (`Lib.Struct`) resolve by their last
                // segment within the unit's flat namespace.
                let name = name.rsplit('.').next().unwrap_or(name);
                Self::UserDefined(name.to_string())
            }
            "FunctionTypeName" => Self::Function(
                node["typeDescriptions"]["typeString"]
                    .as_str()
                    .unwrap_or("function")
                    .to_string(),
            ),
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn type_string(&self) -> String {
        match self {
            Self::Elementary(name) | Self::UserDefined(name) => name.clone(),
            Self::Mapping { key, value } => {
                format!("mapping({} => {})", key.type_string(), value.type_string())
            }
            Self::Array { base, length } => match length {
                Some(length) => format!("{}[{length}]", base.type_string()),
                None => format!("{}[]", base.type_string()),
            },
            Self::Function(signature) => signature.clone(),
            Self::Unknown(raw) => raw.clone(),
        }
    }
}

/// One state variable as declared by its contract, tagged
/// constant/immutable/normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub is_constant: bool,
    pub is_immutable: bool,
    /// The contract that declared it, which differs from the contract being
    /// analyzed for inherited variables.
    pub contract: String,
    pub src: SourceSpan,
}

impl StateVariable {
    /// Constants and immutables do not occupy storage slots.
    pub fn occupies_storage(&self) -> bool {
        !self.is_constant && !self.is_immutable
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_string: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub members: Vec<(String, Type)>,
    /// `None` for file-level declarations.
    pub contract: Option<String>,
    pub src: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDeclaration {
    pub name: String,
    pub values: Vec<String>,
    pub contract: Option<String>,
    pub src: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDeclaration {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub contract: Option<String>,
    pub src: SourceSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomError {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub contract: Option<String>,
    pub src: SourceSpan,
}

/// A `using L for T` binding; `target` is `None` for `using L for *`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsingFor {
    pub library: String,
    pub target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_span_parsing() {
        assert_eq!(
            SourceSpan::parse("120:42:0"),
            Some(SourceSpan {
                start: 120,
                length: 42
            })
        );
        assert_eq!(SourceSpan::parse("garbage"), None);
    }

    #[test]
    fn test_mapping_type_from_ast() {
        let node = json!({
            "nodeType": "Mapping",
            "keyType": {"nodeType": "ElementaryTypeName", "name": "address"},
            "valueType": {"nodeType": "ElementaryTypeName", "name": "uint256"}
        });
        let ty = Type::from_type_name(&node);
        assert_eq!(ty.type_string(), "mapping(address => uint256)");
    }

    #[test]
    fn test_fixed_array_type_from_ast() {
        let node = json!({
            "nodeType": "ArrayTypeName",
            "baseType": {"nodeType": "ElementaryTypeName", "name": "uint8"},
            "length": {"nodeType": "Literal", "value": "4"}
        });
        assert_eq!(Type::from_type_name(&node).type_string(), "uint8[4]");
    }

    #[test]
    fn test_visibility_and_mutability_parsing() {
        assert_eq!(Visibility::parse("external"), Visibility::External);
        assert!(Visibility::parse("public").is_exposed());
        assert!(!Visibility::parse("internal").is_exposed());
        assert!(Mutability::parse("payable").can_modify_state());
        assert!(!Mutability::parse("view").can_modify_state());
    }
}
