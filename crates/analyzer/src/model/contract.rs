use crate::compilation::Filename;
use crate::model::declarations::{
    CustomError, EnumDeclaration, EventDeclaration, SourceSpan, StateVariable, Structure, UsingFor,
};
use crate::model::function::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

impl ContractKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "interface" => Self::Interface,
            "library" => Self::Library,
            _ => Self::Contract,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Contract {
    pub name: String,
    pub kind: ContractKind,
    pub is_abstract: bool,
    /// Direct bases in declaration order.
    pub base_names: Vec<String>,
    /// MRO-like linearization, self first then bases, most-derived to
    /// most-base. Shadow resolution walks this order.
    pub linearized_bases: Vec<String>,
    /// Variables declared by this contract itself; inherited variables are
    /// resolved through the model.
    pub state_variables: Vec<StateVariable>,
    pub structs: Vec<Structure>,
    pub enums: Vec<EnumDeclaration>,
    pub events: Vec<EventDeclaration>,
    pub custom_errors: Vec<CustomError>,
    pub functions: Vec<Function>,
    pub modifiers: Vec<Function>,
    pub using_for: Vec<UsingFor>,
    pub filename: Filename,
    pub src: SourceSpan,
}

impl Contract {
    pub fn is_library(&self) -> bool {
        self.kind == ContractKind::Library
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ContractKind::Interface
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariable> {
        self.state_variables.iter().find(|v| v.name == name)
    }

    /// Functions plus modifiers, the full set of lowered bodies.
    pub fn all_function_bodies(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().chain(self.modifiers.iter())
    }
}
