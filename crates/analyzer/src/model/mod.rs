//! Typed contract model
//!
//! The declaration graph built from the compiler's AST: contracts with
//! their state variables, functions, modifiers, nested type declarations
//! and inheritance wiring, each function body lowered to IR.

pub mod builder;
pub mod contract;
pub mod declarations;
pub mod function;
pub mod storage;

pub use builder::build_model;
pub use contract::{Contract, ContractKind};
pub use declarations::{
    CustomError, EnumDeclaration, EventDeclaration, Mutability, Parameter, SourceSpan,
    StateVariable, Structure, Type, UsingFor, Visibility,
};
pub use function::{Function, FunctionKind};

use std::collections::HashSet;

use crate::error::Result;

/// The root of the typed model for one compilation unit.
#[derive(Debug, Clone)]
pub struct CompilationModel {
    pub compiler_version: String,
    contracts: Vec<Contract>,
    /// Names of the most-derived contracts, computed once at build time.
    derived: HashSet<String>,
}

impl CompilationModel {
    pub(crate) fn new(compiler_version: String, contracts: Vec<Contract>) -> Self {
        // A contract is "derived" when nothing else inherits from it; those
        // are the deployable leaves detectors iterate by default.
        let mut inherited: HashSet<&str> = HashSet::new();
        for contract in &contracts {
            for base in contract.linearized_bases.iter().skip(1) {
                inherited.insert(base);
            }
        }
        let derived = contracts
            .iter()
            .filter(|c| !inherited.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();

        Self {
            compiler_version,
            contracts,
            derived,
        }
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub(crate) fn attach_cfg(
        &mut self,
        contract: &str,
        function: &str,
        is_modifier: bool,
        cfg: crate::cfg::Cfg,
    ) {
        if let Some(contract) = self.contracts.iter_mut().find(|c| c.name == contract) {
            let bodies = if is_modifier {
                &mut contract.modifiers
            } else {
                &mut contract.functions
            };
            if let Some(function) = bodies.iter_mut().find(|f| f.name == function) {
                function.cfg = cfg;
            }
        }
    }

    pub fn contract(&self, name: &str) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// Most-derived contracts only; intermediate and abstract bases are
    /// excluded.
    pub fn contracts_derived(&self) -> impl Iterator<Item = &Contract> {
        self.contracts
            .iter()
            .filter(|c| self.derived.contains(&c.name))
    }

    /// State variables visible to `contract` in storage order:
    /// most-base-first inheritance order, declaration order within each
    /// contract.
    pub fn state_variables_of(&self, contract: &Contract) -> Vec<&StateVariable> {
        let mut variables = Vec::new();
        for base_name in contract.linearized_bases.iter().rev() {
            if let Some(base) = self.contract(base_name) {
                variables.extend(base.state_variables.iter());
            }
        }
        variables
    }

    /// `(slot, intra-slot byte offset)` of a state variable, following the
    /// EVM packing rules.
    pub fn storage_layout_of(&self, contract: &Contract, variable: &str) -> Result<(u64, usize)> {
        storage::storage_layout_of(self, contract, variable)
    }

    pub fn structure<'a>(&'a self, contract: &'a Contract, name: &str) -> Option<&'a Structure> {
        contract
            .structs
            .iter()
            .find(|s| s.name == name)
            .or_else(|| {
                contract.linearized_bases.iter().skip(1).find_map(|base| {
                    self.contract(base)
                        .and_then(|c| c.structs.iter().find(|s| s.name == name))
                })
            })
            .or_else(|| {
                self.contracts
                    .iter()
                    .find_map(|c| c.structs.iter().find(|s| s.name == name))
            })
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumDeclaration> {
        self.contracts
            .iter()
            .find_map(|c| c.enums.iter().find(|e| e.name == name))
    }

    pub fn is_library_name(&self, name: &str) -> bool {
        self.contract(name).is_some_and(Contract::is_library)
    }
}
