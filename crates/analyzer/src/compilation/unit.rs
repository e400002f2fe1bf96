//! One compiler invocation's artifact: source units keyed by filename, with
//! per-contract ABI, bytecode and source-map storage.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::compilation::filename::Filename;
use crate::error::{AnalyzerError, Result};

/// One source file's compiled output.
#[derive(Debug, Clone, Default)]
pub struct SourceUnit {
    pub ast: Value,
    contracts_names: BTreeSet<String>,
    abis: BTreeMap<String, Value>,
    bytecodes_init: BTreeMap<String, String>,
    bytecodes_runtime: BTreeMap<String, String>,
    srcmaps_init: BTreeMap<String, Vec<String>>,
    srcmaps_runtime: BTreeMap<String, Vec<String>>,
    userdocs: BTreeMap<String, Value>,
    devdocs: BTreeMap<String, Value>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
}

impl SourceUnit {
    pub fn contracts_names(&self) -> &BTreeSet<String> {
        &self.contracts_names
    }

    pub fn abi(&self, contract: &str) -> Option<&Value> {
        self.abis.get(contract)
    }

    pub fn abis(&self) -> &BTreeMap<String, Value> {
        &self.abis
    }

    pub fn bytecode_init(&self, contract: &str) -> Option<&str> {
        self.bytecodes_init.get(contract).map(String::as_str)
    }

    pub fn bytecode_runtime(&self, contract: &str) -> Option<&str> {
        self.bytecodes_runtime.get(contract).map(String::as_str)
    }

    pub fn bytecodes_runtime(&self) -> &BTreeMap<String, String> {
        &self.bytecodes_runtime
    }

    pub fn srcmap_init(&self, contract: &str) -> Option<&[String]> {
        self.srcmaps_init.get(contract).map(Vec::as_slice)
    }

    pub fn srcmap_runtime(&self, contract: &str) -> Option<&[String]> {
        self.srcmaps_runtime.get(contract).map(Vec::as_slice)
    }

    pub fn userdoc(&self, contract: &str) -> Option<&Value> {
        self.userdocs.get(contract)
    }

    pub fn devdoc(&self, contract: &str) -> Option<&Value> {
        self.devdocs.get(contract)
    }

    pub fn hashes(&self, contract: &str) -> Option<&BTreeMap<String, String>> {
        self.hashes.get(contract)
    }

    /// The compiler emits bytecode for every contract it emits an ABI for.
    /// A unit that violates this is malformed and must fail loudly.
    pub fn validate(&self, filename: &Filename) -> Result<()> {
        for contract in self.abis.keys() {
            if !self.bytecodes_init.contains_key(contract)
                || !self.bytecodes_runtime.contains_key(contract)
            {
                return Err(AnalyzerError::Parsing(format!(
                    "malformed source unit {filename}: contract '{contract}' has an ABI but no bytecode"
                )));
            }
        }
        Ok(())
    }
}

/// One invocation of the compiler producing one artifact. Mutated while the
/// invoker populates it, read-only afterward.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    unique_id: String,
    compiler_version: String,
    source_units: BTreeMap<Filename, SourceUnit>,
    filename_to_contracts: BTreeMap<Filename, BTreeSet<String>>,
    libraries: BTreeMap<String, String>,
}

impl CompilationUnit {
    pub fn new(unique_id: impl Into<String>, compiler_version: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            compiler_version: compiler_version.into(),
            source_units: BTreeMap::new(),
            filename_to_contracts: BTreeMap::new(),
            libraries: BTreeMap::new(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn compiler_version(&self) -> &str {
        &self.compiler_version
    }

    /// Idempotent: returns the existing unit when `filename` was already
    /// created.
    pub fn create_source_unit(&mut self, filename: Filename) -> &mut SourceUnit {
        self.source_units.entry(filename).or_default()
    }

    pub fn source_unit(&self, filename: &Filename) -> Option<&SourceUnit> {
        self.source_units.get(filename)
    }

    pub fn source_units(&self) -> &BTreeMap<Filename, SourceUnit> {
        &self.source_units
    }

    pub fn filenames(&self) -> impl Iterator<Item = &Filename> {
        self.source_units.keys()
    }

    pub fn filename_to_contracts(&self) -> &BTreeMap<Filename, BTreeSet<String>> {
        &self.filename_to_contracts
    }

    /// Resolves any path form (absolute/used/relative/short) back to the
    /// unit's `Filename`.
    pub fn filename_lookup(&self, path: &str) -> Result<Filename> {
        self.source_units
            .keys()
            .find(|filename| filename.matches(path))
            .cloned()
            .ok_or_else(|| AnalyzerError::UnknownFilename(path.to_string()))
    }

    /// Registers `contract` under `filename`, keeping the per-unit name set
    /// and the unit-wide map in sync within the same operation.
    pub fn add_contract(&mut self, filename: Filename, contract: &str) {
        let source_unit = self.source_units.entry(filename.clone()).or_default();
        source_unit.contracts_names.insert(contract.to_string());
        self.filename_to_contracts
            .entry(filename)
            .or_default()
            .insert(contract.to_string());
    }

    pub fn set_abi(&mut self, filename: &Filename, contract: &str, abi: Value) {
        if let Some(unit) = self.source_units.get_mut(filename) {
            unit.abis.insert(contract.to_string(), abi);
        }
    }

    pub fn set_bytecodes(
        &mut self,
        filename: &Filename,
        contract: &str,
        init: String,
        runtime: String,
    ) {
        if let Some(unit) = self.source_units.get_mut(filename) {
            unit.bytecodes_init.insert(contract.to_string(), init);
            unit.bytecodes_runtime.insert(contract.to_string(), runtime);
        }
    }

    pub fn set_srcmaps(
        &mut self,
        filename: &Filename,
        contract: &str,
        init: &str,
        runtime: &str,
    ) {
        let split = |srcmap: &str| -> Vec<String> {
            srcmap.split(';').map(str::to_string).collect()
        };
        if let Some(unit) = self.source_units.get_mut(filename) {
            unit.srcmaps_init.insert(contract.to_string(), split(init));
            unit.srcmaps_runtime
                .insert(contract.to_string(), split(runtime));
        }
    }

    pub fn set_docs(&mut self, filename: &Filename, contract: &str, userdoc: Value, devdoc: Value) {
        if let Some(unit) = self.source_units.get_mut(filename) {
            unit.userdocs.insert(contract.to_string(), userdoc);
            unit.devdocs.insert(contract.to_string(), devdoc);
        }
    }

    pub fn set_hashes(
        &mut self,
        filename: &Filename,
        contract: &str,
        hashes: BTreeMap<String, String>,
    ) {
        if let Some(unit) = self.source_units.get_mut(filename) {
            unit.hashes.insert(contract.to_string(), hashes);
        }
    }

    pub fn add_library(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.libraries.insert(name.into(), address.into());
    }

    pub fn libraries(&self) -> &BTreeMap<String, String> {
        &self.libraries
    }

    pub fn validate(&self) -> Result<()> {
        for (filename, unit) in &self.source_units {
            unit.validate(filename)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn filename(name: &str) -> Filename {
        Filename::from_used(name, Path::new("/work"))
    }

    #[test]
    fn test_create_source_unit_is_idempotent() {
        let mut unit = CompilationUnit::new("t.sol", "0.8.19");
        unit.create_source_unit(filename("t.sol")).ast = Value::from("tree");
        let again = unit.create_source_unit(filename("t.sol"));
        assert_eq!(again.ast, Value::from("tree"));
        assert_eq!(unit.source_units().len(), 1);
    }

    #[test]
    fn test_add_contract_keeps_both_maps_in_sync() {
        let mut unit = CompilationUnit::new("t.sol", "0.8.19");
        unit.add_contract(filename("t.sol"), "Token");

        let file = unit.filename_lookup("t.sol").unwrap();
        assert!(unit.source_unit(&file).unwrap().contracts_names().contains("Token"));
        assert!(unit.filename_to_contracts()[&file].contains("Token"));
    }

    #[test]
    fn test_filename_lookup_unknown_path() {
        let unit = CompilationUnit::new("t.sol", "0.8.19");
        assert!(matches!(
            unit.filename_lookup("missing.sol"),
            Err(AnalyzerError::UnknownFilename(_))
        ));
    }

    #[test]
    fn test_validate_rejects_abi_without_bytecode() {
        let mut unit = CompilationUnit::new("t.sol", "0.8.19");
        let file = filename("t.sol");
        unit.add_contract(file.clone(), "Token");
        unit.set_abi(&file, "Token", Value::Array(vec![]));
        assert!(matches!(unit.validate(), Err(AnalyzerError::Parsing(_))));

        unit.set_bytecodes(&file, "Token", "6080".into(), "6080".into());
        assert!(unit.validate().is_ok());
    }
}
