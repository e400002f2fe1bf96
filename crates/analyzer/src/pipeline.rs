//! Compile orchestration
//!
//! [`Analyzer`] is the one-call entry point: hand it a `.sol` file or a
//! directory and it resolves the compiler version, installs the toolchain
//! if needed, compiles each target, ingests the artifacts and builds the
//! typed model with lowered IR. Everything upstream of a usable model is
//! fail-fast; a compile failure surfaces the compiler's own stderr.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;
use walkdir::WalkDir;

use crate::compilation::Compilation;
use crate::detectors::{AnalysisContext, DetectorRegistry, DetectorRun};
use crate::error::{AnalyzerError, Result};
use crate::model::{build_model, CompilationModel};
use crate::solc::{
    invoker::CombinedJson, parse_pragmas, resolve, ReleaseCatalog, SolcInvoker, ToolchainCache,
};

/// One compiled target with its typed models (one per compilation unit).
#[derive(Debug)]
pub struct AnalysisUnit {
    pub compilation: Compilation,
    pub models: Vec<CompilationModel>,
}

/// Per-contract ABI and runtime bytecode, the deployment-facing view.
#[derive(Debug, Clone)]
pub struct DeploymentArtifact {
    pub contract: String,
    pub abi: Value,
    pub bytecode_runtime: String,
}

#[derive(Debug, Default)]
pub struct Analyzer {
    targets: Vec<PathBuf>,
    units: Vec<AnalysisUnit>,
}

impl Analyzer {
    /// Compiles `target` (a `.sol` file, or a directory walked for `.sol`
    /// files) and builds the full model set.
    pub fn new(target: &Path) -> Result<Self> {
        let targets = discover_targets(target)?;
        if targets.is_empty() {
            return Err(AnalyzerError::UnknownFilename(
                target.display().to_string(),
            ));
        }

        let catalog = ReleaseCatalog::fetch()?;
        let cache = ToolchainCache::default_location()?;
        let working_dir = std::env::current_dir()?;

        let mut units = Vec::new();
        for path in &targets {
            let source = std::fs::read_to_string(path)?;
            let constraints = parse_pragmas(&source);
            let version = resolve(&constraints, &catalog.versions())?;
            info!(source = %path.display(), version, "resolved compiler version");

            let toolchain = cache.install(&version, &catalog)?;
            let combined = SolcInvoker::new(toolchain).compile(path)?;

            let unit = ingest(
                &path.display().to_string(),
                &working_dir,
                &version,
                combined,
            )?;
            units.push(unit);
        }

        Ok(Self { targets, units })
    }

    /// Offline entry: builds the model set from an already-parsed
    /// combined-json artifact. Used by tests and by callers that manage
    /// compiler invocation themselves.
    pub fn from_combined_json(
        target: &str,
        working_dir: &Path,
        compiler_version: &str,
        combined: CombinedJson,
    ) -> Result<Self> {
        let unit = ingest(target, working_dir, compiler_version, combined)?;
        Ok(Self {
            targets: vec![PathBuf::from(target)],
            units: vec![unit],
        })
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn units(&self) -> &[AnalysisUnit] {
        &self.units
    }

    /// Runs the registry over every model, aggregating findings and
    /// per-detector failures across units.
    pub fn run_detectors(&self, registry: &DetectorRegistry) -> DetectorRun {
        let mut aggregate = DetectorRun::default();
        for unit in &self.units {
            for model in &unit.models {
                let ctx = AnalysisContext {
                    model,
                    compilation: &unit.compilation,
                };
                let run = registry.run(&ctx);
                aggregate.findings.extend(run.findings);
                aggregate.failures.extend(run.failures);
            }
        }
        aggregate
    }

    /// Per-contract ABI and runtime bytecode across every compiled unit.
    pub fn deployment_artifacts(&self) -> Vec<DeploymentArtifact> {
        let mut artifacts = Vec::new();
        for unit in &self.units {
            for compilation_unit in unit.compilation.units().values() {
                for source_unit in compilation_unit.source_units().values() {
                    for contract in source_unit.contracts_names() {
                        artifacts.push(DeploymentArtifact {
                            contract: contract.clone(),
                            abi: source_unit
                                .abi(contract)
                                .cloned()
                                .unwrap_or(Value::Null),
                            bytecode_runtime: source_unit
                                .bytecode_runtime(contract)
                                .unwrap_or_default()
                                .to_string(),
                        });
                    }
                }
            }
        }
        artifacts
    }
}

fn ingest(
    target: &str,
    working_dir: &Path,
    compiler_version: &str,
    combined: CombinedJson,
) -> Result<AnalysisUnit> {
    let compilation =
        Compilation::from_combined_json(target, working_dir, compiler_version, combined)?;
    let models = build_model(&compilation)?;
    Ok(AnalysisUnit {
        compilation,
        models,
    })
}

fn discover_targets(target: &Path) -> Result<Vec<PathBuf>> {
    if target.is_file() {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        return Err(AnalyzerError::UnknownFilename(
            target.display().to_string(),
        ));
    }
    let mut targets: Vec<PathBuf> = WalkDir::new(target)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "sol"))
        .collect();
    targets.sort();
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("token.sol");
        fs::write(&file, "pragma solidity ^0.8.0;").unwrap();
        assert_eq!(discover_targets(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_discover_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.sol"), "").unwrap();
        fs::write(dir.path().join("nested/b.sol"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();
        let found = discover_targets(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().unwrap() == "sol"));
    }

    #[test]
    fn test_missing_target_is_an_error() {
        assert!(discover_targets(Path::new("/no/such/path.sol")).is_err());
    }
}
