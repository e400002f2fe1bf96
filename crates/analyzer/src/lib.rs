//! Tansa analyzer: Solidity compile orchestration, IR lowering and
//! vulnerability detection.
//!
//! The pipeline runs source text through five stages, each completing
//! before the next begins:
//!
//! 1. **Version resolution** ([`solc::version`]) — parses `pragma solidity`
//!    constraints and selects a concrete release from the published
//!    catalogue.
//! 2. **Compilation** ([`solc::invoker`]) — drives the `solc` binary with a
//!    version-era-appropriate `--combined-json` field set and parses its
//!    artifact.
//! 3. **Artifact model** ([`compilation`]) — source units, per-contract
//!    ABI/bytecode/source maps and offset↔line caches.
//! 4. **Typed model + IR** ([`model`], [`cfg`], [`ir`]) — contracts,
//!    functions and state variables with each function body lowered to
//!    three-address operations in both non-SSA and SSA form.
//! 5. **Analysis** ([`analysis`], [`detectors`]) — data-dependency queries
//!    and the pattern detectors built on top of them.
//!
//! [`pipeline::Analyzer`] wires the stages together for the common case.

pub mod analysis;
pub mod cfg;
pub mod compilation;
pub mod detectors;
pub mod error;
pub mod findings;
pub mod ir;
pub mod model;
pub mod pipeline;
pub mod solc;

pub use analysis::{is_dependent, is_dependent_ssa};
pub use compilation::{Compilation, CompilationUnit, Filename, SourceUnit};
pub use detectors::{AnalysisContext, Detector, DetectorRegistry, DetectorRun};
pub use error::{AnalyzerError, Result};
pub use findings::{Confidence, Element, Finding, Impact};
pub use model::{build_model, CompilationModel, Contract, Function};
pub use pipeline::{Analyzer, DeploymentArtifact};
pub use solc::{ReleaseCatalog, SolcInvoker, SolcVersion, Toolchain, ToolchainCache};
