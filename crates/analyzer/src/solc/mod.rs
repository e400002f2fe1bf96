//! Compiler orchestration: version resolution, toolchain management and
//! `solc` invocation.

pub mod invoker;
pub mod toolchain;
pub mod version;

pub use invoker::{CombinedJson, ContractArtifact, SolcInvoker};
pub use toolchain::{ReleaseCatalog, Toolchain, ToolchainCache};
pub use version::{parse_pragmas, resolve, SolcVersion, VersionCatalog, VersionConstraint};
