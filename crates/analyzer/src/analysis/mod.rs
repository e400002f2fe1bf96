//! Analyses over the lowered IR.

pub mod data_dependency;

pub use data_dependency::{dependencies, is_dependent, is_dependent_ssa};
