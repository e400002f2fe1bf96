use std::time::Duration;

use thiserror::Error;

/// Failures raised by the compile/model/IR stages.
///
/// Everything upstream of a usable contract model is fail-fast: a version
/// that cannot be resolved or a compiler invocation that fails aborts the
/// whole request. Detector-level failures are not represented here; they are
/// isolated per detector by the runner.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("unresolvable version constraint: {0}")]
    UnresolvableConstraint(String),

    #[error("unknown solc version '{0}'")]
    UnknownVersion(String),

    #[error("failed to install solc {version}: {reason}")]
    Installation { version: String, reason: String },

    #[error("invalid solc compilation:\n{stderr}")]
    InvalidCompilation { stderr: String },

    #[error("solc timed out after {0:?}")]
    CompilerTimeout(Duration),

    #[error("'{0}' is not part of any compilation unit")]
    UnknownFilename(String),

    #[error("parsing error: {0}")]
    Parsing(String),

    /// Internal consistency violation in the lowering stage. Reaching this
    /// indicates a bug in the lowering itself, not a problem with the
    /// analyzed source.
    #[error("ir error: {0}")]
    Ir(String),

    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
