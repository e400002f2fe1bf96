//! Compiler invocation
//!
//! Builds the `--combined-json` command line for a resolved toolchain, runs
//! it with a bounded deadline and parses the artifact. Compilation is
//! deterministic, so a failed invocation is never retried.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AnalyzerError, Result};
use crate::solc::toolchain::Toolchain;
use crate::solc::version::SolcVersion;

const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(120);

/// Output fields requested from the compiler. `compact-format` was
/// introduced in 0.4.12 and became the default in 0.8.10; `hashes` does not
/// exist before 0.4.12.
pub fn combined_json_fields(version: &SolcVersion, force_legacy: bool) -> &'static str {
    if force_legacy || !version.is_at_least(0, 4, 12) {
        return "abi,ast,bin,bin-runtime,srcmap,srcmap-runtime,userdoc,devdoc";
    }
    if !version.is_at_least(0, 8, 10) {
        return "abi,ast,bin,bin-runtime,srcmap,srcmap-runtime,userdoc,devdoc,hashes,compact-format";
    }
    "abi,ast,bin,bin-runtime,srcmap,srcmap-runtime,userdoc,devdoc,hashes"
}

/// One contract's entry in the combined-json artifact.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ContractArtifact {
    #[serde(default)]
    pub abi: Value,
    #[serde(default)]
    pub bin: String,
    #[serde(rename = "bin-runtime", default)]
    pub bin_runtime: String,
    #[serde(default)]
    pub srcmap: String,
    #[serde(rename = "srcmap-runtime", default)]
    pub srcmap_runtime: String,
    #[serde(default)]
    pub userdoc: Value,
    #[serde(default)]
    pub devdoc: Value,
    #[serde(default)]
    pub hashes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceArtifact {
    #[serde(rename = "AST")]
    pub ast: Value,
}

/// The parsed combined-json output: per-file ASTs under `sources`, and
/// per-`file:Contract` artifacts under `contracts`.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinedJson {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceArtifact>,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractArtifact>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SolcInvoker {
    toolchain: Toolchain,
    remaps: Vec<String>,
    extra_args: Vec<String>,
    timeout: Duration,
    force_legacy_fields: bool,
    disable_warnings: bool,
}

impl SolcInvoker {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            remaps: Vec::new(),
            extra_args: Vec::new(),
            timeout: DEFAULT_COMPILE_TIMEOUT,
            force_legacy_fields: false,
            disable_warnings: false,
        }
    }

    pub fn with_remaps(mut self, remaps: Vec<String>) -> Self {
        self.remaps = remaps;
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_legacy_fields(mut self, force: bool) -> Self {
        self.force_legacy_fields = force;
        self
    }

    pub fn with_warnings_disabled(mut self, disable: bool) -> Self {
        self.disable_warnings = disable;
        self
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Runs the compiler on `source` and parses its artifact. Non-zero exit
    /// or non-JSON stdout is an [`AnalyzerError::InvalidCompilation`];
    /// warnings with exit 0 are logged only.
    pub fn compile(&self, source: &Path) -> Result<CombinedJson> {
        let version: SolcVersion = self.toolchain.version.parse()?;
        let fields = combined_json_fields(&version, self.force_legacy_fields);

        let mut command = Command::new(&self.toolchain.binary);
        command
            .args(&self.remaps)
            .arg(source)
            .arg("--combined-json")
            .arg(fields)
            .args(&self.extra_args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(
            solc = %self.toolchain.binary.display(),
            source = %source.display(),
            fields,
            "running solc"
        );

        let (status, stdout, stderr) = run_with_deadline(command, self.timeout)?;

        if !stderr.is_empty() && !self.disable_warnings {
            warn!(source = %source.display(), "solc diagnostics:\n{stderr}");
        }

        if !status_success(status) {
            return Err(AnalyzerError::InvalidCompilation { stderr });
        }

        serde_json::from_str(&stdout)
            .map_err(|_| AnalyzerError::InvalidCompilation { stderr })
    }
}

fn status_success(code: Option<i32>) -> bool {
    code == Some(0)
}

/// Spawns the command and waits for it with a deadline, draining stdout and
/// stderr on reader threads so a chatty compiler cannot fill the pipe and
/// deadlock. The child is killed on expiry.
fn run_with_deadline(
    mut command: Command,
    timeout: Duration,
) -> Result<(Option<i32>, String, String)> {
    let mut child = command.spawn()?;

    let stdout = child.stdout.take().expect("stdout is piped");
    let stderr = child.stderr.take().expect("stderr is piped");
    let stdout_reader = std::thread::spawn(move || read_to_string_lossy(stdout));
    let stderr_reader = std::thread::spawn(move || read_to_string_lossy(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalyzerError::CompilerTimeout(timeout));
            }
            None => std::thread::sleep(Duration::from_millis(20)),
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok((status.code(), stdout, stderr))
}

fn read_to_string_lossy(mut reader: impl Read) -> String {
    let mut buffer = Vec::new();
    let _ = reader.read_to_end(&mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_for_old_04_era() {
        let version = SolcVersion::new(0, 4, 11);
        let fields = combined_json_fields(&version, false);
        assert!(!fields.contains("compact-format"));
        assert!(!fields.contains("hashes"));
    }

    #[test]
    fn test_fields_for_explicit_compact_era() {
        for version in [
            SolcVersion::new(0, 4, 12),
            SolcVersion::new(0, 5, 17),
            SolcVersion::new(0, 8, 9),
        ] {
            let fields = combined_json_fields(&version, false);
            assert!(fields.contains("compact-format"), "{version}");
            assert!(fields.contains("hashes"), "{version}");
        }
    }

    #[test]
    fn test_fields_for_modern_era() {
        let fields = combined_json_fields(&SolcVersion::new(0, 8, 10), false);
        assert!(!fields.contains("compact-format"));
        assert!(fields.contains("hashes"));
    }

    #[test]
    fn test_legacy_override_wins() {
        let fields = combined_json_fields(&SolcVersion::new(0, 8, 19), true);
        assert!(!fields.contains("hashes"));
    }

    #[test]
    fn test_combined_json_parses_renamed_fields() {
        let raw = r#"{
            "contracts": {
                "a.sol:C": {
                    "abi": [],
                    "bin": "6080",
                    "bin-runtime": "6080",
                    "srcmap": "0:10:0",
                    "srcmap-runtime": "0:10:0",
                    "userdoc": {},
                    "devdoc": {},
                    "hashes": {"f(uint256)": "b3de648b"}
                }
            },
            "sources": {"a.sol": {"AST": {"nodeType": "SourceUnit"}}},
            "version": "0.8.19+commit.7dd6d404"
        }"#;
        let parsed: CombinedJson = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.contracts.len(), 1);
        let entry = &parsed.contracts["a.sol:C"];
        assert_eq!(entry.bin_runtime, "6080");
        assert_eq!(
            entry.hashes.as_ref().unwrap()["f(uint256)"],
            "b3de648b"
        );
        assert!(parsed.sources.contains_key("a.sol"));
    }
}
