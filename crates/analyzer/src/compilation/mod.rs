//! Compilation artifacts
//!
//! [`Compilation`] is the root object the rest of the pipeline walks: it
//! owns the compilation units produced by the invoker, the raw source text
//! and the lazily-built offset↔line caches.

pub mod filename;
pub mod unit;

pub use filename::Filename;
pub use unit::{CompilationUnit, SourceUnit};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AnalyzerError, Result};
use crate::solc::invoker::CombinedJson;

/// Byte-level line table for one file. Offsets are 0-indexed into the
/// UTF-8 byte stream; lines are 1-indexed; columns are 0-indexed. The
/// offset table carries a sentinel entry at the total byte length mapping
/// to `(line_count + 1, 0)` so end-of-file offsets resolve cleanly.
#[derive(Debug)]
struct LineCache {
    line_to_code: Vec<Vec<u8>>,
    line_to_offset: Vec<usize>,
    offset_to_line: Vec<(usize, usize)>,
}

impl LineCache {
    fn build(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut line_to_code = Vec::new();
        let mut start = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                line_to_code.push(bytes[start..=i].to_vec());
                start = i + 1;
            }
        }
        if start < bytes.len() {
            line_to_code.push(bytes[start..].to_vec());
        }

        let mut line_to_offset = Vec::with_capacity(line_to_code.len());
        let mut offset_to_line = Vec::with_capacity(bytes.len() + 1);
        let mut acc = 0;
        for (index, line) in line_to_code.iter().enumerate() {
            line_to_offset.push(acc);
            for column in 0..line.len() {
                offset_to_line.push((index + 1, column));
            }
            acc += line.len();
        }
        offset_to_line.push((line_to_code.len() + 1, 0));

        Self {
            line_to_code,
            line_to_offset,
            offset_to_line,
        }
    }
}

#[derive(Debug)]
pub struct Compilation {
    target: String,
    working_dir: PathBuf,
    units: BTreeMap<String, CompilationUnit>,
    src_content: RwLock<HashMap<String, String>>,
    line_caches: RwLock<HashMap<Filename, Arc<LineCache>>>,
}

impl Compilation {
    /// Builds the artifact model out of a parsed combined-json blob. The
    /// whole artifact is validated before it is handed to the declaration
    /// builder; a contract with an ABI but no bytecode fails here.
    pub fn from_combined_json(
        target: &str,
        working_dir: &Path,
        compiler_version: &str,
        combined: CombinedJson,
    ) -> Result<Self> {
        let mut unit = CompilationUnit::new(target, compiler_version);

        for (path, source) in combined.sources {
            let filename = Filename::from_used(&path, working_dir);
            unit.create_source_unit(filename).ast = source.ast;
        }

        for (key, artifact) in combined.contracts {
            let (path, contract) = split_contract_key(&key)?;
            let filename = Filename::from_used(path, working_dir);
            unit.add_contract(filename.clone(), contract);
            unit.set_abi(&filename, contract, artifact.abi);
            unit.set_bytecodes(&filename, contract, artifact.bin, artifact.bin_runtime);
            unit.set_srcmaps(&filename, contract, &artifact.srcmap, &artifact.srcmap_runtime);
            unit.set_docs(&filename, contract, artifact.userdoc, artifact.devdoc);
            if let Some(hashes) = artifact.hashes {
                unit.set_hashes(&filename, contract, hashes);
            }
        }

        unit.validate()?;

        let mut units = BTreeMap::new();
        units.insert(target.to_string(), unit);

        Ok(Self {
            target: target.to_string(),
            working_dir: working_dir.to_path_buf(),
            units,
            src_content: RwLock::new(HashMap::new()),
            line_caches: RwLock::new(HashMap::new()),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn units(&self) -> &BTreeMap<String, CompilationUnit> {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&CompilationUnit> {
        self.units.get(id)
    }

    pub fn unit_mut(&mut self, id: &str) -> Option<&mut CompilationUnit> {
        self.units.get_mut(id)
    }

    pub fn filenames(&self) -> BTreeSet<Filename> {
        self.units
            .values()
            .flat_map(|unit| unit.filenames().cloned())
            .collect()
    }

    /// Resolves any path form against every compilation unit.
    pub fn filename_lookup(&self, path: &str) -> Result<Filename> {
        for unit in self.units.values() {
            if let Ok(filename) = unit.filename_lookup(path) {
                return Ok(filename);
            }
        }
        Err(AnalyzerError::UnknownFilename(path.to_string()))
    }

    pub fn is_in_multiple_compilation_unit(&self, contract: &str) -> bool {
        let count = self
            .units
            .values()
            .flat_map(|unit| unit.source_units().values())
            .filter(|source_unit| source_unit.contracts_names().contains(contract))
            .count();
        count >= 2
    }

    /// Injects source text for a file, bypassing disk. Later cache builds
    /// use the injected content.
    pub fn set_source_content(&self, absolute: &str, content: String) {
        self.src_content
            .write()
            .insert(absolute.to_string(), content);
    }

    pub fn source_content(&self, absolute: &str) -> Option<String> {
        if let Some(content) = self.src_content.read().get(absolute) {
            return Some(content.clone());
        }
        let content = std::fs::read_to_string(absolute).ok()?;
        self.src_content
            .write()
            .insert(absolute.to_string(), content.clone());
        Some(content)
    }

    fn line_cache(&self, filename: &Filename) -> Result<Arc<LineCache>> {
        if let Some(cache) = self.line_caches.read().get(filename) {
            return Ok(cache.clone());
        }
        let content = self.source_content(&filename.absolute).ok_or_else(|| {
            AnalyzerError::UnknownFilename(filename.absolute.clone())
        })?;
        let cache = Arc::new(LineCache::build(&content));
        self.line_caches
            .write()
            .insert(filename.clone(), cache.clone());
        Ok(cache)
    }

    /// `(line, column)` for a global byte offset; lines are 1-indexed,
    /// columns 0-indexed. The end-of-file offset maps to
    /// `(line_count + 1, 0)` rather than failing.
    pub fn get_line_from_offset(&self, filename: &Filename, offset: usize) -> Result<(usize, usize)> {
        let cache = self.line_cache(filename)?;
        cache.offset_to_line.get(offset).copied().ok_or_else(|| {
            AnalyzerError::Parsing(format!(
                "offset {offset} is out of range for {filename}"
            ))
        })
    }

    /// Global byte offset of the start of a 1-indexed line.
    pub fn get_global_offset_from_line(&self, filename: &Filename, line: usize) -> Result<usize> {
        let cache = self.line_cache(filename)?;
        line.checked_sub(1)
            .and_then(|index| cache.line_to_offset.get(index).copied())
            .ok_or_else(|| {
                AnalyzerError::Parsing(format!("line {line} is out of range for {filename}"))
            })
    }

    /// The raw bytes of a 1-indexed line, terminator included. `None` for
    /// out-of-range lines; callers must check.
    pub fn get_code_from_line(&self, filename: &Filename, line: usize) -> Option<Vec<u8>> {
        let cache = self.line_cache(filename).ok()?;
        line.checked_sub(1)
            .and_then(|index| cache.line_to_code.get(index).cloned())
    }
}

fn split_contract_key(key: &str) -> Result<(&str, &str)> {
    key.rsplit_once(':').ok_or_else(|| {
        AnalyzerError::Parsing(format!("contract key '{key}' is not of the form file:Contract"))
    })
}
