use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity for a source file across the path forms the compiler and the
/// user may hand us. Two `Filename`s are the same logical file when their
/// relative forms match, regardless of where the working tree lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filename {
    /// Absolute path on disk.
    pub absolute: String,
    /// The path exactly as it was passed to the compiler.
    pub used: String,
    /// Path relative to the working directory; the identity key.
    pub relative: String,
    /// Display-friendly form (same as relative for direct solc targets).
    pub short: String,
}

impl Filename {
    pub fn new(absolute: String, used: String, relative: String, short: String) -> Self {
        Self {
            absolute,
            used,
            relative,
            short,
        }
    }

    /// Normalizes `used` against `working_dir`. Relative inputs are joined
    /// onto the working directory for the absolute form; absolute inputs
    /// are stripped of the working-directory prefix for the relative form.
    pub fn from_used(used: &str, working_dir: &Path) -> Self {
        let path = Path::new(used);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            working_dir.join(path)
        };
        let relative = absolute
            .strip_prefix(working_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(used));
        let relative = relative.to_string_lossy().into_owned();
        Self {
            absolute: absolute.to_string_lossy().into_owned(),
            used: used.to_string(),
            relative: relative.clone(),
            short: relative,
        }
    }

    /// Whether any of this filename's forms matches `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.absolute == path || self.used == path || self.relative == path || self.short == path
    }
}

impl PartialEq for Filename {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative
    }
}

impl Eq for Filename {}

impl Hash for Filename {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative.hash(state);
    }
}

impl PartialOrd for Filename {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Filename {
    fn cmp(&self, other: &Self) -> Ordering {
        self.relative.cmp(&other.relative)
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_by_relative_path() {
        let a = Filename::new(
            "/home/alice/project/token.sol".into(),
            "token.sol".into(),
            "token.sol".into(),
            "token.sol".into(),
        );
        let b = Filename::new(
            "/home/bob/checkout/token.sol".into(),
            "./token.sol".into(),
            "token.sol".into(),
            "token.sol".into(),
        );
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_from_used_relative_input() {
        let filename = Filename::from_used("contracts/token.sol", Path::new("/work"));
        assert_eq!(filename.absolute, "/work/contracts/token.sol");
        assert_eq!(filename.relative, "contracts/token.sol");
        assert_eq!(filename.short, "contracts/token.sol");
        assert_eq!(filename.used, "contracts/token.sol");
    }

    #[test]
    fn test_from_used_absolute_input() {
        let filename = Filename::from_used("/work/contracts/token.sol", Path::new("/work"));
        assert_eq!(filename.relative, "contracts/token.sol");
    }

    #[test]
    fn test_matches_any_form() {
        let filename = Filename::from_used("contracts/token.sol", Path::new("/work"));
        assert!(filename.matches("/work/contracts/token.sol"));
        assert!(filename.matches("contracts/token.sol"));
        assert!(!filename.matches("token.sol"));
    }
}
