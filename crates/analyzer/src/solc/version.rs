//! Solidity version constraints
//!
//! Extracts `pragma solidity` constraints from source text and selects a
//! concrete release out of the published catalogue.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AnalyzerError, Result};

static PRAGMA_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pragma\s+solidity[^;]*").expect("pragma regex"));

static CONSTRAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\^|=|~|>=|<=|>|<)?\s*([0-9]+\.[0-9]+(?:\.[0-9]+)?)").expect("constraint regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolcVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SolcVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn is_at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        match self.major.cmp(&major) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match self.minor.cmp(&minor) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => self.patch >= patch,
            },
        }
    }

    /// Checked arithmetic became the default in 0.8.0.
    pub fn has_builtin_overflow_protection(&self) -> bool {
        self.is_at_least(0, 8, 0)
    }

    pub fn same_minor(&self, other: &SolcVersion) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl PartialOrd for SolcVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SolcVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.major.cmp(&other.major) {
            Ordering::Equal => match self.minor.cmp(&other.minor) {
                Ordering::Equal => self.patch.cmp(&other.patch),
                other => other,
            },
            other => other,
        }
    }
}

impl FromStr for SolcVersion {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| AnalyzerError::UnresolvableConstraint(format!("missing {name} in '{s}'")))?
                .parse::<u32>()
                .map_err(|_| AnalyzerError::UnresolvableConstraint(format!("bad {name} in '{s}'")))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = parts
            .next()
            .map(|p| {
                p.parse::<u32>().map_err(|_| {
                    AnalyzerError::UnresolvableConstraint(format!("bad patch in '{s}'"))
                })
            })
            .transpose()?
            .unwrap_or(0);
        Ok(SolcVersion::new(major, minor, patch))
    }
}

impl fmt::Display for SolcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Bare version or `=`.
    Exact,
    Caret,
    Tilde,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Sign {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "" | "=" => Ok(Sign::Exact),
            "^" => Ok(Sign::Caret),
            "~" => Ok(Sign::Tilde),
            ">=" => Ok(Sign::Ge),
            "<=" => Ok(Sign::Le),
            ">" => Ok(Sign::Gt),
            "<" => Ok(Sign::Lt),
            other => Err(AnalyzerError::UnresolvableConstraint(format!(
                "unsupported sign '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    pub sign: Sign,
    pub version: String,
}

impl VersionConstraint {
    pub fn new(sign: Sign, version: impl Into<String>) -> Self {
        Self {
            sign,
            version: version.into(),
        }
    }

    fn parsed(&self) -> Result<SolcVersion> {
        self.version.parse()
    }

    /// Whether `candidate` lies in the range this constraint describes.
    /// `^` and `~` are restricted to patch-level movement within the
    /// constraint's major.minor line.
    fn satisfied_by(&self, candidate: &SolcVersion) -> Result<bool> {
        let pivot = self.parsed()?;
        Ok(match self.sign {
            Sign::Exact => *candidate == pivot,
            Sign::Caret | Sign::Tilde => candidate.same_minor(&pivot) && *candidate >= pivot,
            Sign::Ge => *candidate >= pivot,
            Sign::Le => *candidate <= pivot,
            Sign::Gt => *candidate > pivot,
            Sign::Lt => *candidate < pivot,
        })
    }
}

/// Extract every `(sign, version)` pair found in `pragma solidity` lines.
pub fn parse_pragmas(source: &str) -> Vec<VersionConstraint> {
    let mut constraints = Vec::new();
    for pragma in PRAGMA_LINE.find_iter(source) {
        for capture in CONSTRAINT.captures_iter(pragma.as_str()) {
            let sign = capture.get(1).map(|m| m.as_str()).unwrap_or("");
            let version = capture.get(2).map(|m| m.as_str()).unwrap_or("");
            if let Ok(sign) = Sign::parse(sign) {
                constraints.push(VersionConstraint::new(sign, version));
            }
        }
    }
    constraints
}

/// The published releases, ascending.
#[derive(Debug, Clone, Default)]
pub struct VersionCatalog {
    versions: Vec<String>,
}

impl VersionCatalog {
    /// Builds a catalogue from release version strings. The input is sorted
    /// into ascending release order; entries that do not parse are dropped.
    pub fn new(versions: impl IntoIterator<Item = String>) -> Self {
        let mut parsed: Vec<(SolcVersion, String)> = versions
            .into_iter()
            .filter_map(|raw| raw.parse::<SolcVersion>().ok().map(|v| (v, raw)))
            .collect();
        parsed.sort_by_key(|(v, _)| *v);
        Self {
            versions: parsed.into_iter().map(|(_, raw)| raw).collect(),
        }
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    fn index_of(&self, version: &str) -> Option<usize> {
        self.versions.iter().position(|v| v == version)
    }

    fn highest_same_minor(&self, pivot: &SolcVersion) -> Option<&str> {
        self.versions
            .iter()
            .filter_map(|raw| raw.parse::<SolcVersion>().ok().map(|v| (v, raw.as_str())))
            .filter(|(v, _)| v.same_minor(pivot) && v >= pivot)
            .max_by_key(|(v, _)| *v)
            .map(|(_, raw)| raw)
    }
}

/// Selects the concrete release satisfying `constraints`.
///
/// A single constraint follows the positional selection rules: `<` picks the
/// catalogue entry immediately preceding the named version, `>` the entry
/// immediately following, `^`/`~` the highest release sharing the named
/// major.minor, and exact/`>=`/`<=` the named version verbatim.
///
/// Multiple constraints are resolved as the intersection of their satisfied
/// ranges, picking the highest release in the intersection. An empty
/// intersection is an `UnresolvableConstraint`.
pub fn resolve(constraints: &[VersionConstraint], catalog: &VersionCatalog) -> Result<String> {
    match constraints {
        [] => Err(AnalyzerError::UnresolvableConstraint(
            "no pragma solidity constraint found".into(),
        )),
        [single] => resolve_single(single, catalog),
        many => resolve_intersection(many, catalog),
    }
}

fn resolve_single(constraint: &VersionConstraint, catalog: &VersionCatalog) -> Result<String> {
    let named = &constraint.version;
    let index = catalog
        .index_of(named)
        .ok_or_else(|| AnalyzerError::UnknownVersion(named.clone()))?;

    let selected = match constraint.sign {
        Sign::Lt => {
            if index == 0 {
                return Err(AnalyzerError::UnresolvableConstraint(format!(
                    "no release earlier than {named}"
                )));
            }
            catalog.versions[index - 1].clone()
        }
        Sign::Gt => catalog
            .versions
            .get(index + 1)
            .cloned()
            .ok_or_else(|| {
                AnalyzerError::UnresolvableConstraint(format!("no release later than {named}"))
            })?,
        Sign::Caret | Sign::Tilde => {
            let pivot = constraint.parsed()?;
            catalog
                .highest_same_minor(&pivot)
                .map(str::to_string)
                .ok_or_else(|| AnalyzerError::UnknownVersion(named.clone()))?
        }
        Sign::Exact | Sign::Ge | Sign::Le => named.clone(),
    };
    Ok(selected)
}

fn resolve_intersection(
    constraints: &[VersionConstraint],
    catalog: &VersionCatalog,
) -> Result<String> {
    for constraint in constraints {
        if !catalog.contains(&constraint.version) {
            return Err(AnalyzerError::UnknownVersion(constraint.version.clone()));
        }
    }

    let mut best: Option<(SolcVersion, &str)> = None;
    for raw in catalog.versions() {
        let candidate: SolcVersion = raw.parse()?;
        let mut ok = true;
        for constraint in constraints {
            if !constraint.satisfied_by(&candidate)? {
                ok = false;
                break;
            }
        }
        if ok && best.map_or(true, |(v, _)| candidate > v) {
            best = Some((candidate, raw));
        }
    }

    best.map(|(_, raw)| raw.to_string()).ok_or_else(|| {
        AnalyzerError::UnresolvableConstraint(format!(
            "no release satisfies all of {constraints:?}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(versions: &[&str]) -> VersionCatalog {
        VersionCatalog::new(versions.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_exact_version() {
        let constraints = parse_pragmas("pragma solidity 0.8.19;");
        assert_eq!(
            constraints,
            vec![VersionConstraint::new(Sign::Exact, "0.8.19")]
        );
    }

    #[test]
    fn test_parse_caret_version() {
        let constraints = parse_pragmas("pragma solidity ^0.8.0;");
        assert_eq!(
            constraints,
            vec![VersionConstraint::new(Sign::Caret, "0.8.0")]
        );
    }

    #[test]
    fn test_parse_range_version() {
        let constraints = parse_pragmas("pragma solidity >=0.7.0 <0.9.0;");
        assert_eq!(
            constraints,
            vec![
                VersionConstraint::new(Sign::Ge, "0.7.0"),
                VersionConstraint::new(Sign::Lt, "0.9.0"),
            ]
        );
    }

    #[test]
    fn test_parse_multiple_pragma_lines() {
        let source = "pragma solidity ^0.8.0;\npragma solidity >=0.8.1;\ncontract C {}";
        assert_eq!(parse_pragmas(source).len(), 2);
    }

    #[test]
    fn test_caret_selects_highest_patch_of_minor() {
        let catalog = catalog(&["0.7.6", "0.8.0", "0.8.1", "0.8.19"]);
        let constraint = [VersionConstraint::new(Sign::Caret, "0.8.0")];
        assert_eq!(resolve(&constraint, &catalog).unwrap(), "0.8.19");
    }

    #[test]
    fn test_lt_selects_preceding_release() {
        let catalog = catalog(&["0.8.0", "0.8.1", "0.8.2"]);
        let constraint = [VersionConstraint::new(Sign::Lt, "0.8.2")];
        assert_eq!(resolve(&constraint, &catalog).unwrap(), "0.8.1");
    }

    #[test]
    fn test_gt_selects_following_release() {
        let catalog = catalog(&["0.8.0", "0.8.1", "0.8.2"]);
        let constraint = [VersionConstraint::new(Sign::Gt, "0.8.0")];
        assert_eq!(resolve(&constraint, &catalog).unwrap(), "0.8.1");
    }

    #[test]
    fn test_exact_is_verbatim() {
        let catalog = catalog(&["0.8.0", "0.8.1"]);
        let constraint = [VersionConstraint::new(Sign::Exact, "0.8.0")];
        assert_eq!(resolve(&constraint, &catalog).unwrap(), "0.8.0");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let catalog = catalog(&["0.8.0"]);
        let constraint = [VersionConstraint::new(Sign::Exact, "0.9.99")];
        assert!(matches!(
            resolve(&constraint, &catalog),
            Err(AnalyzerError::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_intersection_of_range_constraints() {
        let catalog = catalog(&["0.7.0", "0.8.0", "0.8.19", "0.9.0"]);
        let constraints = [
            VersionConstraint::new(Sign::Ge, "0.7.0"),
            VersionConstraint::new(Sign::Lt, "0.9.0"),
        ];
        assert_eq!(resolve(&constraints, &catalog).unwrap(), "0.8.19");
    }

    #[test]
    fn test_empty_intersection_is_unresolvable() {
        let catalog = catalog(&["0.7.0", "0.8.0"]);
        let constraints = [
            VersionConstraint::new(Sign::Lt, "0.7.0"),
            VersionConstraint::new(Sign::Gt, "0.8.0"),
        ];
        assert!(matches!(
            resolve(&constraints, &catalog),
            Err(AnalyzerError::UnresolvableConstraint(_))
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = catalog(&["0.8.0", "0.8.1", "0.8.19"]);
        let constraints = parse_pragmas("pragma solidity ^0.8.0;");
        let first = resolve(&constraints, &catalog).unwrap();
        let second = resolve(&constraints, &catalog).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_version_ordering() {
        let v1 = SolcVersion::new(0, 7, 0);
        let v2 = SolcVersion::new(0, 8, 0);
        let v3 = SolcVersion::new(0, 8, 19);
        assert!(v2 > v1);
        assert!(v3 > v2);
    }

    #[test]
    fn test_has_builtin_overflow_protection() {
        assert!(SolcVersion::new(0, 8, 0).has_builtin_overflow_protection());
        assert!(!SolcVersion::new(0, 7, 6).has_builtin_overflow_protection());
    }
}
