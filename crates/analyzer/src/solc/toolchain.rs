//! Toolchain installation and caching
//!
//! Fetches the published release list, downloads release binaries into a
//! local cache directory and hands out explicit [`Toolchain`] handles. The
//! invoker takes a handle as input; nothing in the pipeline depends on a
//! process-global "active version".

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AnalyzerError, Result};
use crate::solc::version::VersionCatalog;

const DEFAULT_BASE_URL: &str = "https://binaries.soliditylang.org";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[cfg(target_os = "macos")]
const PLATFORM: &str = "macosx-amd64";
#[cfg(target_os = "windows")]
const PLATFORM: &str = "windows-amd64";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM: &str = "linux-amd64";

/// A concrete, locally installed compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub version: String,
    pub binary: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ReleaseList {
    releases: BTreeMap<String, String>,
}

/// The remote release endpoint: a version list plus per-version artifact
/// names, both served under a platform-specific prefix.
#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    base_url: String,
    releases: BTreeMap<String, String>,
}

impl ReleaseCatalog {
    /// Fetches the release list. Network GETs are idempotent, so a single
    /// bounded retry is applied before giving up.
    pub fn fetch() -> Result<Self> {
        Self::fetch_from(DEFAULT_BASE_URL)
    }

    pub fn fetch_from(base_url: &str) -> Result<Self> {
        let url = format!("{base_url}/{PLATFORM}/list.json");
        let body = get_with_retry(&url)?;
        let list: ReleaseList = serde_json::from_slice(&body)
            .map_err(|e| AnalyzerError::Network(format!("malformed release list: {e}")))?;
        Ok(Self {
            base_url: base_url.to_string(),
            releases: list.releases,
        })
    }

    /// Builds a catalogue from an already-known release map, bypassing the
    /// network. Used by tests and offline callers.
    pub fn from_releases(releases: BTreeMap<String, String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            releases,
        }
    }

    pub fn versions(&self) -> VersionCatalog {
        VersionCatalog::new(self.releases.keys().cloned())
    }

    pub fn artifact(&self, version: &str) -> Option<&str> {
        self.releases.get(version).map(String::as_str)
    }

    fn artifact_url(&self, version: &str) -> Result<String> {
        let artifact = self
            .artifact(version)
            .ok_or_else(|| AnalyzerError::UnknownVersion(version.to_string()))?;
        Ok(format!("{}/{PLATFORM}/{artifact}", self.base_url))
    }
}

/// The local binary cache, laid out as
/// `<root>/solc-<version>/solc-<version>`.
#[derive(Debug, Clone)]
pub struct ToolchainCache {
    root: PathBuf,
}

impl ToolchainCache {
    /// The default cache under the user's home directory
    /// (`~/.tansa/solc-bins`), overridable with `TANSA_SOLC_DIR`.
    pub fn default_location() -> Result<Self> {
        if let Some(dir) = std::env::var_os("TANSA_SOLC_DIR") {
            return Ok(Self::at(PathBuf::from(dir)));
        }
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| AnalyzerError::Installation {
                version: String::new(),
                reason: "cannot locate home directory (HOME unset)".into(),
            })?;
        Ok(Self::at(home.join(".tansa").join("solc-bins")))
    }

    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn binary_path(&self, version: &str) -> PathBuf {
        self.root
            .join(format!("solc-{version}"))
            .join(format!("solc-{version}"))
    }

    pub fn is_installed(&self, version: &str) -> bool {
        self.binary_path(version).is_file()
    }

    pub fn installed_versions(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("solc-"))
                    .map(str::to_string)
            })
            .collect();
        versions.sort();
        versions
    }

    /// Returns the cached binary, downloading it first when absent.
    pub fn install(&self, version: &str, catalog: &ReleaseCatalog) -> Result<Toolchain> {
        let binary = self.binary_path(version);
        if binary.is_file() {
            debug!(version, "solc already installed");
            return Ok(Toolchain {
                version: version.to_string(),
                binary,
            });
        }

        let url = catalog.artifact_url(version)?;
        info!(version, "installing solc");
        let bytes = get_with_retry(&url).map_err(|e| AnalyzerError::Installation {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

        let dir = binary.parent().expect("binary path has a parent");
        fs::create_dir_all(dir)?;
        fs::write(&binary, bytes)?;
        set_executable(&binary)?;
        info!(version, path = %binary.display(), "solc installed");

        Ok(Toolchain {
            version: version.to_string(),
            binary,
        })
    }

    pub fn uninstall(&self, version: &str) -> Result<()> {
        let dir = self.root.join(format!("solc-{version}"));
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
            info!(version, "solc uninstalled");
            if self.global_version()?.as_deref() == Some(version) {
                fs::remove_file(self.global_version_file())?;
            }
        }
        Ok(())
    }

    // Narrow adapter for external tooling that keys off a plain-text
    // "global version" pointer. The pipeline itself never reads it.
    fn global_version_file(&self) -> PathBuf {
        self.root.join("global-version")
    }

    pub fn global_version(&self) -> Result<Option<String>> {
        let path = self.global_version_file();
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?.trim().to_string()))
    }

    pub fn set_global_version(&self, version: &str) -> Result<()> {
        if !self.is_installed(version) {
            return Err(AnalyzerError::UnknownVersion(version.to_string()));
        }
        fs::create_dir_all(&self.root)?;
        fs::write(self.global_version_file(), version)?;
        Ok(())
    }
}

fn get_with_retry(url: &str) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| AnalyzerError::Network(e.to_string()))?;

    let mut last_error = None;
    for attempt in 0..2 {
        if attempt > 0 {
            debug!(url, "retrying GET");
        }
        match client.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(response) => {
                return response
                    .bytes()
                    .map(|b| b.to_vec())
                    .map_err(|e| AnalyzerError::Network(e.to_string()));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(AnalyzerError::Network(
        last_error.map(|e| e.to_string()).unwrap_or_default(),
    ))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_versions_on_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(dir.path().to_path_buf());
        assert!(cache.installed_versions().is_empty());
        assert!(!cache.is_installed("0.8.19"));
    }

    #[test]
    fn test_installed_versions_lists_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(dir.path().to_path_buf());
        for version in ["0.8.19", "0.7.6"] {
            let bin = dir
                .path()
                .join(format!("solc-{version}"))
                .join(format!("solc-{version}"));
            fs::create_dir_all(bin.parent().unwrap()).unwrap();
            fs::write(&bin, b"#!/bin/sh\n").unwrap();
        }
        assert_eq!(cache.installed_versions(), vec!["0.7.6", "0.8.19"]);
        assert!(cache.is_installed("0.8.19"));
    }

    #[test]
    fn test_global_version_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(dir.path().to_path_buf());
        assert_eq!(cache.global_version().unwrap(), None);

        let bin = dir.path().join("solc-0.8.19").join("solc-0.8.19");
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, b"").unwrap();

        cache.set_global_version("0.8.19").unwrap();
        assert_eq!(cache.global_version().unwrap().as_deref(), Some("0.8.19"));
    }

    #[test]
    fn test_set_global_version_requires_install() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(dir.path().to_path_buf());
        assert!(matches!(
            cache.set_global_version("0.8.19"),
            Err(AnalyzerError::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_catalog_artifact_lookup() {
        let mut releases = BTreeMap::new();
        releases.insert("0.8.19".to_string(), "solc-v0.8.19".to_string());
        let catalog = ReleaseCatalog::from_releases(releases);
        assert_eq!(catalog.artifact("0.8.19"), Some("solc-v0.8.19"));
        assert!(catalog.artifact("0.4.0").is_none());
        assert_eq!(catalog.versions().versions(), ["0.8.19"]);
    }
}
