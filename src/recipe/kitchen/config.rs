// src/recipe/kitchen/config.rs

//! Configuration and result types for the Kitchen

use crate::error::{Error, Result};
use crate::package_info::ArtifactDescriptor;
use crate::patch::MutationRecord;
use crate::toolchain::{InstallReceipt, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::resolver::DependencyRoot;

/// File name of the user configuration
pub const CONFIG_FILE_NAME: &str = "galley.toml";

/// Configuration for the Kitchen
///
/// Every field has a code default; a `galley.toml` only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KitchenConfig {
    /// Directory for downloaded source archives
    pub source_cache: PathBuf,
    /// Parent directory of per-cook scratch trees
    pub work_root: PathBuf,
    /// Number of parallel build jobs
    pub jobs: u32,
    /// Keep the scratch tree after the cook (for debugging)
    pub keep_builddir: bool,
    /// Refuse network downloads; only cached or local sources are used
    pub offline: bool,
    /// Settings profile builds run under
    pub settings: Settings,
    /// Install roots of built dependencies, keyed by requirement name
    pub dependency_roots: BTreeMap<String, DependencyRoot>,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        let cache = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            source_cache: cache.join("galley").join("sources"),
            work_root: std::env::temp_dir().join("galley"),
            jobs,
            keep_builddir: false,
            offline: false,
            settings: Settings::default(),
            dependency_roots: BTreeMap::new(),
        }
    }
}

impl KitchenConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded kitchen config from {}", path.display());
        Ok(config)
    }

    /// Location of the per-user configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("galley").join(CONFIG_FILE_NAME))
    }

    /// Load the per-user configuration, falling back to defaults when absent
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Hashes of the recipe-local files staged by the export phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportManifest {
    entries: BTreeMap<String, String>,
}

impl ExportManifest {
    pub(crate) fn insert(&mut self, relative: &str, sha256: String) {
        self.entries.insert(relative.to_string(), sha256);
    }

    /// SHA-256 of a staged file
    pub fn get(&self, relative: &str) -> Option<&str> {
        self.entries.get(relative).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of cooking a recipe version
#[derive(Debug)]
pub struct CookResult {
    /// Package layout the install step populated
    pub package_dir: PathBuf,
    /// Published consumption contract
    pub descriptor: ArtifactDescriptor,
    /// One record per applied patch operation
    pub mutation_log: Vec<MutationRecord>,
    /// Staged recipe payloads
    pub export: ExportManifest,
    /// Files installed into `package_dir`
    pub receipt: InstallReceipt,
    /// Non-fatal findings
    pub warnings: Vec<String>,
    /// Build log
    pub log: String,
}
