// src/toolchain/mod.rs

//! Build toolchain integration
//!
//! The lifecycle never compiles anything itself. It hands an immutable
//! [`BuildConfiguration`] to a [`ToolchainAdapter`], which translates it into
//! the external build system's language and runs configure, build and install.

mod cmake;
mod configuration;
mod settings;

pub use cmake::{CMakeAdapter, TOOLCHAIN_FILE_NAME, render_toolchain_file};
pub use configuration::{
    BuildConfiguration, BuildLayout, EXPORT_ALL_SYMBOLS, POSITION_INDEPENDENT_CODE, Validated,
    validate,
};
pub use settings::{BuildType, CompilerKind, KNOWN_CPPSTD, Os, Settings, cppstd_rank, is_known_cppstd};

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configure/build/install protocol of an external build system
pub trait ToolchainAdapter: Send + Sync {
    /// Adapter name used in logs
    fn name(&self) -> &str;

    /// Newest C++ standard the active compiler supports
    fn max_cppstd(&self, settings: &Settings) -> u32 {
        settings.compiler.max_cppstd(&settings.compiler_version)
    }

    /// Prepare build files; must not compile
    fn configure(&self, config: &BuildConfiguration) -> Result<ConfiguredState>;

    /// Compile and link
    fn build(&self, state: &ConfiguredState) -> Result<BuildArtifacts>;

    /// Install build outputs under `destination`
    fn install(&self, artifacts: &BuildArtifacts, destination: &Path) -> Result<InstallReceipt>;
}

/// Result of a successful configure step
#[derive(Debug, Clone)]
pub struct ConfiguredState {
    pub build_dir: PathBuf,
    pub build_type: BuildType,
    pub jobs: u32,
    /// Files the adapter generated (toolchain files, presets)
    pub generated: Vec<PathBuf>,
    pub log: String,
}

/// Result of a successful build step
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    pub build_dir: PathBuf,
    pub build_type: BuildType,
    pub log: String,
}

/// What an install step put into the package layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReceipt {
    pub prefix: PathBuf,
    /// Installed files relative to `prefix`, sorted
    pub files: Vec<PathBuf>,
    #[serde(skip)]
    pub log: String,
}

impl InstallReceipt {
    /// List everything installed under `prefix`
    pub fn collect(prefix: &Path, log: String) -> Result<Self> {
        let mut files = Vec::new();
        for entry in WalkDir::new(prefix).follow_links(false) {
            let entry = entry.map_err(|e| {
                crate::Error::InstallError(format!("cannot list {}: {}", prefix.display(), e))
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(prefix) {
                files.push(relative.to_path_buf());
            }
        }
        files.sort();

        Ok(Self {
            prefix: prefix.to_path_buf(),
            files,
            log,
        })
    }

    /// Installed files under `lib/`, `lib64/` and `bin/`
    pub fn library_files(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .map(PathBuf::as_path)
            .filter(|f| {
                top_level_dir(f).is_some_and(|d| d == "bin" || LIBRARY_DIRS.contains(&d))
            })
    }

    /// Library directories that actually received files, in install order
    pub fn library_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = Vec::new();
        for dir in self.files.iter().filter_map(|f| top_level_dir(f)) {
            if LIBRARY_DIRS.contains(&dir) && !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_string());
            }
        }
        dirs
    }
}

/// Directories CMake's GNUInstallDirs may pick for libraries
const LIBRARY_DIRS: [&str; 2] = ["lib", "lib64"];

/// First path component, when the path lies inside a directory
fn top_level_dir(path: &Path) -> Option<&str> {
    let mut components = path.components();
    let first = components.next()?;
    components.next()?;
    first.as_os_str().to_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_receipt_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::create_dir_all(dir.path().join("include/demo")).unwrap();
        fs::write(dir.path().join("lib/libdemo.a"), b"!<arch>").unwrap();
        fs::write(dir.path().join("include/demo/demo.h"), b"#pragma once").unwrap();

        let receipt = InstallReceipt::collect(dir.path(), String::new()).unwrap();
        assert_eq!(
            receipt.files,
            vec![
                PathBuf::from("include/demo/demo.h"),
                PathBuf::from("lib/libdemo.a")
            ]
        );
        assert_eq!(receipt.library_files().count(), 1);
    }

    #[test]
    fn test_lib64_counts_as_library_dir() {
        let receipt = InstallReceipt {
            prefix: PathBuf::from("/pkg"),
            files: ["include/x.h", "lib/cmake/x/x-config.cmake", "lib64/libx.so", "libfoo"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            log: String::new(),
        };

        let files: Vec<&Path> = receipt.library_files().collect();
        assert_eq!(
            files,
            vec![Path::new("lib/cmake/x/x-config.cmake"), Path::new("lib64/libx.so")]
        );
        assert_eq!(receipt.library_dirs(), vec!["lib", "lib64"]);
    }
}
