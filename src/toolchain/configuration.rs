// src/toolchain/configuration.rs

//! Resolved build configuration

use crate::error::Result;
use crate::recipe::{CacheValue, Linkage, Recipe, RecipeVersion, ResolvedOptions};
use crate::toolchain::Settings;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cache variable CMake uses to export every symbol from a DLL
pub const EXPORT_ALL_SYMBOLS: &str = "CMAKE_WINDOWS_EXPORT_ALL_SYMBOLS";

/// Cache variable carrying the PIC choice
pub const POSITION_INDEPENDENT_CODE: &str = "CMAKE_POSITION_INDEPENDENT_CODE";

/// Outcome of the validate phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validated {
    /// C++ standard the build will use
    pub cppstd: u32,
    /// Whether the shared build must export all symbols on this OS
    pub export_all_symbols: bool,
}

/// Check the environment-independent preconditions of a build
///
/// Fails with `UnsupportedConfiguration` when the toolchain cannot reach the
/// recipe's minimum C++ standard.
pub fn validate(
    recipe: &Recipe,
    options: &ResolvedOptions,
    settings: &Settings,
    max_cppstd: u32,
) -> Result<Validated> {
    let cppstd = settings.resolve_cppstd(recipe.validate.min_cppstd, max_cppstd)?;
    let export_all_symbols =
        options.shared() && recipe.build.export_all_symbols_on.contains(&settings.os);

    debug!(
        "Validated {}: C++{}, export all symbols: {}",
        recipe.package.name, cppstd, export_all_symbols
    );
    Ok(Validated {
        cppstd,
        export_all_symbols,
    })
}

/// Directories and parallelism of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildLayout {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub jobs: u32,
}

/// Everything the toolchain adapter needs, fixed once per invocation
///
/// Built after validation and never mutated afterwards; adapters receive it by
/// shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfiguration {
    package: String,
    version: String,
    settings: Settings,
    options: ResolvedOptions,
    requirement_paths: BTreeMap<String, PathBuf>,
    dependency_file_names: BTreeMap<String, String>,
    cache_variables: BTreeMap<String, CacheValue>,
    min_cppstd: Option<u32>,
    cppstd: u32,
    layout: BuildLayout,
}

impl BuildConfiguration {
    /// Derive the configuration from the recipe, its version and the resolved
    /// choices of this invocation
    pub fn derive(
        recipe: &Recipe,
        version: &RecipeVersion,
        options: ResolvedOptions,
        settings: &Settings,
        validated: Validated,
        requirement_paths: BTreeMap<String, PathBuf>,
        layout: BuildLayout,
    ) -> Self {
        let mut cache_variables = recipe.build.cache_variables.clone();
        let shared = options.shared();

        if let Some(var) = &recipe.build.shared_variable {
            cache_variables.insert(var.clone(), CacheValue::Bool(shared));
        }
        if let Some(var) = &recipe.build.static_variable {
            cache_variables.insert(var.clone(), CacheValue::Bool(!shared));
        }
        if validated.export_all_symbols {
            cache_variables.insert(EXPORT_ALL_SYMBOLS.to_string(), CacheValue::Bool(true));
        }
        if let Some(pic) = options.pic() {
            cache_variables.insert(POSITION_INDEPENDENT_CODE.to_string(), CacheValue::Bool(pic));
        }

        let dependency_file_names = version
            .requirements()
            .iter()
            .map(|r| (r.name.clone(), r.file_name().to_string()))
            .collect();

        Self {
            package: version.package().to_string(),
            version: version.version().to_string(),
            settings: settings.clone(),
            options,
            requirement_paths,
            dependency_file_names,
            cache_variables,
            min_cppstd: recipe.validate.min_cppstd,
            cppstd: validated.cppstd,
            layout,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    pub fn linkage(&self) -> Linkage {
        self.options.linkage()
    }

    /// Install roots of resolved requirements, keyed by requirement name
    pub fn requirement_paths(&self) -> &BTreeMap<String, PathBuf> {
        &self.requirement_paths
    }

    /// Lookup file name of each requirement (`boost` → `Boost`)
    pub fn dependency_file_names(&self) -> &BTreeMap<String, String> {
        &self.dependency_file_names
    }

    pub fn cache_variables(&self) -> &BTreeMap<String, CacheValue> {
        &self.cache_variables
    }

    pub fn min_cppstd(&self) -> Option<u32> {
        self.min_cppstd
    }

    pub fn cppstd(&self) -> u32 {
        self.cppstd
    }

    pub fn source_dir(&self) -> &Path {
        &self.layout.source_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.layout.build_dir
    }

    pub fn jobs(&self) -> u32 {
        self.layout.jobs
    }
}
