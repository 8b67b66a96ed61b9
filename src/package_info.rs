// src/package_info.rs

//! Package Info Publisher
//!
//! Describes what a built package provides and what consumers must link
//! against. Publishing is a pure function of the recipe version, the resolved
//! options and the requirement set: no filesystem access, no clock, and
//! ordered maps only, so identical inputs serialize to identical bytes.

use crate::error::Result;
use crate::recipe::{Linkage, OptionValue, PackageKind, Recipe, RecipeVersion, ResolvedOptions};
use serde::Serialize;
use std::collections::BTreeMap;

/// Names downstream build descriptions use to find the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupNames {
    /// Canonical config-package name (`find_package(<name>)`)
    pub cmake_file_name: String,
    /// Imported target consumers link (`name::name`)
    pub cmake_target_name: String,
    /// Alias for pkg-config style lookup
    pub pkg_config_name: String,
}

/// Published description of one built package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    pub package: String,
    pub version: String,
    pub kind: PackageKind,
    /// Absent for header-only packages and applications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkage: Option<Linkage>,
    pub libs: Vec<String>,
    pub system_libs: Vec<String>,
    pub lookup: LookupNames,
    /// Component-level requirements consumers link against
    pub requires: Vec<String>,
    pub options: BTreeMap<String, OptionValue>,
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub bin_dirs: Vec<String>,
}

impl ArtifactDescriptor {
    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

/// Build the descriptor for one version
///
/// Explicit `package_info.requires` entries must name declared requirements
/// or their components; without them, the component references of every
/// propagating requirement are published.
pub fn publish(
    recipe: &Recipe,
    version: &RecipeVersion,
    options: &ResolvedOptions,
) -> Result<ArtifactDescriptor> {
    let info = &recipe.package_info;
    let name = version.package();
    let requirements = version.requirements();

    let requires = if info.requires.is_empty() {
        requirements.consumer_refs()
    } else {
        for reference in &info.requires {
            requirements.check_reference(reference)?;
        }
        info.requires.clone()
    };

    let kind = recipe.package.kind;
    let linkage = match kind {
        PackageKind::Library => Some(options.linkage()),
        PackageKind::StaticLibrary => Some(Linkage::Static),
        PackageKind::SharedLibrary => Some(Linkage::Shared),
        PackageKind::HeaderLibrary | PackageKind::Application => None,
    };

    let libs = match kind {
        PackageKind::HeaderLibrary | PackageKind::Application => Vec::new(),
        _ if info.libs.is_empty() => vec![name.to_string()],
        _ => info.libs.clone(),
    };

    let cmake_file_name = info
        .cmake_file_name
        .clone()
        .unwrap_or_else(|| name.to_string());
    let lookup = LookupNames {
        cmake_target_name: info
            .cmake_target_name
            .clone()
            .unwrap_or_else(|| format!("{0}::{0}", cmake_file_name)),
        pkg_config_name: info
            .pkg_config_name
            .clone()
            .unwrap_or_else(|| name.to_string()),
        cmake_file_name,
    };

    let (lib_dirs, bin_dirs) = match kind {
        PackageKind::HeaderLibrary => (Vec::new(), Vec::new()),
        PackageKind::Application => (Vec::new(), vec!["bin".to_string()]),
        _ if linkage == Some(Linkage::Shared) => {
            (vec!["lib".to_string()], vec!["bin".to_string()])
        }
        _ => (vec!["lib".to_string()], Vec::new()),
    };

    Ok(ArtifactDescriptor {
        package: name.to_string(),
        version: version.version().to_string(),
        kind,
        linkage,
        libs,
        system_libs: info.system_libs.clone(),
        lookup,
        requires,
        options: options.to_map(),
        include_dirs: vec!["include".to_string()],
        lib_dirs,
        bin_dirs,
    })
}
