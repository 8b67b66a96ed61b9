// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files describing one upstream library: its identity, the
//! options consumers may set, the packages it requires, and a table of
//! packageable versions. Each version carries its own source locator, ordered
//! patch list and requirement pins.

use crate::error::{Error, Result};
use crate::patch::PatchOperation;
use crate::recipe::options::OptionValue;
use crate::recipe::requirements::{RequirementSet, parse_lenient};
use crate::recipe::version::RecipeVersion;
use crate::toolchain::Os;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A complete recipe for packaging one upstream library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package identity and classification
    pub package: PackageSection,

    /// Build-time choices exposed to consumers
    #[serde(default)]
    pub options: Vec<OptionDecl>,

    /// Upstream packages this library depends on
    #[serde(default)]
    pub requires: Vec<RequirementDecl>,

    /// Tools needed to build (never propagated to consumers)
    #[serde(default)]
    pub tool_requires: Vec<ToolRequirementDecl>,

    /// Preconditions checked before configuring
    #[serde(default)]
    pub validate: ValidateSection,

    /// Build system translation
    #[serde(default)]
    pub build: BuildSection,

    /// Consumption contract published for downstream users
    #[serde(default)]
    pub package_info: PackageInfoSection,

    /// Packageable versions keyed by version identifier
    #[serde(default)]
    pub versions: BTreeMap<String, VersionSection>,

    /// Directory the recipe was loaded from; patch payloads resolve against it
    #[serde(skip)]
    pub recipe_dir: PathBuf,
}

impl Recipe {
    /// Build the value object for one version
    ///
    /// The version's own patch list and requirement pins are the only inputs;
    /// nothing is carried over from neighbouring versions.
    pub fn version(&self, id: &str) -> Result<RecipeVersion> {
        let section = self.versions.get(id).ok_or_else(|| Error::UnknownVersion {
            requested: id.to_string(),
            known: self.version_ids().join(", "),
        })?;

        let requirements =
            RequirementSet::from_decls(&self.requires, &self.tool_requires, &section.requires)?;

        Ok(RecipeVersion::new(
            &self.package.name,
            id,
            section.source.clone(),
            section.patches.clone(),
            requirements,
        ))
    }

    /// All version identifiers, oldest first
    pub fn version_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.versions.keys().map(|s| s.as_str()).collect();
        ids.sort_by(|a, b| compare_version_ids(a, b));
        ids
    }

    /// The newest declared version identifier
    pub fn latest_version(&self) -> Option<&str> {
        self.version_ids().last().copied()
    }

    /// Look up an option declaration by name
    pub fn option(&self, name: &str) -> Option<&OptionDecl> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Whether the recipe opts into a named derivation rule
    pub fn implements(&self, rule: &str) -> bool {
        self.package.implements.iter().any(|r| r == rule)
    }

    /// Resolve a recipe-local payload path (patch files, exports)
    pub fn payload_path(&self, relative: &str) -> PathBuf {
        self.recipe_dir.join(relative)
    }

    /// Recipe-local files that must be staged before fetching `version`
    pub fn payloads_for(&self, version: &RecipeVersion) -> Vec<String> {
        let mut payloads: Vec<String> = self.package.exports.clone();
        for op in version.patches() {
            if let PatchOperation::External(patch) = op
                && !payloads.contains(&patch.patch_file)
            {
                payloads.push(patch.patch_file.clone());
            }
        }
        payloads
    }
}

/// Order version identifiers by lenient semver, falling back to text
fn compare_version_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (parse_lenient(a), parse_lenient(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Package identity section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    /// Where the recipe itself is maintained
    #[serde(default)]
    pub url: Option<String>,

    /// Upstream homepage
    #[serde(default)]
    pub homepage: Option<String>,

    /// Topic tags
    #[serde(default)]
    pub topics: Vec<String>,

    /// Artifact kind
    #[serde(default)]
    pub kind: PackageKind,

    /// License files copied from the source tree into the package
    ///
    /// When empty, common names (LICENSE*, LICENCE*, COPYING*) at the source
    /// root are picked up.
    #[serde(default)]
    pub license_files: Vec<String>,

    /// Option derivation rules the recipe opts into (e.g. `auto_shared_fpic`)
    #[serde(default)]
    pub implements: Vec<String>,

    /// Extra recipe-local files staged during export
    #[serde(default)]
    pub exports: Vec<String>,
}

/// Kind of artifact a recipe produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageKind {
    /// Static or shared, decided by the `shared` option
    #[default]
    Library,
    StaticLibrary,
    SharedLibrary,
    HeaderLibrary,
    Application,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Library => "library",
            Self::StaticLibrary => "static-library",
            Self::SharedLibrary => "shared-library",
            Self::HeaderLibrary => "header-library",
            Self::Application => "application",
        };
        f.write_str(name)
    }
}

/// A declared build option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDecl {
    /// Option name (`fPIC` is accepted for `position_independent_code`)
    pub name: String,

    /// Allowed values
    pub values: Vec<OptionValue>,

    /// Value used when the consumer does not set one
    pub default: OptionValue,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,
}

/// A declared dependency on another package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementDecl {
    /// Package name
    pub name: String,

    /// Version range (`[>=1.83 <1.91]`) or exact pin (`1.81.0`)
    pub version: String,

    /// Headers of this requirement leak to our consumers
    #[serde(default)]
    pub transitive_headers: bool,

    /// Libraries of this requirement leak to our consumers
    #[serde(default)]
    pub transitive_libs: bool,

    /// Components consumers must link against
    #[serde(default)]
    pub components: Vec<String>,

    /// File name the build system uses to find this requirement
    #[serde(default)]
    pub cmake_file_name: Option<String>,
}

/// A tool needed at build time only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequirementDecl {
    pub name: String,
    pub version: String,
}

/// Preconditions checked in the validate phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateSection {
    /// Minimum C++ standard (11, 14, 17, 20, 23)
    #[serde(default)]
    pub min_cppstd: Option<u32>,
}

/// Build system translation section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Build system family
    #[serde(default)]
    pub system: BuildSystemKind,

    /// Cache variable set to the value of the `shared` option
    #[serde(default)]
    pub shared_variable: Option<String>,

    /// Cache variable set to the negation of the `shared` option
    #[serde(default)]
    pub static_variable: Option<String>,

    /// Operating systems where shared builds export all symbols
    #[serde(default)]
    pub export_all_symbols_on: Vec<Os>,

    /// Fixed cache variables handed to the build system
    #[serde(default)]
    pub cache_variables: BTreeMap<String, CacheValue>,
}

/// Supported build system families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystemKind {
    #[default]
    Cmake,
}

/// Value of a build system cache variable
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("ON"),
            Self::Bool(false) => f.write_str("OFF"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Consumption contract section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageInfoSection {
    /// Library names consumers link against
    #[serde(default)]
    pub libs: Vec<String>,

    /// System libraries consumers must also link
    #[serde(default)]
    pub system_libs: Vec<String>,

    /// Canonical lookup name (defaults to the package name)
    #[serde(default)]
    pub cmake_file_name: Option<String>,

    /// Target name (defaults to `name::name`)
    #[serde(default)]
    pub cmake_target_name: Option<String>,

    /// Alias for pkg-config style lookup (defaults to the package name)
    #[serde(default)]
    pub pkg_config_name: Option<String>,

    /// Component-level requirements consumers link against (`dep::component`)
    ///
    /// When empty, derived from the transitive requirements' components.
    #[serde(default)]
    pub requires: Vec<String>,
}

/// One packageable version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSection {
    /// Where the upstream source comes from
    pub source: SourceLocator,

    /// Ordered patch list for this version only
    #[serde(default)]
    pub patches: Vec<PatchOperation>,

    /// Requirement pins overriding the recipe-wide ranges
    #[serde(default)]
    pub requires: BTreeMap<String, String>,
}

/// Upstream source locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    /// URL, `file://` URL, archive path or directory path
    pub url: String,

    /// Expected SHA-256 of the archive
    #[serde(default)]
    pub sha256: Option<String>,

    /// Strip the single top-level directory after unpacking
    #[serde(default = "default_strip_root")]
    pub strip_root: bool,
}

fn default_strip_root() -> bool {
    true
}

impl SourceLocator {
    /// Whether the locator needs network transport
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    /// Local filesystem path for non-remote locators
    pub fn local_path(&self) -> Option<&Path> {
        if self.is_remote() {
            None
        } else {
            Some(Path::new(self.url.strip_prefix("file://").unwrap_or(&self.url)))
        }
    }

    /// File name of the archive the locator points at
    pub fn file_name(&self) -> String {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe;

    const RECIPE: &str = r#"
[package]
name = "demo"

[[requires]]
name = "zlib"
version = "[>=1.2 <2]"

[versions."1.9.0"]
source = { url = "https://example.com/demo-1.9.0.tar.gz" }

[versions."1.10.0"]
source = { url = "https://example.com/demo-1.10.0.tar.gz", strip_root = false }
requires = { zlib = "1.2.13" }

[versions."cci.20230101"]
source = { url = "/srv/snapshots/demo" }
"#;

    #[test]
    fn test_version_ordering() {
        let recipe = parse_recipe(RECIPE).unwrap();
        assert_eq!(
            recipe.version_ids(),
            vec!["cci.20230101", "1.9.0", "1.10.0"]
        );
        assert_eq!(recipe.latest_version(), Some("1.10.0"));
    }

    #[test]
    fn test_unknown_version_lists_known() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let err = recipe.version("2.0.0").unwrap_err();
        match err {
            Error::UnknownVersion { requested, known } => {
                assert_eq!(requested, "2.0.0");
                assert!(known.contains("1.10.0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_source_locator_defaults() {
        let recipe = parse_recipe(RECIPE).unwrap();
        let old = &recipe.versions["1.9.0"].source;
        assert!(old.strip_root);
        assert!(old.is_remote());
        assert_eq!(old.file_name(), "demo-1.9.0.tar.gz");

        let snapshot = &recipe.versions["cci.20230101"].source;
        assert_eq!(snapshot.local_path(), Some(Path::new("/srv/snapshots/demo")));
    }

    #[test]
    fn test_cache_value_display() {
        assert_eq!(CacheValue::Bool(true).to_string(), "ON");
        assert_eq!(CacheValue::Bool(false).to_string(), "OFF");
        assert_eq!(CacheValue::Int(3).to_string(), "3");
        assert_eq!(CacheValue::Str("x".into()).to_string(), "x");
    }
}
