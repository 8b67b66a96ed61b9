// src/recipe/mod.rs

//! Recipe system for packaging upstream libraries from source
//!
//! A recipe describes one upstream library: the options consumers may set,
//! the packages it requires, and a table of packageable versions. Each
//! version carries its own source locator, ordered patch list and
//! requirement pins, so two versions of the same recipe may patch the
//! upstream source in entirely different ways.
//!
//! # Culinary Terminology
//!
//! - **Recipe**: the build specification
//! - **Cook**: build one recipe version into a package
//! - **Kitchen**: owns the collaborators a cook needs (fetcher, toolchain,
//!   requirement resolver)
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "disruptor-cpp"
//! license = "Apache-2.0"
//!
//! [[options]]
//! name = "shared"
//! values = [true, false]
//! default = false
//!
//! [[requires]]
//! name = "boost"
//! version = "[>=1.83 <1.91]"
//! components = ["system", "thread", "chrono"]
//!
//! [versions."1.3.1"]
//! source = { url = "https://example.com/v1.3.1.tar.gz", sha256 = "..." }
//!
//! [[versions."1.3.1".patches]]
//! file = "CMakeLists.txt"
//! anchor = "project(Disruptor)\ncmake_minimum_required(VERSION 2.6)"
//! replacement = "cmake_minimum_required(VERSION 2.6)\nproject(Disruptor)"
//! ```

mod format;
mod kitchen;
mod options;
pub mod parser;
mod requirements;
mod version;

pub use format::{
    BuildSection, BuildSystemKind, CacheValue, OptionDecl, PackageInfoSection, PackageKind,
    PackageSection, Recipe, RequirementDecl, SourceLocator, ToolRequirementDecl, ValidateSection,
    VersionSection,
};
pub use kitchen::{
    ArchiveFetcher, ArchiveFormat, CONFIG_FILE_NAME, Cook, CookResult, DependencyRoot,
    ExportManifest, Kitchen, KitchenConfig, LifecycleState, NoopResolver, Phase,
    RequirementResolver, SourceFetcher, StaticResolver, copy_tree, resolve_all, unpack,
};
pub use options::{
    AUTO_SHARED_FPIC, Linkage, OptionOverrides, OptionValue, PIC, PIC_ALIAS, ResolvedOptions,
    SHARED, canonical_option_name, resolve_options,
};
pub use parser::{RECIPE_FILE_NAME, parse_recipe, parse_recipe_file, validate_recipe};
pub use requirements::{Requirement, RequirementSet, ToolRequirement, VersionRange, parse_lenient};
pub use version::RecipeVersion;
