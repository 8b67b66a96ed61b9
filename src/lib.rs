// src/lib.rs

//! Galley: recipe-driven package builds
//!
//! Galley turns a recipe for a third-party native library into an installable
//! package. A cook fetches the exact upstream source of one recipe version,
//! patches it, validates the configuration against the active toolchain,
//! drives the build system, and publishes a descriptor telling consumers what
//! to link against.
//!
//! # Architecture
//!
//! - Recipes: TOML files with a per-version table of sources, patches and
//!   requirement pins
//! - Patch engine: exact-substring replacements and unified diffs, fail-fast
//!   on upstream drift
//! - Kitchen: a linear lifecycle with typed phases; any failure aborts
//! - Toolchain adapters: configure/build/install against an immutable build
//!   configuration
//! - Package info: a pure, deterministic artifact descriptor

mod error;
pub mod hash;
pub mod package_info;
pub mod patch;
pub mod recipe;
pub mod toolchain;

pub use error::{Error, Result};
pub use package_info::{ArtifactDescriptor, LookupNames, publish};
pub use patch::{MutationRecord, PatchEngine, PatchOperation, PatchOutcome, SourceTree};
pub use recipe::{
    Cook, CookResult, Kitchen, KitchenConfig, LifecycleState, OptionOverrides, Phase, Recipe,
    RecipeVersion,
};
pub use toolchain::{BuildConfiguration, CMakeAdapter, Settings, ToolchainAdapter};
