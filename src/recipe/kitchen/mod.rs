// src/recipe/kitchen/mod.rs

//! Kitchen: where recipe versions are cooked into packages
//!
//! A cook walks one recipe version through a linear lifecycle:
//! - Export: stage recipe-local payloads (patch files, licenses)
//! - Fetch: unpack the upstream source into a fresh tree
//! - Patch: apply the version's patch list in declaration order
//! - Validate: check the toolchain can satisfy the recipe
//! - Configure, Build: drive the toolchain adapter
//! - Package: install into the package layout, copy licenses
//! - Publish: emit the artifact descriptor
//!
//! Any failure aborts the cook. Nothing is retried, and no partial package
//! layout survives an abort.

mod archive;
mod config;
mod cook;
mod lifecycle;
mod resolver;

pub use archive::{ArchiveFetcher, ArchiveFormat, SourceFetcher, copy_tree, unpack};
pub use config::{CONFIG_FILE_NAME, CookResult, ExportManifest, KitchenConfig};
pub use cook::Cook;
pub use lifecycle::{LifecycleState, Phase};
pub use resolver::{DependencyRoot, NoopResolver, RequirementResolver, StaticResolver, resolve_all};

use crate::error::{Error, Result};
use crate::patch::{MutationRecord, PatchEngine, SourceTree};
use crate::recipe::format::Recipe;
use crate::recipe::options::OptionOverrides;
use crate::toolchain::{CMakeAdapter, ToolchainAdapter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    fetcher: Box<dyn SourceFetcher>,
    toolchain: Box<dyn ToolchainAdapter>,
    resolver: Arc<dyn RequirementResolver>,
}

impl Kitchen {
    /// Create a Kitchen with explicit collaborators
    ///
    /// Requirements resolve against the configured dependency roots.
    pub fn new(
        config: KitchenConfig,
        fetcher: Box<dyn SourceFetcher>,
        toolchain: Box<dyn ToolchainAdapter>,
    ) -> Self {
        let resolver = Arc::new(StaticResolver::from_roots(config.dependency_roots.clone()));
        Self {
            config,
            fetcher,
            toolchain,
            resolver,
        }
    }

    /// Create a Kitchen that downloads with [`ArchiveFetcher`] and builds
    /// with the `cmake` found on `PATH`
    pub fn with_defaults(config: KitchenConfig) -> Result<Self> {
        let fetcher = ArchiveFetcher::new(&config.source_cache, config.offline);
        let toolchain = CMakeAdapter::locate()?;
        Ok(Self::new(config, Box::new(fetcher), Box::new(toolchain)))
    }

    /// Replace the requirement resolver
    pub fn set_resolver(&mut self, resolver: Arc<dyn RequirementResolver>) {
        self.resolver = resolver;
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Name of the toolchain adapter in use
    pub fn toolchain_name(&self) -> &str {
        self.toolchain.name()
    }

    /// Set up a cook in the `Defined` state without running any phase
    pub fn prepare<'a>(
        &'a self,
        recipe: &'a Recipe,
        version_id: &str,
        overrides: &OptionOverrides,
        output_dir: &Path,
    ) -> Result<Cook<'a>> {
        let version = recipe.version(version_id)?;
        debug!("Preparing {}", version.reference());
        fs::create_dir_all(output_dir)?;
        Cook::new(self, recipe, version, overrides, output_dir)
    }

    /// Cook one recipe version into `output_dir`
    ///
    /// The package lands in `output_dir/<name>-<version>-<linkage>`. On
    /// failure the error is [`Error::Aborted`] naming the failing phase.
    pub fn cook(
        &self,
        recipe: &Recipe,
        version_id: &str,
        overrides: &OptionOverrides,
        output_dir: &Path,
    ) -> Result<CookResult> {
        let mut cook = self.prepare(recipe, version_id, overrides, output_dir)?;
        info!(
            "Cooking {}/{} with {}",
            recipe.package.name,
            version_id,
            self.toolchain.name()
        );
        let outcome = cook.run();

        if self.config.keep_builddir {
            cook.keep_work_dir();
        }
        outcome?;

        let result = cook.into_result()?;
        info!("Cooked: {}", result.package_dir.display());
        Ok(result)
    }

    /// Fetch and patch a version into `dest` without building
    ///
    /// Used to check a recipe's patches still apply to its upstream source.
    /// `dest` must be empty or absent. The tree is assembled in a staging
    /// directory next to `dest` and moved into place only once every patch
    /// has applied, so a failure leaves `dest` as it was.
    pub fn patch_only(
        &self,
        recipe: &Recipe,
        version_id: &str,
        dest: &Path,
    ) -> Result<Vec<MutationRecord>> {
        let version = recipe.version(version_id)?;
        if !cook::is_empty_dir(dest)? {
            return Err(Error::IoError(format!(
                "{} already exists and is not empty",
                dest.display()
            )));
        }

        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".galley-patch-")
            .tempdir_in(&parent)
            .map_err(|e| Error::IoError(format!("Failed to create staging directory: {}", e)))?;
        let export_dir = staging.path().join("export");
        let source_dir = staging.path().join("source");

        fs::create_dir_all(&export_dir)?;
        cook::stage_payloads(recipe, &version, &export_dir)
            .map_err(|e| cook::aborted(&version, Phase::Export, e))?;

        fs::create_dir_all(&source_dir)?;
        self.fetcher
            .fetch(version.source(), &source_dir)
            .map_err(|e| cook::aborted(&version, Phase::Fetch, e))?;

        let mut tree = SourceTree::open(&source_dir)?;
        PatchEngine::new(&export_dir)
            .apply_all(&mut tree, version.patches())
            .map_err(|e| cook::aborted(&version, Phase::Patch, e))?;
        let log = tree.take_log();

        if dest.exists() {
            fs::remove_dir(dest)?;
        }
        fs::rename(&source_dir, dest).map_err(|e| {
            Error::IoError(format!("Failed to move patched tree to {}: {}", dest.display(), e))
        })?;

        info!(
            "Patched {} into {}",
            version.reference(),
            dest.display()
        );
        Ok(log)
    }
}
