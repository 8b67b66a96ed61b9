// src/commands/patch.rs

//! Patch command - fetch and patch a recipe version without building

use anyhow::{Context, Result};
use galley::Kitchen;
use galley::recipe::ArchiveFetcher;
use galley::toolchain::CMakeAdapter;
use std::path::Path;

use super::{load_config, load_recipe, pick_version};

/// Unpack the patched source of one version into `dest`
///
/// Fails on the first patch that no longer applies, naming the file and the
/// anchor involved.
pub fn cmd_patch(
    recipe_path: &Path,
    version: Option<&str>,
    dest: &Path,
    offline: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let version = pick_version(&recipe, version)?;

    let mut config = load_config(config_path)?;
    config.offline |= offline;

    // Patching never builds, so any cmake path will do
    let fetcher = ArchiveFetcher::new(&config.source_cache, config.offline);
    let toolchain = CMakeAdapter::with_program("cmake");
    let kitchen = Kitchen::new(config, Box::new(fetcher), Box::new(toolchain));

    let log = kitchen
        .patch_only(&recipe, &version, dest)
        .with_context(|| format!("Failed to patch {}/{}", recipe.package.name, version))?;

    for record in &log {
        println!(
            "  [{}] {} ({:?}, {} file(s))",
            record.index,
            record.description,
            record.outcome,
            record.files.len()
        );
    }
    println!(
        "[OK] {} patch operation(s) applied to {}",
        log.len(),
        dest.display()
    );
    Ok(())
}
