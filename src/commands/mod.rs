// src/commands/mod.rs
//! Command handlers for the galley CLI

mod cook;
mod info;
mod patch;
mod validate;
mod versions;

pub use cook::{CookArgs, cmd_cook};
pub use info::cmd_info;
pub use patch::cmd_patch;
pub use validate::cmd_validate;
pub use versions::cmd_versions;

use anyhow::{Context, Result, anyhow};
use galley::recipe::{RECIPE_FILE_NAME, parse_recipe_file};
use galley::{KitchenConfig, Recipe};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse a recipe given its file or its directory
pub(crate) fn load_recipe(path: &Path) -> Result<Recipe> {
    let file: PathBuf = if path.is_dir() {
        path.join(RECIPE_FILE_NAME)
    } else {
        path.to_path_buf()
    };
    debug!("Reading recipe: {}", file.display());
    parse_recipe_file(&file).with_context(|| format!("Failed to parse recipe: {}", file.display()))
}

/// Load the kitchen configuration from `--config` or the user config dir
pub(crate) fn load_config(path: Option<&Path>) -> Result<KitchenConfig> {
    match path {
        Some(path) => KitchenConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => KitchenConfig::load_default().context("Failed to load default config"),
    }
}

/// The requested version, or the newest one the recipe declares
pub(crate) fn pick_version(recipe: &Recipe, requested: Option<&str>) -> Result<String> {
    match requested {
        Some(version) => Ok(version.to_string()),
        None => recipe
            .latest_version()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} declares no versions", recipe.package.name)),
    }
}
