// src/commands/info.rs

//! Info command - print the artifact descriptor of a version

use anyhow::{Context, Result};
use galley::recipe::resolve_options;
use galley::{OptionOverrides, publish};
use std::path::Path;

use super::{load_config, load_recipe, pick_version};

/// Print the descriptor a cook would publish, without building
pub fn cmd_info(
    recipe_path: &Path,
    version: Option<&str>,
    options: &[String],
    config_path: Option<&Path>,
) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let version_id = pick_version(&recipe, version)?;
    let version = recipe.version(&version_id)?;

    let config = load_config(config_path)?;
    let overrides = OptionOverrides::parse_pairs(options).context("Invalid option override")?;
    let resolved = resolve_options(&recipe, &overrides, &config.settings)?;

    let descriptor = publish(&recipe, &version, &resolved)
        .with_context(|| format!("Failed to describe {}", version.reference()))?;
    print!("{}", descriptor.to_json()?);
    Ok(())
}
