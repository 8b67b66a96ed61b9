// src/commands/cook.rs

//! Cook command - build packages from recipes

use anyhow::{Context, Result};
use galley::recipe::validate_recipe;
use galley::{Kitchen, OptionOverrides};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{load_config, load_recipe, pick_version};

/// Flags of `galley cook`
pub struct CookArgs {
    pub recipe: PathBuf,
    pub version: Option<String>,
    pub options: Vec<String>,
    pub output: PathBuf,
    pub jobs: Option<u32>,
    pub keep_builddir: bool,
    pub offline: bool,
    pub descriptor: Option<PathBuf>,
}

/// Cook one recipe version into a package layout
pub fn cmd_cook(args: CookArgs, config_path: Option<&Path>) -> Result<()> {
    let recipe = load_recipe(&args.recipe)?;
    let warnings = validate_recipe(&recipe).context("Recipe validation failed")?;
    for warning in &warnings {
        eprintln!("Warning: {}", warning);
    }

    let version = pick_version(&recipe, args.version.as_deref())?;
    let overrides = OptionOverrides::parse_pairs(&args.options).context("Invalid option override")?;

    let mut config = load_config(config_path)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    config.keep_builddir |= args.keep_builddir;
    config.offline |= args.offline;

    let kitchen = Kitchen::with_defaults(config).context("Failed to set up the kitchen")?;
    eprintln!(
        "Cooking {}/{} with {} parallel jobs ({})",
        recipe.package.name,
        version,
        kitchen.config().jobs,
        kitchen.toolchain_name()
    );

    let result = kitchen
        .cook(&recipe, &version, &overrides, &args.output)
        .with_context(|| format!("Failed to cook {}/{}", recipe.package.name, version))?;

    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }

    let json = result.descriptor.to_json()?;
    match &args.descriptor {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("Failed to write descriptor: {}", path.display()))?;
            info!("Wrote descriptor to {}", path.display());
        }
        None => print!("{}", json),
    }

    eprintln!("\n[COMPLETE] Package: {}", result.package_dir.display());
    eprintln!("  Patches applied: {}", result.mutation_log.len());
    eprintln!("  Files installed: {}", result.receipt.files.len());
    Ok(())
}
