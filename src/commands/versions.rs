// src/commands/versions.rs

//! Versions command - list declared versions

use anyhow::Result;
use galley::PatchOperation;
use std::path::Path;

use super::load_recipe;

/// List every version with its patch strategy and requirement pins
pub fn cmd_versions(recipe_path: &Path) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    println!("{}:", recipe.package.name);

    for id in recipe.version_ids() {
        let version = recipe.version(id)?;
        let replaces = version
            .patches()
            .iter()
            .filter(|p| matches!(p, PatchOperation::Replace(_)))
            .count();
        let external = version.patches().len() - replaces;

        let pins: Vec<String> = version
            .requirements()
            .iter()
            .filter(|r| r.range.is_pin())
            .map(|r| format!("{}={}", r.name, r.range))
            .collect();

        print!(
            "  {:<12} {} replace, {} patch file(s)",
            id, replaces, external
        );
        if !pins.is_empty() {
            print!("  pins: {}", pins.join(", "));
        }
        println!();
    }
    Ok(())
}
