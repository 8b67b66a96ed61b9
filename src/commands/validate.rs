// src/commands/validate.rs

//! Validate command - check a recipe without building

use anyhow::{Context, Result};
use galley::recipe::validate_recipe;
use std::path::Path;

use super::load_recipe;

pub fn cmd_validate(recipe_path: &Path) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let warnings = validate_recipe(&recipe).context("Recipe validation failed")?;

    for warning in &warnings {
        println!("Warning: {}", warning);
    }

    println!("Recipe validation passed");
    if warnings.is_empty() {
        println!("[OK] No issues found");
    } else {
        println!("[OK] {} warning(s)", warnings.len());
    }
    Ok(())
}
