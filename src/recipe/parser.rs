// src/recipe/parser.rs

//! Recipe file parsing and validation

use crate::error::{Error, Result};
use crate::hash;
use crate::patch::PatchOperation;
use crate::recipe::format::Recipe;
use crate::recipe::options::canonical_option_name;
use crate::toolchain::is_known_cppstd;
use std::collections::HashSet;
use std::path::Path;

/// File name looked up when a recipe directory is given
pub const RECIPE_FILE_NAME: &str = "recipe.toml";

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file, or from `recipe.toml` inside a directory
///
/// Patch payloads referenced by the recipe resolve relative to the directory
/// containing the recipe file.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let file = if path.is_dir() {
        path.join(RECIPE_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    let content = std::fs::read_to_string(&file).map_err(|e| {
        Error::IoError(format!("Failed to read recipe file {}: {}", file.display(), e))
    })?;

    let mut recipe = parse_recipe(&content)?;
    recipe.recipe_dir = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(recipe)
}

/// Validate a recipe for completeness and correctness
///
/// Hard errors are returned as `Err`; softer findings come back as warnings.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    if recipe.package.name.is_empty() {
        return Err(Error::InvalidRecipe("package name cannot be empty".to_string()));
    }
    if recipe.versions.is_empty() {
        return Err(Error::InvalidRecipe(format!(
            "{} declares no versions",
            recipe.package.name
        )));
    }

    let mut option_names = HashSet::new();
    for option in &recipe.options {
        if !option_names.insert(canonical_option_name(&option.name)) {
            return Err(Error::InvalidRecipe(format!(
                "option {} declared twice",
                option.name
            )));
        }
        if option.values.is_empty() {
            return Err(Error::InvalidRecipe(format!(
                "option {} has no allowed values",
                option.name
            )));
        }
        if !option.values.contains(&option.default) {
            return Err(Error::InvalidRecipe(format!(
                "default {} of option {} is not one of [{}]",
                option.default,
                option.name,
                option.allowed_values()
            )));
        }
    }

    if let Some(standard) = recipe.validate.min_cppstd
        && !is_known_cppstd(standard)
    {
        return Err(Error::InvalidRecipe(format!("unknown C++ standard {}", standard)));
    }

    if recipe.package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if recipe.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }

    for id in recipe.version_ids() {
        // Building the version checks its requirement ranges and pins
        let version = recipe.version(id)?;

        for reference in &recipe.package_info.requires {
            version.requirements().check_reference(reference)?;
        }

        let source = version.source();
        match &source.sha256 {
            Some(digest) if !hash::is_valid_sha256(digest) => {
                return Err(Error::InvalidRecipe(format!(
                    "{}: invalid sha256 '{}'",
                    version.reference(),
                    digest
                )));
            }
            None if source.is_remote() => {
                warnings.push(format!(
                    "{}: remote source {} has no sha256; its first download will be pinned",
                    version.reference(),
                    source.url
                ));
            }
            _ => {}
        }

        if version.patches().is_empty() {
            warnings.push(format!("{}: no patches declared", version.reference()));
        }

        for op in version.patches() {
            match op {
                PatchOperation::Replace(replace) => {
                    if replace.anchor.is_empty() {
                        return Err(Error::InvalidRecipe(format!(
                            "{}: empty anchor for {}",
                            version.reference(),
                            replace.file
                        )));
                    }
                }
                PatchOperation::External(patch) => {
                    if !recipe.recipe_dir.as_os_str().is_empty()
                        && !recipe.payload_path(&patch.patch_file).is_file()
                    {
                        return Err(Error::NotFound(format!(
                            "{}: patch file {}",
                            version.reference(),
                            patch.patch_file
                        )));
                    }
                }
            }
        }
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[package]
name = "test"
description = "A test library"
license = "MIT"

[[options]]
name = "shared"
values = [true, false]
default = false

[[requires]]
name = "zlib"
version = "[>=1.2 <2]"
transitive_headers = true

[package_info]
requires = ["zlib::zlib"]

[versions."1.0"]
source = { url = "https://example.com/test-1.0.tar.gz", sha256 = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f" }

[[versions."1.0".patches]]
file = "CMakeLists.txt"
anchor = "a"
replacement = "b"
"#;

    #[test]
    fn test_parse_valid_recipe() {
        let recipe = parse_recipe(VALID).unwrap();
        assert_eq!(recipe.package.name, "test");
        assert!(validate_recipe(&recipe).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_recipe() {
        assert!(parse_recipe("this is not valid toml at all {}").is_err());
    }

    #[test]
    fn test_validate_empty_name() {
        let recipe = parse_recipe(&VALID.replace("name = \"test\"", "name = \"\"")).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_default_outside_values() {
        let content = VALID.replace("default = false", "default = \"maybe\"");
        let recipe = parse_recipe(&content).unwrap();
        let err = validate_recipe(&recipe).unwrap_err();
        assert!(err.to_string().contains("default maybe"));
    }

    #[test]
    fn test_validate_undeclared_package_info_requirement() {
        let content = VALID.replace("requires = [\"zlib::zlib\"]", "requires = [\"openssl::ssl\"]");
        let recipe = parse_recipe(&content).unwrap();
        assert!(matches!(
            validate_recipe(&recipe),
            Err(Error::UndeclaredRequirement { .. })
        ));
    }

    #[test]
    fn test_validate_bad_checksum() {
        let content = VALID.replace(
            "sha256 = \"dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f\"",
            "sha256 = \"md5:abc123\"",
        );
        let recipe = parse_recipe(&content).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_empty_anchor() {
        let recipe = parse_recipe(&VALID.replace("anchor = \"a\"", "anchor = \"\"")).unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let content = r#"
[package]
name = "test"

[versions."1.0"]
source = { url = "https://example.com/test.tar.gz" }
"#;

        let recipe = parse_recipe(content).unwrap();
        let warnings = validate_recipe(&recipe).unwrap();
        assert!(warnings.iter().any(|w| w.contains("description")));
        assert!(warnings.iter().any(|w| w.contains("license")));
        assert!(warnings.iter().any(|w| w.contains("sha256")));
        assert!(warnings.iter().any(|w| w.contains("no patches")));
    }

    #[test]
    fn test_validate_no_versions() {
        let recipe = parse_recipe("[package]\nname = \"test\"\n").unwrap();
        assert!(validate_recipe(&recipe).is_err());
    }

    #[test]
    fn test_parse_recipe_file_sets_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECIPE_FILE_NAME), VALID).unwrap();

        let recipe = parse_recipe_file(dir.path()).unwrap();
        assert_eq!(recipe.recipe_dir, dir.path());
        assert_eq!(
            recipe.payload_path("patches/x.patch"),
            dir.path().join("patches/x.patch")
        );
    }

    #[test]
    fn test_validate_missing_patch_file() {
        let dir = tempfile::tempdir().unwrap();
        let content = VALID.replace(
            "file = \"CMakeLists.txt\"\nanchor = \"a\"\nreplacement = \"b\"",
            "patch_file = \"patches/missing.patch\"",
        );
        std::fs::write(dir.path().join(RECIPE_FILE_NAME), content).unwrap();

        let recipe = parse_recipe_file(dir.path()).unwrap();
        assert!(matches!(validate_recipe(&recipe), Err(Error::NotFound(_))));
    }
}
