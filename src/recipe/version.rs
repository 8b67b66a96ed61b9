// src/recipe/version.rs

//! One packageable revision of an upstream library

use crate::patch::PatchOperation;
use crate::recipe::format::SourceLocator;
use crate::recipe::requirements::RequirementSet;

/// Value object carrying everything that varies between versions
///
/// Built from the recipe's version table and never mutated afterwards. The
/// lifecycle treats the patch list and requirement pins held here as the sole
/// source of truth for this version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeVersion {
    package: String,
    version: String,
    source: SourceLocator,
    patches: Vec<PatchOperation>,
    requirements: RequirementSet,
}

impl RecipeVersion {
    pub(crate) fn new(
        package: &str,
        version: &str,
        source: SourceLocator,
        patches: Vec<PatchOperation>,
        requirements: RequirementSet,
    ) -> Self {
        Self {
            package: package.to_string(),
            version: version.to_string(),
            source,
            patches,
            requirements,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source(&self) -> &SourceLocator {
        &self.source
    }

    /// Patch operations in declaration order
    pub fn patches(&self) -> &[PatchOperation] {
        &self.patches
    }

    pub fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    /// `name/version` reference used in logs
    pub fn reference(&self) -> String {
        format!("{}/{}", self.package, self.version)
    }
}
