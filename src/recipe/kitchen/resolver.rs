// src/recipe/kitchen/resolver.rs

//! Requirement resolution for recipe builds

use crate::error::{Error, Result};
use crate::recipe::requirements::Requirement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

/// Maps declared requirements to the install roots of built dependencies
///
/// Dependency graph resolution belongs to the package manager; the Kitchen
/// only needs to know where each requirement lives so the toolchain can find
/// it.
pub trait RequirementResolver: Send + Sync {
    /// Install root of `requirement`, or `None` when it is provided by the
    /// system
    fn resolve(&self, requirement: &Requirement) -> Result<Option<PathBuf>>;
}

/// A resolver that leaves every requirement to the system
///
/// Use this when dependencies are preinstalled where the build system looks
/// by default.
pub struct NoopResolver;

impl RequirementResolver for NoopResolver {
    fn resolve(&self, _requirement: &Requirement) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Resolves requirements from configured roots
///
/// Each root is keyed by requirement name and may carry the version installed
/// there; a versioned root must satisfy the requirement's range.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    roots: BTreeMap<String, DependencyRoot>,
}

/// An installed dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRoot {
    pub path: PathBuf,
    #[serde(default)]
    pub version: Option<String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over roots loaded from configuration
    pub fn from_roots(roots: BTreeMap<String, DependencyRoot>) -> Self {
        Self { roots }
    }

    /// Register an install root
    pub fn add(&mut self, name: &str, path: impl Into<PathBuf>, version: Option<String>) {
        self.roots.insert(
            name.to_string(),
            DependencyRoot {
                path: path.into(),
                version,
            },
        );
    }
}

impl RequirementResolver for StaticResolver {
    fn resolve(&self, requirement: &Requirement) -> Result<Option<PathBuf>> {
        let Some(root) = self.roots.get(&requirement.name) else {
            debug!("No root configured for {}, relying on the system", requirement.name);
            return Ok(None);
        };

        if let Some(version) = &root.version
            && !requirement.range.matches(version)
        {
            return Err(Error::UnsupportedConfiguration(format!(
                "{} {} at {} does not satisfy {}",
                requirement.name,
                version,
                root.path.display(),
                requirement.range
            )));
        }

        Ok(Some(root.path.clone()))
    }
}

/// Resolve every requirement, keeping only those with an explicit root
pub fn resolve_all<'a>(
    resolver: &dyn RequirementResolver,
    requirements: impl Iterator<Item = &'a Requirement>,
) -> Result<BTreeMap<String, PathBuf>> {
    let mut paths = BTreeMap::new();
    for requirement in requirements {
        if let Some(path) = resolver.resolve(requirement)? {
            debug!("{} resolved to {}", requirement.name, path.display());
            paths.insert(requirement.name.clone(), path);
        }
    }
    Ok(paths)
}
