// src/recipe/options.rs

//! Option set resolution
//!
//! Consumers may override any declared option; everything else takes the
//! declared default. Derivation rules then drop options that are meaningless
//! for the resolved combination (PIC for shared builds, PIC on Windows).

use crate::error::{Error, Result};
use crate::recipe::format::{OptionDecl, PackageKind, Recipe};
use crate::toolchain::{Os, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use tracing::debug;

/// Option selecting a dynamic vs. static artifact
pub const SHARED: &str = "shared";

/// Option forwarding position-independent code to static builds
pub const PIC: &str = "position_independent_code";

/// Conventional spelling of [`PIC`] accepted in recipes and overrides
pub const PIC_ALIAS: &str = "fPIC";

/// Derivation rule dropping PIC where it has no effect
pub const AUTO_SHARED_FPIC: &str = "auto_shared_fpic";

/// Map accepted spellings onto the canonical option name
pub fn canonical_option_name(name: &str) -> &str {
    if name == PIC_ALIAS { PIC } else { name }
}

/// Value of a build option
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
}

impl OptionValue {
    /// The boolean value, if this is a boolean option
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl OptionDecl {
    /// Canonical name of this option
    pub fn canonical_name(&self) -> &str {
        canonical_option_name(&self.name)
    }

    /// Parse a textual override against the declared values
    pub fn parse_value(&self, raw: &str) -> Result<OptionValue> {
        let candidate = match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" if self.is_boolean() => OptionValue::Bool(true),
            "false" | "no" | "off" | "0" if self.is_boolean() => OptionValue::Bool(false),
            _ => OptionValue::Str(raw.to_string()),
        };

        if self.values.contains(&candidate) {
            Ok(candidate)
        } else {
            Err(Error::InvalidOption(format!(
                "{}={} is not one of [{}]",
                self.name,
                raw,
                self.allowed_values()
            )))
        }
    }

    /// Whether every allowed value is a boolean
    pub fn is_boolean(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| v.as_bool().is_some())
    }

    /// Allowed values joined for messages
    pub fn allowed_values(&self) -> String {
        self.values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Consumer-supplied option values, keyed by canonical name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    values: BTreeMap<String, String>,
}

impl OptionOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one override
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .insert(canonical_option_name(name).to_string(), value.into());
    }

    /// Parse `name=value` pairs as given on the command line
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut overrides = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidOption(format!("expected name=value, got '{}'", pair))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidOption(format!("missing option name in '{}'", pair)));
            }
            overrides.set(name, value.trim());
        }
        Ok(overrides)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(canonical_option_name(name)).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }
}

/// Linkage of the produced library
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Linkage {
    Shared,
    Static,
}

/// Option values after defaults, overrides and derivation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOptions {
    values: BTreeMap<String, OptionValue>,
    linkage: Linkage,
}

impl ResolvedOptions {
    /// Value of an option, if it survived derivation
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(canonical_option_name(name))
    }

    /// Whether a shared artifact is produced
    pub fn shared(&self) -> bool {
        self.linkage == Linkage::Shared
    }

    /// Position-independent code flag, when meaningful
    pub fn pic(&self) -> Option<bool> {
        self.get(PIC).and_then(OptionValue::as_bool)
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Owned copy of the name → value map
    pub fn to_map(&self) -> BTreeMap<String, OptionValue> {
        self.values.clone()
    }
}

/// Resolve a recipe's options for one build invocation
pub fn resolve_options(
    recipe: &Recipe,
    overrides: &OptionOverrides,
    settings: &Settings,
) -> Result<ResolvedOptions> {
    let mut values = BTreeMap::new();

    for name in overrides.names() {
        if !recipe.options.iter().any(|o| o.canonical_name() == name) {
            return Err(Error::InvalidOption(format!(
                "{} does not declare option '{}'",
                recipe.package.name, name
            )));
        }
    }

    for decl in &recipe.options {
        let value = match overrides.get(decl.canonical_name()) {
            Some(raw) => decl.parse_value(raw)?,
            None => decl.default.clone(),
        };
        values.insert(decl.canonical_name().to_string(), value);
    }

    let shared = values
        .get(SHARED)
        .and_then(OptionValue::as_bool)
        .unwrap_or(recipe.package.kind == PackageKind::SharedLibrary);
    let linkage = if shared { Linkage::Shared } else { Linkage::Static };

    if recipe.implements(AUTO_SHARED_FPIC) {
        if settings.os == Os::Windows && values.remove(PIC).is_some() {
            debug!("Dropping {} on Windows", PIC);
        }
        if shared && values.remove(PIC).is_some() {
            debug!("Dropping {} for shared build", PIC);
        }
    }

    Ok(ResolvedOptions { values, linkage })
}

impl FromStr for OptionOverrides {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pairs: Vec<&str> = s.split(',').filter(|p| !p.trim().is_empty()).collect();
        Self::parse_pairs(&pairs)
    }
}
