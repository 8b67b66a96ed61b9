// src/recipe/requirements.rs

//! Requirement set modelling
//!
//! Version expressions follow the package-index convention: a bracketed range
//! such as `[>=1.83 <1.91]`, or a bare exact pin such as `1.81.0`. Both are
//! translated to a [`semver::VersionReq`]; partial versions are padded with
//! zeroes.

use crate::error::{Error, Result};
use crate::recipe::format::{RequirementDecl, ToolRequirementDecl};
use semver::{Comparator, Op, Version, VersionReq};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Parse a version leniently: `1.83` becomes `1.83.0`
///
/// Returns `None` for identifiers that are not dotted numbers.
pub fn parse_lenient(raw: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(raw) {
        return Some(v);
    }

    let parts: Vec<&str> = raw.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// A parsed version range with its lowest admitted version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    req: VersionReq,
    minimum: Version,
}

impl VersionRange {
    /// Parse a range (`[>=1.83 <1.91]`) or an exact pin (`1.81.0`)
    ///
    /// Fails when the expression cannot be parsed or when the range does not
    /// admit its own declared minimum.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        let comparators = match trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
        {
            Some(inner) => parse_range_body(expr, inner)?,
            None => vec![format!("={}", trimmed)],
        };

        if comparators.is_empty() {
            return Err(Error::InvalidRecipe(format!("empty version range '{}'", expr)));
        }

        let req = VersionReq::parse(&comparators.join(", ")).map_err(|e| {
            Error::InvalidRecipe(format!("invalid version range '{}': {}", expr, e))
        })?;

        let minimum = req
            .comparators
            .iter()
            .filter_map(lower_bound)
            .max()
            .unwrap_or_else(|| Version::new(0, 0, 0));

        if !req.matches(&minimum) {
            return Err(Error::InvalidRecipe(format!(
                "version range '{}' is not satisfiable by its minimum {}",
                expr, minimum
            )));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            req,
            minimum,
        })
    }

    /// Lowest version the range admits
    pub fn minimum(&self) -> &Version {
        &self.minimum
    }

    /// Whether the expression was an exact pin
    pub fn is_pin(&self) -> bool {
        !self.raw.starts_with('[')
    }

    /// Whether a concrete version satisfies the range
    pub fn matches(&self, version: &str) -> bool {
        parse_lenient(version).is_some_and(|v| self.req.matches(&v))
    }

    /// The expression as written in the recipe
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn parse_range_body(expr: &str, body: &str) -> Result<Vec<String>> {
    if body.contains("||") {
        return Err(Error::InvalidRecipe(format!(
            "alternative ranges are not supported: '{}'",
            expr
        )));
    }

    body.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let op_len = token
                .find(|c: char| c.is_ascii_digit())
                .ok_or_else(|| {
                    Error::InvalidRecipe(format!("invalid comparator '{}' in '{}'", token, expr))
                })?;
            let (op, version) = token.split_at(op_len);
            let op = match op {
                "" => "=",
                ">=" | "<=" | ">" | "<" | "=" | "~" | "^" => op,
                other => {
                    return Err(Error::InvalidRecipe(format!(
                        "unsupported operator '{}' in '{}'",
                        other, expr
                    )));
                }
            };
            Ok(format!("{}{}", op, version))
        })
        .collect()
}

/// Lowest version a single comparator admits, if it bounds from below
fn lower_bound(c: &Comparator) -> Option<Version> {
    let minor = c.minor.unwrap_or(0);
    let patch = c.patch.unwrap_or(0);
    match c.op {
        Op::Exact | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
            let mut v = Version::new(c.major, minor, patch);
            v.pre = c.pre.clone();
            Some(v)
        }
        Op::Greater => Some(match (c.minor, c.patch) {
            (Some(minor), Some(patch)) => Version::new(c.major, minor, patch + 1),
            (Some(minor), None) => Version::new(c.major, minor + 1, 0),
            _ => Version::new(c.major + 1, 0, 0),
        }),
        _ => None,
    }
}

/// A dependency on another package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub range: VersionRange,
    pub transitive_headers: bool,
    pub transitive_libs: bool,
    pub components: Vec<String>,
    pub cmake_file_name: Option<String>,
}

impl Requirement {
    fn from_decl(decl: &RequirementDecl, pin: Option<&str>) -> Result<Self> {
        let expr = pin.unwrap_or(&decl.version);
        let range = VersionRange::parse(expr).map_err(|e| {
            Error::InvalidRecipe(format!("requirement {}: {}", decl.name, e))
        })?;

        Ok(Self {
            name: decl.name.clone(),
            range,
            transitive_headers: decl.transitive_headers,
            transitive_libs: decl.transitive_libs,
            components: decl.components.clone(),
            cmake_file_name: decl.cmake_file_name.clone(),
        })
    }

    /// Whether consumers of our package see this requirement
    pub fn propagates(&self) -> bool {
        self.transitive_headers || self.transitive_libs
    }

    /// Component-level names consumers link against (`dep::component`)
    pub fn component_refs(&self) -> Vec<String> {
        if self.components.is_empty() {
            vec![format!("{0}::{0}", self.name)]
        } else {
            self.components
                .iter()
                .map(|c| format!("{}::{}", self.name, c))
                .collect()
        }
    }

    /// Name the build system uses to locate this requirement
    pub fn file_name(&self) -> &str {
        self.cmake_file_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether `dep` or `dep::component` refers to this requirement
    pub fn declares(&self, reference: &str) -> bool {
        match reference.split_once("::") {
            Some((dep, component)) => {
                dep == self.name
                    && ((self.components.is_empty() && component == self.name)
                        || self.components.iter().any(|c| c == component))
            }
            None => reference == self.name,
        }
    }
}

/// A build-only tool requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRequirement {
    pub name: String,
    pub range: VersionRange,
}

/// All requirements of one recipe version, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementSet {
    requires: Vec<Requirement>,
    tool_requires: Vec<ToolRequirement>,
}

impl RequirementSet {
    /// Build the set for one version
    ///
    /// `pins` replace the recipe-wide range of the named requirement; a pin
    /// for an undeclared requirement is an error.
    pub fn from_decls(
        requires: &[RequirementDecl],
        tool_requires: &[ToolRequirementDecl],
        pins: &BTreeMap<String, String>,
    ) -> Result<Self> {
        for name in pins.keys() {
            if !requires.iter().any(|r| &r.name == name) {
                return Err(Error::UndeclaredRequirement {
                    reference: name.clone(),
                });
            }
        }

        let mut set = Self::default();
        for decl in requires {
            if set.get(&decl.name).is_some() {
                return Err(Error::InvalidRecipe(format!(
                    "requirement {} declared twice",
                    decl.name
                )));
            }
            let pin = pins.get(&decl.name).map(|s| s.as_str());
            set.requires.push(Requirement::from_decl(decl, pin)?);
        }

        for decl in tool_requires {
            let range = VersionRange::parse(&decl.version).map_err(|e| {
                Error::InvalidRecipe(format!("tool requirement {}: {}", decl.name, e))
            })?;
            set.tool_requires.push(ToolRequirement {
                name: decl.name.clone(),
                range,
            });
        }

        Ok(set)
    }

    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.requires.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.requires.iter()
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolRequirement> {
        self.tool_requires.iter()
    }

    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    /// Check that `dep` or `dep::component` names a declared requirement
    pub fn check_reference(&self, reference: &str) -> Result<()> {
        if self.requires.iter().any(|r| r.declares(reference)) {
            Ok(())
        } else {
            Err(Error::UndeclaredRequirement {
                reference: reference.to_string(),
            })
        }
    }

    /// Component references of every requirement visible to consumers
    pub fn consumer_refs(&self) -> Vec<String> {
        self.requires
            .iter()
            .filter(|r| r.propagates())
            .flat_map(|r| r.component_refs())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boost(version: &str) -> RequirementDecl {
        RequirementDecl {
            name: "boost".to_string(),
            version: version.to_string(),
            transitive_headers: true,
            transitive_libs: true,
            components: vec!["system".into(), "thread".into(), "chrono".into()],
            cmake_file_name: Some("Boost".to_string()),
        }
    }

    #[test]
    fn test_parse_bracketed_range() {
        let range = VersionRange::parse("[>=1.83 <1.91]").unwrap();
        assert_eq!(range.minimum(), &Version::new(1, 83, 0));
        assert!(range.matches("1.83.0"));
        assert!(range.matches("1.90"));
        assert!(!range.matches("1.91.0"));
        assert!(!range.matches("1.82.0"));
        assert!(!range.is_pin());
    }

    #[test]
    fn test_parse_exact_pin() {
        let range = VersionRange::parse("1.81.0").unwrap();
        assert!(range.is_pin());
        assert!(range.matches("1.81.0"));
        assert!(!range.matches("1.81.1"));
        assert_eq!(range.minimum(), &Version::new(1, 81, 0));
    }

    #[test]
    fn test_unsatisfiable_range() {
        let err = VersionRange::parse("[>=1.91 <1.83]").unwrap_err();
        assert!(err.to_string().contains("not satisfiable"));
    }

    #[test]
    fn test_strict_greater_minimum() {
        let range = VersionRange::parse("[>3.15 <4]").unwrap();
        assert_eq!(range.minimum(), &Version::new(3, 16, 0));
    }

    #[test]
    fn test_rejects_alternatives_and_garbage() {
        assert!(VersionRange::parse("[>=1 || <0.5]").is_err());
        assert!(VersionRange::parse("[>=abc]").is_err());
        assert!(VersionRange::parse("[]").is_err());
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(parse_lenient("1.83"), Some(Version::new(1, 83, 0)));
        assert_eq!(parse_lenient("2"), Some(Version::new(2, 0, 0)));
        assert_eq!(parse_lenient("1.2.3.4"), None);
        assert_eq!(parse_lenient("cci.20230101"), None);
    }

    #[test]
    fn test_pin_overrides_range() {
        let mut pins = BTreeMap::new();
        pins.insert("boost".to_string(), "1.81.0".to_string());
        let set = RequirementSet::from_decls(&[boost("[>=1.83 <1.91]")], &[], &pins).unwrap();
        let req = set.get("boost").unwrap();
        assert!(req.range.is_pin());
        assert!(req.range.matches("1.81.0"));
    }

    #[test]
    fn test_pin_for_undeclared_requirement() {
        let mut pins = BTreeMap::new();
        pins.insert("openssl".to_string(), "3.0.0".to_string());
        let err = RequirementSet::from_decls(&[boost("[>=1.83 <1.91]")], &[], &pins).unwrap_err();
        assert!(matches!(err, Error::UndeclaredRequirement { .. }));
    }

    #[test]
    fn test_component_references() {
        let set =
            RequirementSet::from_decls(&[boost("[>=1.83 <1.91]")], &[], &BTreeMap::new()).unwrap();
        assert_eq!(
            set.consumer_refs(),
            vec!["boost::system", "boost::thread", "boost::chrono"]
        );
        assert!(set.check_reference("boost::thread").is_ok());
        assert!(set.check_reference("boost").is_ok());
        assert!(set.check_reference("boost::filesystem").is_err());
        assert!(set.check_reference("fmt::fmt").is_err());
    }

    #[test]
    fn test_private_requirement_not_propagated() {
        let mut decl = boost("[>=1.83 <1.91]");
        decl.transitive_headers = false;
        decl.transitive_libs = false;
        let set = RequirementSet::from_decls(&[decl], &[], &BTreeMap::new()).unwrap();
        assert!(set.consumer_refs().is_empty());
    }

    #[test]
    fn test_duplicate_requirement() {
        let err = RequirementSet::from_decls(
            &[boost("[>=1.83 <1.91]"), boost("1.81.0")],
            &[],
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRecipe(_)));
    }
}
