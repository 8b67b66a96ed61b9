// src/patch/mod.rs

//! Patch operation engine
//!
//! Recipes adapt upstream sources with two kinds of operation:
//!
//! - **Replace**: exact-substring substitution in one file. The anchor must
//!   occur exactly once; there is no fuzzy or partial matching, so upstream
//!   drift always surfaces as [`Error::PatchAnchorNotFound`].
//! - **External**: a unified diff stored next to the recipe, applied with a
//!   strip level and without fuzz.
//!
//! Operations run strictly in declaration order, since later operations may
//! depend on text introduced by earlier ones. Each operation is atomic: its
//! changes are computed in memory and written only once it has fully
//! succeeded. There is no rollback across operations; a failed sequence leaves
//! the tree inconsistent and it must be rebuilt from a clean fetch.

mod replace;
mod tree;
mod unified;

pub use replace::{count_occurrences, replace_exactly_once};
pub use tree::SourceTree;
pub use unified::{FileSegment, apply_unified, split_segments, strip_path};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One text transformation declared by a recipe version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchOperation {
    Replace(ReplaceText),
    External(ExternalPatch),
}

impl PatchOperation {
    /// Human-readable label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Replace(op) => op
                .description
                .clone()
                .unwrap_or_else(|| format!("replace text in {}", op.file)),
            Self::External(op) => op
                .description
                .clone()
                .unwrap_or_else(|| format!("apply {}", op.patch_file)),
        }
    }

    pub fn strategy(&self) -> PatchStrategy {
        match self {
            Self::Replace(_) => PatchStrategy::Replace,
            Self::External(_) => PatchStrategy::External,
        }
    }
}

/// Exact-substring replacement in one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceText {
    /// Tree-relative path of the file to edit
    pub file: String,
    /// Text that must occur exactly once, whitespace included
    pub anchor: String,
    /// Text substituted for the anchor
    pub replacement: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Unified diff stored as a recipe payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalPatch {
    /// Recipe-relative path of the patch file
    pub patch_file: String,
    /// Leading path components removed from the diff headers
    #[serde(default = "default_strip")]
    pub strip: usize,
    /// Tree-relative directory the patch paths are relative to
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form classification (`portability`, `conan`, `bugfix`, ...)
    #[serde(default)]
    pub patch_type: Option<String>,
}

fn default_strip() -> usize {
    1
}

/// Which kind of operation produced a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStrategy {
    Replace,
    External,
}

/// Typed result of one successfully applied operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOutcome {
    /// File content changed
    Applied,
    /// The operation matched but produced identical content
    Unchanged,
}

/// Mutation log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRecord {
    /// Position of the operation in the version's patch list
    pub index: usize,
    pub strategy: PatchStrategy,
    pub outcome: PatchOutcome,
    pub description: String,
    /// Tree-relative files the operation touched
    pub files: Vec<PathBuf>,
}

/// Applies patch operations to a source tree
///
/// External patch files resolve against `payload_root`, the directory the
/// export phase staged recipe payloads into.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    payload_root: PathBuf,
}

impl PatchEngine {
    pub fn new(payload_root: impl Into<PathBuf>) -> Self {
        Self {
            payload_root: payload_root.into(),
        }
    }

    pub fn payload_root(&self) -> &Path {
        &self.payload_root
    }

    /// Apply one operation, appending to the tree's mutation log on success
    pub fn apply(
        &self,
        tree: &mut SourceTree,
        index: usize,
        op: &PatchOperation,
    ) -> Result<PatchOutcome> {
        debug!("Patch {}: {}", index, op.describe());

        let (outcome, files) = match op {
            PatchOperation::Replace(replace) => self.apply_replace(tree, replace)?,
            PatchOperation::External(patch) => self.apply_external(tree, patch)?,
        };

        tree.record(MutationRecord {
            index,
            strategy: op.strategy(),
            outcome,
            description: op.describe(),
            files,
        });
        Ok(outcome)
    }

    /// Apply every operation in order, stopping at the first failure
    pub fn apply_all(
        &self,
        tree: &mut SourceTree,
        ops: &[PatchOperation],
    ) -> Result<Vec<PatchOutcome>> {
        let mut outcomes = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            outcomes.push(self.apply(tree, index, op)?);
        }

        info!(
            "Applied {} patch operation(s) to {}",
            outcomes.len(),
            tree.root().display()
        );
        Ok(outcomes)
    }

    fn apply_replace(
        &self,
        tree: &SourceTree,
        op: &ReplaceText,
    ) -> Result<(PatchOutcome, Vec<PathBuf>)> {
        let file = PathBuf::from(&op.file);
        let content = tree.read_bytes(&file)?;
        let patched = replace_exactly_once(&file, &content, &op.anchor, &op.replacement)?;

        if patched == content {
            return Ok((PatchOutcome::Unchanged, vec![file]));
        }
        tree.write_bytes(&file, &patched)?;
        Ok((PatchOutcome::Applied, vec![file]))
    }

    fn apply_external(
        &self,
        tree: &SourceTree,
        op: &ExternalPatch,
    ) -> Result<(PatchOutcome, Vec<PathBuf>)> {
        let patch_path = self.payload_root.join(&op.patch_file);
        let text = fs::read_to_string(&patch_path).map_err(|e| Error::PatchApplyFailed {
            patch: patch_path.clone(),
            file: PathBuf::new(),
            reason: format!("cannot read patch file: {}", e),
        })?;

        let before = snapshot(tree, &text, op);
        let files = apply_unified(tree, &patch_path, &text, op.strip, op.base_path.as_deref())?;
        let after: Vec<Option<Vec<u8>>> = files
            .iter()
            .map(|f| tree.read_bytes(f).ok())
            .collect();

        let outcome = if before.is_some_and(|b| b == after) {
            PatchOutcome::Unchanged
        } else {
            PatchOutcome::Applied
        };
        Ok((outcome, files))
    }
}

/// Content of the files a patch will touch, in touch order
///
/// `None` when the patch creates, deletes or renames files, in which case the
/// outcome is always [`PatchOutcome::Applied`].
fn snapshot(
    tree: &SourceTree,
    text: &str,
    op: &ExternalPatch,
) -> Option<Vec<Option<Vec<u8>>>> {
    // Parse errors are reported with full context by apply_unified
    let segments = split_segments(text).ok()?;

    let mut contents = Vec::new();
    for segment in &segments {
        let old = strip_path(segment.old_path.as_deref()?, op.strip)?;
        let new = strip_path(segment.new_path.as_deref()?, op.strip)?;
        if old != new {
            return None;
        }
        let path = match &op.base_path {
            Some(base) => Path::new(base).join(new),
            None => new,
        };
        contents.push(tree.read_bytes(&path).ok());
    }
    Some(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CMAKE: &str = "project(Disruptor)\ncmake_minimum_required(VERSION 2.6)\n\nadd_subdirectory(Disruptor)\n";

    fn reorder() -> PatchOperation {
        PatchOperation::Replace(ReplaceText {
            file: "CMakeLists.txt".to_string(),
            anchor: "project(Disruptor)\ncmake_minimum_required(VERSION 2.6)".to_string(),
            replacement: "cmake_minimum_required(VERSION 2.6)\nproject(Disruptor)".to_string(),
            description: None,
        })
    }

    fn setup() -> (TempDir, SourceTree) {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::open(dir.path()).unwrap();
        tree.write_text("CMakeLists.txt", CMAKE).unwrap();
        (dir, tree)
    }

    #[test]
    fn test_replace_logs_mutation() {
        let (_dir, mut tree) = setup();
        let engine = PatchEngine::new("/nonexistent");

        let outcome = engine.apply(&mut tree, 0, &reorder()).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(tree.mutation_log().len(), 1);
        assert_eq!(tree.mutation_log()[0].files, vec![PathBuf::from("CMakeLists.txt")]);
        assert!(tree
            .read_text("CMakeLists.txt")
            .unwrap()
            .starts_with("cmake_minimum_required"));
    }

    #[test]
    fn test_second_application_fails() {
        let (_dir, mut tree) = setup();
        let engine = PatchEngine::new("/nonexistent");

        let err = engine.apply_all(&mut tree, &[reorder(), reorder()]).unwrap_err();
        assert!(matches!(err, Error::PatchAnchorNotFound { .. }));
        // Only the first operation succeeded
        assert_eq!(tree.mutation_log().len(), 1);
    }

    #[test]
    fn test_identical_replacement_is_unchanged() {
        let (_dir, mut tree) = setup();
        let engine = PatchEngine::new("/nonexistent");
        let op = PatchOperation::Replace(ReplaceText {
            file: "CMakeLists.txt".to_string(),
            anchor: "add_subdirectory(Disruptor)".to_string(),
            replacement: "add_subdirectory(Disruptor)".to_string(),
            description: Some("noop".to_string()),
        });

        assert_eq!(engine.apply(&mut tree, 0, &op).unwrap(), PatchOutcome::Unchanged);
        assert_eq!(tree.mutation_log()[0].description, "noop");
        assert_eq!(tree.read_text("CMakeLists.txt").unwrap(), CMAKE);
    }

    #[test]
    fn test_later_operation_sees_earlier_text() {
        let (_dir, mut tree) = setup();
        let engine = PatchEngine::new("/nonexistent");
        let follow_up = PatchOperation::Replace(ReplaceText {
            file: "CMakeLists.txt".to_string(),
            anchor: "project(Disruptor)\n\n".to_string(),
            replacement: "project(Disruptor)\nset(CMAKE_CXX_STANDARD 14)\n\n".to_string(),
            description: None,
        });

        engine.apply_all(&mut tree, &[reorder(), follow_up]).unwrap();
        assert_eq!(
            tree.read_text("CMakeLists.txt").unwrap(),
            "cmake_minimum_required(VERSION 2.6)\nproject(Disruptor)\nset(CMAKE_CXX_STANDARD 14)\n\nadd_subdirectory(Disruptor)\n"
        );
        assert_eq!(tree.mutation_log().len(), 2);
    }

    #[test]
    fn test_external_patch() {
        let (_dir, mut tree) = setup();
        let payloads = TempDir::new().unwrap();
        fs::create_dir_all(payloads.path().join("patches")).unwrap();
        fs::write(
            payloads.path().join("patches/fix.patch"),
            "--- a/CMakeLists.txt\n+++ b/CMakeLists.txt\n@@ -1,2 +1,2 @@\n-project(Disruptor)\n cmake_minimum_required(VERSION 2.6)\n+project(Disruptor)\n",
        )
        .unwrap();

        let engine = PatchEngine::new(payloads.path());
        let op = PatchOperation::External(ExternalPatch {
            patch_file: "patches/fix.patch".to_string(),
            strip: 1,
            base_path: None,
            description: None,
            patch_type: Some("portability".to_string()),
        });

        assert_eq!(engine.apply(&mut tree, 0, &op).unwrap(), PatchOutcome::Applied);
        assert_eq!(tree.mutation_log()[0].strategy, PatchStrategy::External);
        assert!(tree
            .read_text("CMakeLists.txt")
            .unwrap()
            .starts_with("cmake_minimum_required"));
    }

    #[test]
    fn test_non_utf8_target() {
        let dir = TempDir::new().unwrap();
        let mut tree = SourceTree::open(dir.path()).unwrap();
        tree.write_bytes("a.cpp", b"// caf\xe9\nint main();\n").unwrap();
        let engine = PatchEngine::new("/nonexistent");

        let op = PatchOperation::Replace(ReplaceText {
            file: "a.cpp".to_string(),
            anchor: "int main();".to_string(),
            replacement: "int main(int, char**);".to_string(),
            description: None,
        });
        assert_eq!(engine.apply(&mut tree, 0, &op).unwrap(), PatchOutcome::Applied);
        assert_eq!(
            tree.read_bytes("a.cpp").unwrap(),
            b"// caf\xe9\nint main(int, char**);\n"
        );

        // A missing anchor in a Latin-1 file is drift, not an I/O failure
        let err = engine.apply(&mut tree, 1, &op).unwrap_err();
        assert!(err.is_source_drift());
        assert!(matches!(err, Error::PatchAnchorNotFound { .. }));
    }

    #[test]
    fn test_missing_patch_file() {
        let (_dir, mut tree) = setup();
        let engine = PatchEngine::new("/nonexistent");
        let op = PatchOperation::External(ExternalPatch {
            patch_file: "missing.patch".to_string(),
            strip: 1,
            base_path: None,
            description: None,
            patch_type: None,
        });
        assert!(matches!(
            engine.apply(&mut tree, 0, &op),
            Err(Error::PatchApplyFailed { .. })
        ));
        assert!(tree.mutation_log().is_empty());
    }

    #[test]
    fn test_operation_shapes_deserialize() {
        let replace: PatchOperation =
            toml::from_str("file = \"a\"\nanchor = \"b\"\nreplacement = \"c\"").unwrap();
        assert_eq!(replace.strategy(), PatchStrategy::Replace);

        let external: PatchOperation = toml::from_str("patch_file = \"p.patch\"").unwrap();
        match external {
            PatchOperation::External(p) => assert_eq!(p.strip, 1),
            other => panic!("unexpected operation: {other:?}"),
        }

        assert!(toml::from_str::<PatchOperation>("file = \"a\"\nanchor = \"b\"").is_err());
    }
}
