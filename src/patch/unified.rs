// src/patch/unified.rs

//! Unified diff application
//!
//! A patch file may touch several files. It is split into one segment per
//! `---`/`+++` header pair, each segment is applied with `diffy`, and nothing
//! is written until every segment has applied cleanly in memory.

use crate::error::{Error, Result};
use crate::patch::tree::SourceTree;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const DEV_NULL: &str = "/dev/null";

/// The part of a patch file that concerns one target file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSegment {
    /// Path from the `---` header, `None` for `/dev/null`
    pub old_path: Option<String>,
    /// Path from the `+++` header, `None` for `/dev/null`
    pub new_path: Option<String>,
    hunks: String,
}

impl FileSegment {
    /// Segment text with neutral headers, as handed to `diffy`
    fn diff_text(&self) -> String {
        format!("--- original\n+++ modified\n{}", self.hunks)
    }
}

/// Split a unified diff into per-file segments
///
/// Preamble lines (`diff --git`, `index`, free text) are skipped. Hunk bodies
/// are consumed by their declared line counts so removed lines that look like
/// headers are not mistaken for a new file.
pub fn split_segments(text: &str) -> std::result::Result<Vec<FileSegment>, String> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let is_header = line.starts_with("--- ")
            && lines.get(i + 1).is_some_and(|next| next.starts_with("+++ "));
        if !is_header {
            i += 1;
            continue;
        }

        let old_path = header_path(&line[4..]);
        let new_path = header_path(&lines[i + 1][4..]);
        i += 2;

        let mut hunks = String::new();
        while i < lines.len() && lines[i].starts_with("@@") {
            let (mut old_left, mut new_left) = hunk_counts(lines[i])?;
            hunks.push_str(lines[i]);
            i += 1;

            while i < lines.len() && (old_left > 0 || new_left > 0) {
                let body = lines[i];
                match body.as_bytes().first() {
                    Some(b' ') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                    }
                    // Some tools drop the leading space on empty context lines
                    Some(b'\n') | Some(b'\r') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        hunks.push(' ');
                    }
                    Some(b'-') => old_left = old_left.saturating_sub(1),
                    Some(b'+') => new_left = new_left.saturating_sub(1),
                    Some(b'\\') => {}
                    _ => return Err(format!("malformed hunk line: {}", body.trim_end())),
                }
                hunks.push_str(body);
                i += 1;
            }

            if old_left > 0 || new_left > 0 {
                return Err("hunk ends before its declared line count".to_string());
            }
            // Trailing "no newline" marker belongs to the last hunk line
            while i < lines.len() && lines[i].starts_with('\\') {
                hunks.push_str(lines[i]);
                i += 1;
            }
        }

        if hunks.is_empty() {
            return Err(format!(
                "no hunks for {}",
                new_path.as_deref().or(old_path.as_deref()).unwrap_or(DEV_NULL)
            ));
        }
        if !hunks.ends_with('\n') {
            hunks.push('\n');
        }

        segments.push(FileSegment {
            old_path,
            new_path,
            hunks,
        });
    }

    Ok(segments)
}

/// Path named by a `---`/`+++` header, with any timestamp removed
fn header_path(rest: &str) -> Option<String> {
    let path = rest.split('\t').next().unwrap_or(rest).trim_end();
    let path = path.trim_matches('"');
    if path == DEV_NULL { None } else { Some(path.to_string()) }
}

/// Old and new line counts from a `@@ -a,b +c,d @@` header
fn hunk_counts(header: &str) -> std::result::Result<(usize, usize), String> {
    let malformed = || format!("malformed hunk header: {}", header.trim_end());
    let mut ranges = header
        .trim_start_matches('@')
        .split_whitespace()
        .take_while(|part| !part.starts_with('@'));

    let old = ranges
        .next()
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let new = ranges
        .next()
        .and_then(|r| r.strip_prefix('+'))
        .ok_or_else(malformed)?;

    let count = |range: &str| -> std::result::Result<usize, String> {
        match range.split_once(',') {
            Some((_, len)) => len.parse().map_err(|_| malformed()),
            None => range.parse::<usize>().map(|_| 1).map_err(|_| malformed()),
        }
    };
    Ok((count(old)?, count(new)?))
}

/// Drop `strip` leading components from a header path
pub fn strip_path(path: &str, strip: usize) -> Option<PathBuf> {
    let parts: Vec<_> = Path::new(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if parts.len() <= strip {
        return None;
    }
    Some(parts[strip..].iter().collect())
}

/// A file change computed in memory, not yet written
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Write(Vec<u8>),
    Delete,
}

/// Apply a unified diff to the tree
///
/// `base` is an optional tree-relative directory the patch paths are relative
/// to. Returns the touched files in the order they were first seen. On error
/// the tree is left untouched.
pub fn apply_unified(
    tree: &SourceTree,
    patch_path: &Path,
    text: &str,
    strip: usize,
    base: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let failed = |file: &Path, reason: String| Error::PatchApplyFailed {
        patch: patch_path.to_path_buf(),
        file: file.to_path_buf(),
        reason,
    };

    let segments =
        split_segments(text).map_err(|reason| failed(Path::new(""), reason))?;
    if segments.is_empty() {
        return Err(failed(Path::new(""), "no file changes found".to_string()));
    }

    let mut pending: BTreeMap<PathBuf, Pending> = BTreeMap::new();
    let mut touched: Vec<PathBuf> = Vec::new();

    for segment in &segments {
        let relative = |raw: &str| -> Result<PathBuf> {
            let stripped = strip_path(raw, strip).ok_or_else(|| {
                failed(
                    Path::new(raw),
                    format!("cannot strip {} components from path", strip),
                )
            })?;
            Ok(match base {
                Some(dir) => Path::new(dir).join(stripped),
                None => stripped,
            })
        };

        let old = segment.old_path.as_deref().map(&relative).transpose()?;
        let new = segment.new_path.as_deref().map(&relative).transpose()?;
        let target = match (&new, &old) {
            (Some(path), _) | (None, Some(path)) => path.clone(),
            (None, None) => {
                return Err(failed(
                    Path::new(DEV_NULL),
                    "both sides of the diff are /dev/null".to_string(),
                ));
            }
        };

        let original = match &old {
            Some(path) => match pending.get(path) {
                Some(Pending::Write(content)) => content.clone(),
                Some(Pending::Delete) => {
                    return Err(failed(path, "file was deleted earlier in the patch".to_string()));
                }
                None if tree.exists(path) => tree.read_bytes(path)?,
                None => return Err(failed(path, "file does not exist".to_string())),
            },
            None => {
                if tree.exists(&target) || matches!(pending.get(&target), Some(Pending::Write(_))) {
                    return Err(failed(&target, "file to be created already exists".to_string()));
                }
                Vec::new()
            }
        };

        let diff_text = segment.diff_text();
        let parsed = diffy::Patch::from_bytes(diff_text.as_bytes())
            .map_err(|e| failed(&target, format!("unparsable hunk: {}", e)))?;
        let patched =
            diffy::apply_bytes(&original, &parsed).map_err(|e| failed(&target, e.to_string()))?;

        if new.is_none() {
            if !patched.is_empty() {
                return Err(failed(
                    &target,
                    "deletion leaves content behind".to_string(),
                ));
            }
            pending.insert(target.clone(), Pending::Delete);
        } else {
            if let Some(old) = &old
                && old != &target
            {
                pending.insert(old.clone(), Pending::Delete);
                touched.push(old.clone());
            }
            pending.insert(target.clone(), Pending::Write(patched));
        }

        if !touched.contains(&target) {
            touched.push(target);
        }
    }

    for (path, change) in &pending {
        match change {
            Pending::Write(content) => tree.write_bytes(path, content)?,
            Pending::Delete => {
                if tree.exists(path) {
                    tree.remove(path)?;
                }
            }
        }
    }

    Ok(touched)
}
