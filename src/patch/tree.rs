// src/patch/tree.rs

//! Working copy of one recipe version's upstream source

use crate::error::{Error, Result};
use crate::patch::MutationRecord;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// A fetched source tree plus the log of patch operations applied to it
///
/// The log only grows through [`crate::patch::PatchEngine`], one record per
/// successfully applied operation. A tree whose patch sequence failed part way
/// is inconsistent and must be discarded.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
    log: Vec<MutationRecord>,
}

impl SourceTree {
    /// Wrap an already populated directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::NotFound(format!(
                "source tree {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            log: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Records of every applied operation, in application order
    pub fn mutation_log(&self) -> &[MutationRecord] {
        &self.log
    }

    /// Take the log, leaving the tree with an empty one
    pub fn take_log(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.log)
    }

    pub(crate) fn record(&mut self, record: MutationRecord) {
        self.log.push(record);
    }

    /// Resolve a tree-relative path, refusing anything that escapes the root
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let mut resolved = self.root.clone();

        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidRecipe(format!(
                        "path {} escapes the source tree",
                        relative.display()
                    )));
                }
            }
        }

        if resolved == self.root {
            return Err(Error::InvalidRecipe(format!(
                "path '{}' does not name a file",
                relative.display()
            )));
        }
        Ok(resolved)
    }

    /// Read a file's raw bytes from the tree
    ///
    /// Upstream sources are not guaranteed to be UTF-8, so patching works on
    /// bytes throughout.
    pub fn read_bytes(&self, relative: impl AsRef<Path>) -> Result<Vec<u8>> {
        let relative = relative.as_ref();
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(Error::PatchTargetMissing {
                file: relative.to_path_buf(),
            });
        }
        fs::read(&path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))
    }

    /// Read a UTF-8 text file from the tree
    pub fn read_text(&self, relative: impl AsRef<Path>) -> Result<String> {
        let relative = relative.as_ref();
        let bytes = self.read_bytes(relative)?;
        String::from_utf8(bytes).map_err(|e| {
            Error::IoError(format!("{} is not UTF-8: {}", relative.display(), e))
        })
    }

    /// Replace a file's content, creating parent directories as needed
    pub fn write_bytes(&self, relative: impl AsRef<Path>, content: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn write_text(&self, relative: impl AsRef<Path>, content: &str) -> Result<()> {
        self.write_bytes(relative, content.as_bytes())
    }

    pub fn remove(&self, relative: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(relative)?;
        fs::remove_file(&path)
            .map_err(|e| Error::IoError(format!("Failed to remove {}: {}", path.display(), e)))
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.resolve(relative).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::open(dir.path()).unwrap();

        assert!(tree.resolve("src/lib.cpp").is_ok());
        assert!(tree.resolve("./CMakeLists.txt").is_ok());
        assert!(tree.resolve("../outside").is_err());
        assert!(tree.resolve("/etc/passwd").is_err());
        assert!(tree.resolve(".").is_err());
    }

    #[test]
    fn test_read_missing_target() {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::open(dir.path()).unwrap();
        assert!(matches!(
            tree.read_text("missing.txt"),
            Err(Error::PatchTargetMissing { .. })
        ));
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::open(dir.path()).unwrap();
        tree.write_text("a/b/c.txt", "hello").unwrap();
        assert_eq!(tree.read_text("a/b/c.txt").unwrap(), "hello");
        assert!(tree.exists("a/b/c.txt"));

        tree.remove("a/b/c.txt").unwrap();
        assert!(!tree.exists("a/b/c.txt"));
    }

    #[test]
    fn test_bytes_survive_unchanged() {
        let dir = TempDir::new().unwrap();
        let tree = SourceTree::open(dir.path()).unwrap();
        let latin1 = b"// caf\xe9\n".to_vec();
        tree.write_bytes("a.cpp", &latin1).unwrap();

        assert_eq!(tree.read_bytes("a.cpp").unwrap(), latin1);
        assert!(tree.read_text("a.cpp").is_err());
    }

    #[test]
    fn test_open_requires_directory() {
        assert!(SourceTree::open("/nonexistent/galley/tree").is_err());
    }
}
