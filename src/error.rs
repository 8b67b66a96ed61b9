// src/error.rs

//! Error types for recipe parsing, patching and the cook lifecycle

use crate::recipe::{LifecycleState, Phase};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the orchestrator can surface
///
/// None of these are retried internally. Lifecycle failures are wrapped in
/// [`Error::Aborted`] so the failing phase stays part of the cause chain.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Unknown version {requested} (known: {known})")]
    UnknownVersion { requested: String, known: String },

    #[error("Failed to fetch source {locator}: {reason}")]
    SourceFetchFailed { locator: String, reason: String },

    #[error("Patch target {} does not exist", file.display())]
    PatchTargetMissing { file: PathBuf },

    #[error("Anchor not found in {}:\n{anchor}", file.display())]
    PatchAnchorNotFound { file: PathBuf, anchor: String },

    #[error("Anchor matches {count} times in {} (must match exactly once):\n{anchor}", file.display())]
    PatchAnchorAmbiguous {
        file: PathBuf,
        anchor: String,
        count: usize,
    },

    #[error("Patch {} does not apply to {}: {reason}", patch.display(), file.display())]
    PatchApplyFailed {
        patch: PathBuf,
        file: PathBuf,
        reason: String,
    },

    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Install error: {0}")]
    InstallError(String),

    #[error("Linkage violation: {0}")]
    LinkageViolation(String),

    #[error("Requirement {reference} is not declared by the recipe")]
    UndeclaredRequirement { reference: String },

    #[error("The {phase} phase cannot run from the {state} state")]
    PhaseOutOfOrder { phase: Phase, state: LifecycleState },

    #[error("{package}/{version}: {phase} phase failed")]
    Aborted {
        package: String,
        version: String,
        phase: Phase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// The innermost error, looking through [`Error::Aborted`] wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Aborted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Phase the lifecycle aborted in, if this is a lifecycle failure
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Aborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Whether this error signals upstream text drift against a recipe version
    pub fn is_source_drift(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::PatchAnchorNotFound { .. }
                | Error::PatchAnchorAmbiguous { .. }
                | Error::PatchApplyFailed { .. }
                | Error::PatchTargetMissing { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_through_abort() {
        let err = Error::Aborted {
            package: "zlib".to_string(),
            version: "1.3".to_string(),
            phase: Phase::Patch,
            source: Box::new(Error::PatchAnchorNotFound {
                file: PathBuf::from("CMakeLists.txt"),
                anchor: "project(zlib)".to_string(),
            }),
        };

        assert_eq!(err.phase(), Some(Phase::Patch));
        assert!(err.is_source_drift());
        assert!(matches!(err.root_cause(), Error::PatchAnchorNotFound { .. }));
        assert_eq!(err.to_string(), "zlib/1.3: patch phase failed");
    }

    #[test]
    fn test_anchor_message_names_file_and_anchor() {
        let err = Error::PatchAnchorNotFound {
            file: PathBuf::from("src/CMakeLists.txt"),
            anchor: "add_library(foo)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("src/CMakeLists.txt"));
        assert!(msg.contains("add_library(foo)"));
    }
}
