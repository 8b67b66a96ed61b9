// src/recipe/kitchen/lifecycle.rs

//! Lifecycle states and the phases that move between them

use serde::Serialize;
use strum_macros::{Display, EnumIter};

/// A step of the cook lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Export,
    Fetch,
    Patch,
    Validate,
    Configure,
    Build,
    Package,
    Publish,
}

impl Phase {
    /// State the lifecycle must be in before this phase runs
    pub fn requires(self) -> LifecycleState {
        match self {
            Self::Export => LifecycleState::Defined,
            Self::Fetch => LifecycleState::Exported,
            Self::Patch => LifecycleState::Fetched,
            Self::Validate => LifecycleState::Patched,
            Self::Configure => LifecycleState::Validated,
            Self::Build => LifecycleState::Configured,
            Self::Package => LifecycleState::Built,
            Self::Publish => LifecycleState::Packaged,
        }
    }

    /// State reached when this phase succeeds
    pub fn reaches(self) -> LifecycleState {
        match self {
            Self::Export => LifecycleState::Exported,
            Self::Fetch => LifecycleState::Fetched,
            Self::Patch => LifecycleState::Patched,
            Self::Validate => LifecycleState::Validated,
            Self::Configure => LifecycleState::Configured,
            Self::Build => LifecycleState::Built,
            Self::Package => LifecycleState::Packaged,
            Self::Publish => LifecycleState::Published,
        }
    }
}

/// Where a cook stands
///
/// States advance linearly; `Aborted` is reachable from every non-terminal
/// state and nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleState {
    Defined,
    Exported,
    Fetched,
    Patched,
    Validated,
    Configured,
    Built,
    Packaged,
    Published,
    Aborted,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Aborted)
    }

    /// The phase that advances from this state
    pub fn next_phase(self) -> Option<Phase> {
        match self {
            Self::Defined => Some(Phase::Export),
            Self::Exported => Some(Phase::Fetch),
            Self::Fetched => Some(Phase::Patch),
            Self::Patched => Some(Phase::Validate),
            Self::Validated => Some(Phase::Configure),
            Self::Configured => Some(Phase::Build),
            Self::Built => Some(Phase::Package),
            Self::Packaged => Some(Phase::Publish),
            Self::Published | Self::Aborted => None,
        }
    }
}
