// src/toolchain/settings.rs

//! Host and target settings a build runs under

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// C++ standards in ascending order, by their two-digit year
pub const KNOWN_CPPSTD: &[u32] = &[98, 11, 14, 17, 20, 23];

/// Whether `standard` names a C++ standard we know
pub fn is_known_cppstd(standard: u32) -> bool {
    KNOWN_CPPSTD.contains(&standard)
}

/// Position of a standard in chronological order (98 sorts first)
pub fn cppstd_rank(standard: u32) -> usize {
    KNOWN_CPPSTD
        .iter()
        .position(|s| *s == standard)
        .unwrap_or(usize::MAX)
}

/// Operating system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Freebsd,
}

impl Os {
    /// The operating system this binary was compiled for
    pub fn host() -> Self {
        match std::env::consts::OS {
            "macos" => Self::Macos,
            "windows" => Self::Windows,
            "freebsd" => Self::Freebsd,
            _ => Self::Linux,
        }
    }

    /// Name CMake uses for `CMAKE_SYSTEM_NAME`
    pub fn cmake_system_name(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::Macos => "Darwin",
            Self::Windows => "Windows",
            Self::Freebsd => "FreeBSD",
        }
    }
}

/// Compiler family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CompilerKind {
    Gcc,
    Clang,
    AppleClang,
    Msvc,
}

impl CompilerKind {
    /// Newest C++ standard the compiler version can build
    pub fn max_cppstd(&self, version: &str) -> u32 {
        let major = major_version(version);
        match self {
            Self::Gcc => match major {
                0..=4 => 11,
                5..=7 => 17,
                8..=10 => 20,
                _ => 23,
            },
            Self::Clang => match major {
                0..=3 => 14,
                4..=5 => 17,
                6..=11 => 20,
                _ => 23,
            },
            Self::AppleClang => match major {
                0..=9 => 17,
                10..=12 => 20,
                _ => 23,
            },
            Self::Msvc => match major {
                0..=190 => 14,
                191 => 17,
                192 => 20,
                _ => 23,
            },
        }
    }

    /// Standard the compiler uses when none is requested
    pub fn default_cppstd(&self, version: &str) -> u32 {
        let major = major_version(version);
        match self {
            Self::Gcc => match major {
                0..=5 => 98,
                6..=10 => 14,
                _ => 17,
            },
            Self::Clang => match major {
                0..=5 => 98,
                6..=15 => 14,
                _ => 17,
            },
            Self::AppleClang => 98,
            Self::Msvc => 14,
        }
    }
}

/// First dotted component of a compiler version (`"13.2"` → 13)
fn major_version(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Build type handed to the build system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum BuildType {
    #[default]
    Release,
    Debug,
    RelWithDebInfo,
    MinSizeRel,
}

/// The settings one build runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub os: Os,
    pub arch: String,
    pub compiler: CompilerKind,
    pub compiler_version: String,
    pub build_type: BuildType,
    /// Requested C++ standard; when unset the compiler default is raised to
    /// the recipe minimum
    pub cppstd: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        let os = Os::host();
        let (compiler, compiler_version) = match os {
            Os::Macos => (CompilerKind::AppleClang, "15"),
            Os::Windows => (CompilerKind::Msvc, "193"),
            Os::Freebsd => (CompilerKind::Clang, "16"),
            Os::Linux => (CompilerKind::Gcc, "13"),
        };

        Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            compiler,
            compiler_version: compiler_version.to_string(),
            build_type: BuildType::default(),
            cppstd: None,
        }
    }
}

impl Settings {
    /// Pick the C++ standard for a build
    ///
    /// `minimum` comes from the recipe, `max` from the active toolchain. An
    /// explicit `cppstd` below the minimum or above the maximum is rejected;
    /// otherwise the compiler default is raised to the minimum.
    pub fn resolve_cppstd(&self, minimum: Option<u32>, max: u32) -> Result<u32> {
        if let Some(requested) = self.cppstd
            && !is_known_cppstd(requested)
        {
            return Err(Error::UnsupportedConfiguration(format!(
                "unknown C++ standard {}",
                requested
            )));
        }

        if let Some(min) = minimum
            && cppstd_rank(min) > cppstd_rank(max)
        {
            return Err(Error::UnsupportedConfiguration(format!(
                "C++{} required, but {} {} supports at most C++{}",
                min, self.compiler, self.compiler_version, max
            )));
        }

        let chosen = match self.cppstd {
            Some(requested) => {
                if let Some(min) = minimum
                    && cppstd_rank(requested) < cppstd_rank(min)
                {
                    return Err(Error::UnsupportedConfiguration(format!(
                        "C++{} requested, but at least C++{} is required",
                        requested, min
                    )));
                }
                requested
            }
            None => {
                let default = self.compiler.default_cppstd(&self.compiler_version);
                match minimum {
                    Some(min) if cppstd_rank(min) > cppstd_rank(default) => min,
                    _ => default,
                }
            }
        };

        if cppstd_rank(chosen) > cppstd_rank(max) {
            return Err(Error::UnsupportedConfiguration(format!(
                "C++{} requested, but {} {} supports at most C++{}",
                chosen, self.compiler, self.compiler_version, max
            )));
        }
        Ok(chosen)
    }
}
