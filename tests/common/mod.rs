// tests/common/mod.rs

//! Shared test utilities for integration tests

#![allow(dead_code)]

use galley::recipe::{ArchiveFetcher, parse_recipe_file};
use galley::toolchain::{
    BuildArtifacts, BuildConfiguration, BuildType, CompilerKind, ConfiguredState, InstallReceipt,
    Os, Settings, ToolchainAdapter,
};
use galley::{Kitchen, KitchenConfig, Recipe, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Path to a fixture source snapshot
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Directory of the shipped disruptor-cpp recipe
pub fn recipe_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("recipes")
        .join("disruptor-cpp")
}

/// The shipped recipe with every version's source pointed at its fixture
pub fn disruptor_recipe() -> Recipe {
    let mut recipe = parse_recipe_file(&recipe_dir().join("recipe.toml")).unwrap();
    for (id, section) in recipe.versions.iter_mut() {
        section.source.url = fixture(&format!("disruptor-{}", id)).display().to_string();
        section.source.sha256 = None;
        section.source.strip_root = false;
    }
    recipe
}

/// Linux/gcc settings so results do not depend on the host
pub fn linux_settings() -> Settings {
    Settings {
        os: Os::Linux,
        arch: "x86_64".to_string(),
        compiler: CompilerKind::Gcc,
        compiler_version: "13".to_string(),
        build_type: BuildType::Release,
        cppstd: None,
    }
}

/// Kitchen configuration rooted in a scratch directory
pub fn test_config(scratch: &TempDir) -> KitchenConfig {
    KitchenConfig {
        source_cache: scratch.path().join("cache"),
        work_root: scratch.path().join("work"),
        jobs: 2,
        keep_builddir: false,
        offline: true,
        settings: linux_settings(),
        dependency_roots: Default::default(),
    }
}

/// Kitchen using the real archive fetcher and a fake toolchain
pub fn kitchen(config: KitchenConfig, toolchain: FakeToolchain) -> Kitchen {
    let fetcher = ArchiveFetcher::new(&config.source_cache, config.offline);
    Kitchen::new(config, Box::new(fetcher), Box::new(toolchain))
}

/// What the fake toolchain saw
#[derive(Debug, Default)]
pub struct Recorded {
    /// Steps in call order: configure, build, install
    pub steps: Vec<String>,
    /// Configurations handed to configure
    pub configurations: Vec<BuildConfiguration>,
}

/// A toolchain that installs canned files instead of compiling
///
/// Shared builds install `libDisruptor.so`, static builds `libDisruptor.a`.
#[derive(Clone, Default)]
pub struct FakeToolchain {
    pub recorded: Arc<Mutex<Recorded>>,
    /// Pretend the compiler supports at most this standard
    pub max_cppstd: Option<u32>,
    /// Install both library flavours regardless of linkage
    pub install_both: bool,
    /// Fail the build step with this message
    pub build_failure: Option<String>,
    /// Install libraries under `lib64/` like a multilib GNUInstallDirs
    pub lib64: bool,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> Vec<String> {
        self.recorded.lock().unwrap().steps.clone()
    }

    pub fn last_configuration(&self) -> Option<BuildConfiguration> {
        self.recorded.lock().unwrap().configurations.last().cloned()
    }
}

impl ToolchainAdapter for FakeToolchain {
    fn name(&self) -> &str {
        "fake"
    }

    fn max_cppstd(&self, settings: &Settings) -> u32 {
        self.max_cppstd
            .unwrap_or_else(|| settings.compiler.max_cppstd(&settings.compiler_version))
    }

    fn configure(&self, config: &BuildConfiguration) -> Result<ConfiguredState> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.steps.push("configure".to_string());
        recorded.configurations.push(config.clone());

        fs::create_dir_all(config.build_dir())?;
        let shared = config.options().shared();
        fs::write(config.build_dir().join("linkage"), if shared { "shared" } else { "static" })?;

        Ok(ConfiguredState {
            build_dir: config.build_dir().to_path_buf(),
            build_type: config.settings().build_type,
            jobs: config.jobs(),
            generated: Vec::new(),
            log: "=== fake configure ===\n".to_string(),
        })
    }

    fn build(&self, state: &ConfiguredState) -> Result<BuildArtifacts> {
        self.recorded.lock().unwrap().steps.push("build".to_string());
        if let Some(message) = &self.build_failure {
            return Err(galley::Error::BuildError(message.clone()));
        }
        Ok(BuildArtifacts {
            build_dir: state.build_dir.clone(),
            build_type: state.build_type,
            log: "=== fake build ===\n".to_string(),
        })
    }

    fn install(&self, artifacts: &BuildArtifacts, destination: &Path) -> Result<InstallReceipt> {
        self.recorded.lock().unwrap().steps.push("install".to_string());

        let linkage = fs::read_to_string(artifacts.build_dir.join("linkage"))?;
        let lib = destination.join(if self.lib64 { "lib64" } else { "lib" });
        let include = destination.join("include").join("Disruptor");
        fs::create_dir_all(&lib)?;
        fs::create_dir_all(&include)?;
        fs::write(include.join("RingBuffer.h"), "#pragma once\n")?;

        if linkage == "shared" || self.install_both {
            fs::write(lib.join("libDisruptor.so"), b"\x7fELF")?;
        }
        if linkage == "static" || self.install_both {
            fs::write(lib.join("libDisruptor.a"), b"!<arch>\n")?;
        }

        InstallReceipt::collect(destination, "=== fake install ===\n".to_string())
    }
}
