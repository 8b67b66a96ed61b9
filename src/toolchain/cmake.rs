// src/toolchain/cmake.rs

//! CMake toolchain adapter

use crate::error::{Error, Result};
use crate::toolchain::{
    BuildArtifacts, BuildConfiguration, ConfiguredState, InstallReceipt, ToolchainAdapter,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Name of the generated toolchain file inside the build directory
pub const TOOLCHAIN_FILE_NAME: &str = "galley_toolchain.cmake";

/// Drives `cmake` through configure, build and install
#[derive(Debug, Clone)]
pub struct CMakeAdapter {
    program: PathBuf,
    generator: Option<String>,
}

impl CMakeAdapter {
    /// Find `cmake` on `PATH`
    pub fn locate() -> Result<Self> {
        let program = which::which("cmake").map_err(|e| {
            Error::ConfigurationError(format!("cmake not found on PATH: {}", e))
        })?;
        debug!("Using cmake at {}", program.display());
        Ok(Self::with_program(program))
    }

    /// Use a specific `cmake` binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            generator: None,
        }
    }

    /// Select a CMake generator (`Ninja`, `Unix Makefiles`, ...)
    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = Some(generator.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments of the configure invocation
    pub fn configure_args(&self, config: &BuildConfiguration, toolchain_file: &Path) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            config.source_dir().display().to_string(),
            "-B".to_string(),
            config.build_dir().display().to_string(),
        ];
        if let Some(generator) = &self.generator {
            args.push("-G".to_string());
            args.push(generator.clone());
        }
        args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain_file.display()));
        args.push(format!("-DCMAKE_BUILD_TYPE={}", config.settings().build_type));
        for (name, value) in config.cache_variables() {
            args.push(format!("-D{}={}", name, value));
        }
        args
    }

    fn run(&self, step: &str, args: &[String], cwd: &Path) -> std::result::Result<String, String> {
        debug!("cmake {} {}", step, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.program.display(), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut log = format!("=== cmake {} ===\n", step);
        log.push_str(&stdout);
        log.push_str(&stderr);

        if output.status.success() {
            Ok(log)
        } else {
            Err(format!(
                "cmake {} exited with {:?}\n{}",
                step,
                output.status.code(),
                stderr
            ))
        }
    }
}

/// Render the toolchain file for a configuration
///
/// The output depends only on the configuration, so identical inputs give
/// byte-identical files.
pub fn render_toolchain_file(config: &BuildConfiguration) -> String {
    let mut out = String::new();
    let shared = if config.options().shared() { "ON" } else { "OFF" };

    let _ = writeln!(
        out,
        "# Generated by galley for {}/{}",
        config.package(),
        config.version()
    );
    let _ = writeln!(out, "set(CMAKE_CXX_STANDARD {})", config.cppstd());
    let _ = writeln!(out, "set(CMAKE_CXX_STANDARD_REQUIRED ON)");
    let _ = writeln!(out, "set(CMAKE_CXX_EXTENSIONS OFF)");
    let _ = writeln!(out, "set(BUILD_SHARED_LIBS {} CACHE BOOL \"\" FORCE)", shared);
    if let Some(pic) = config.options().pic() {
        let _ = writeln!(
            out,
            "set(CMAKE_POSITION_INDEPENDENT_CODE {})",
            if pic { "ON" } else { "OFF" }
        );
    }

    let roots: Vec<&PathBuf> = config.requirement_paths().values().collect();
    if !roots.is_empty() {
        let joined = roots
            .iter()
            .map(|p| format!("\"{}\"", cmake_path(p)))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(out, "list(PREPEND CMAKE_PREFIX_PATH {})", joined);
    }

    for (name, root) in config.requirement_paths() {
        let file_name = config
            .dependency_file_names()
            .get(name)
            .map(String::as_str)
            .unwrap_or(name.as_str());
        let hint = ["lib", "lib64"]
            .iter()
            .map(|dir| root.join(dir).join("cmake").join(file_name))
            .find(|dir| dir.is_dir())
            .unwrap_or_else(|| root.clone());
        let _ = writeln!(out, "set({}_DIR \"{}\")", file_name, cmake_path(&hint));
    }

    out
}

/// Paths in CMake files always use forward slashes
fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

impl ToolchainAdapter for CMakeAdapter {
    fn name(&self) -> &str {
        "cmake"
    }

    fn configure(&self, config: &BuildConfiguration) -> Result<ConfiguredState> {
        fs::create_dir_all(config.build_dir()).map_err(|e| {
            Error::ConfigurationError(format!(
                "cannot create build directory {}: {}",
                config.build_dir().display(),
                e
            ))
        })?;

        let toolchain_file = config.build_dir().join(TOOLCHAIN_FILE_NAME);
        fs::write(&toolchain_file, render_toolchain_file(config)).map_err(|e| {
            Error::ConfigurationError(format!("cannot write {}: {}", toolchain_file.display(), e))
        })?;

        info!("Configuring {} with cmake", config.package());
        let args = self.configure_args(config, &toolchain_file);
        let log = self
            .run("configure", &args, config.build_dir())
            .map_err(Error::ConfigurationError)?;

        Ok(ConfiguredState {
            build_dir: config.build_dir().to_path_buf(),
            build_type: config.settings().build_type,
            jobs: config.jobs(),
            generated: vec![toolchain_file],
            log,
        })
    }

    fn build(&self, state: &ConfiguredState) -> Result<BuildArtifacts> {
        let args = vec![
            "--build".to_string(),
            state.build_dir.display().to_string(),
            "--config".to_string(),
            state.build_type.to_string(),
            "--parallel".to_string(),
            state.jobs.max(1).to_string(),
        ];
        let log = self
            .run("build", &args, &state.build_dir)
            .map_err(Error::BuildError)?;

        Ok(BuildArtifacts {
            build_dir: state.build_dir.clone(),
            build_type: state.build_type,
            log,
        })
    }

    fn install(&self, artifacts: &BuildArtifacts, destination: &Path) -> Result<InstallReceipt> {
        fs::create_dir_all(destination)?;
        let args = vec![
            "--install".to_string(),
            artifacts.build_dir.display().to_string(),
            "--config".to_string(),
            artifacts.build_type.to_string(),
            "--prefix".to_string(),
            destination.display().to_string(),
        ];
        let log = self
            .run("install", &args, &artifacts.build_dir)
            .map_err(Error::InstallError)?;

        InstallReceipt::collect(destination, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{OptionOverrides, parse_recipe, resolve_options};
    use crate::toolchain::{BuildLayout, Os, Settings, validate};
    use std::collections::BTreeMap;

    const RECIPE: &str = r#"
[package]
name = "demo"

[[options]]
name = "shared"
values = [true, false]
default = false

[[options]]
name = "fPIC"
values = [true, false]
default = true

[[requires]]
name = "boost"
version = "[>=1.83 <1.91]"
cmake_file_name = "Boost"

[validate]
min_cppstd = 14

[build.cache_variables]
DEMO_BUILD_TESTS = false

[versions."1.0.0"]
source = { url = "https://example.com/demo-1.0.0.tar.gz" }
"#;

    fn config() -> BuildConfiguration {
        let recipe = parse_recipe(RECIPE).unwrap();
        let version = recipe.version("1.0.0").unwrap();
        let settings = Settings {
            os: Os::Linux,
            compiler: crate::toolchain::CompilerKind::Gcc,
            compiler_version: "9".to_string(),
            ..Settings::default()
        };
        let options = resolve_options(&recipe, &OptionOverrides::new(), &settings).unwrap();
        let validated = validate(&recipe, &options, &settings, 20).unwrap();
        let mut paths = BTreeMap::new();
        paths.insert("boost".to_string(), PathBuf::from("/deps/boost"));
        BuildConfiguration::derive(
            &recipe,
            &version,
            options,
            &settings,
            validated,
            paths,
            BuildLayout {
                source_dir: PathBuf::from("/work/src"),
                build_dir: PathBuf::from("/work/build"),
                jobs: 4,
            },
        )
    }

    #[test]
    fn test_toolchain_file_content() {
        let content = render_toolchain_file(&config());
        assert!(content.contains("set(CMAKE_CXX_STANDARD 14)"));
        assert!(content.contains("set(BUILD_SHARED_LIBS OFF CACHE BOOL \"\" FORCE)"));
        assert!(content.contains("set(CMAKE_POSITION_INDEPENDENT_CODE ON)"));
        assert!(content.contains("list(PREPEND CMAKE_PREFIX_PATH \"/deps/boost\")"));
        assert!(content.contains("set(Boost_DIR \"/deps/boost\")"));
        assert_eq!(content, render_toolchain_file(&config()));
    }

    #[test]
    fn test_configure_args() {
        let adapter = CMakeAdapter::with_program("cmake").with_generator("Ninja");
        let args = adapter.configure_args(&config(), Path::new("/work/build/galley_toolchain.cmake"));
        assert_eq!(&args[..4], ["-S", "/work/src", "-B", "/work/build"]);
        assert!(args.windows(2).any(|w| w == ["-G", "Ninja"]));
        assert!(args.contains(&"-DDEMO_BUILD_TESTS=OFF".to_string()));
        assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
    }

    #[test]
    fn test_missing_program_is_configuration_error() {
        let adapter = CMakeAdapter::with_program("/nonexistent/bin/cmake");
        let dir = tempfile::TempDir::new().unwrap();
        let err = adapter.run("configure", &[], dir.path()).unwrap_err();
        assert!(err.contains("failed to run"));
    }
}
