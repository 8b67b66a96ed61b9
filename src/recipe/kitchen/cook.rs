// src/recipe/kitchen/cook.rs

//! Cook: the lifecycle of a single recipe version build

use crate::error::{Error, Result};
use crate::hash;
use crate::package_info::{self, ArtifactDescriptor};
use crate::patch::{MutationRecord, PatchEngine, PatchOutcome, SourceTree};
use crate::recipe::format::{PackageKind, Recipe};
use crate::recipe::options::{Linkage, OptionOverrides, ResolvedOptions, resolve_options};
use crate::recipe::version::RecipeVersion;
use crate::toolchain::{
    self, BuildArtifacts, BuildConfiguration, BuildLayout, ConfiguredState, InstallReceipt,
    Validated,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::config::{CookResult, ExportManifest};
use super::lifecycle::{LifecycleState, Phase};
use super::resolver::resolve_all;
use super::Kitchen;

/// License files picked up from the source root when the recipe names none
const DEFAULT_LICENSE_PREFIXES: &[&str] = &["LICENSE", "LICENCE", "COPYING"];

/// Wrap a phase failure with the version it happened to
pub(super) fn aborted(version: &RecipeVersion, phase: Phase, source: Error) -> Error {
    Error::Aborted {
        package: version.package().to_string(),
        version: version.version().to_string(),
        phase,
        source: Box::new(source),
    }
}

/// Copy the recipe-local payloads `version` needs into `dest`, hashing each
pub(super) fn stage_payloads(
    recipe: &Recipe,
    version: &RecipeVersion,
    dest: &Path,
) -> Result<ExportManifest> {
    let mut manifest = ExportManifest::default();
    for relative in recipe.payloads_for(version) {
        let source = recipe.payload_path(&relative);
        if !source.is_file() {
            return Err(Error::NotFound(format!(
                "recipe payload {} ({})",
                relative,
                source.display()
            )));
        }

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, &target)?;

        let digest = hash::sha256_file(&target)?;
        debug!("Staged {} ({})", relative, digest);
        manifest.insert(&relative, digest);
    }
    Ok(manifest)
}

/// A single cook operation
///
/// Phases run strictly in lifecycle order through [`Cook::advance`]. The
/// first failure moves the cook to `Aborted`, removes any partial package
/// layout and leaves the scratch tree to be discarded.
pub struct Cook<'a> {
    kitchen: &'a Kitchen,
    recipe: &'a Recipe,
    version: RecipeVersion,
    options: ResolvedOptions,
    state: LifecycleState,
    /// Scratch tree holding exports, sources and the build directory
    work_dir: Option<TempDir>,
    work_path: PathBuf,
    export_dir: PathBuf,
    source_dir: PathBuf,
    build_dir: PathBuf,
    package_dir: PathBuf,
    package_dir_created: bool,
    tree: Option<SourceTree>,
    export: ExportManifest,
    mutation_log: Vec<MutationRecord>,
    validated: Option<Validated>,
    configuration: Option<BuildConfiguration>,
    configured: Option<ConfiguredState>,
    artifacts: Option<BuildArtifacts>,
    receipt: Option<InstallReceipt>,
    descriptor: Option<ArtifactDescriptor>,
    log: String,
    warnings: Vec<String>,
}

impl<'a> Cook<'a> {
    /// Prepare a cook; option overrides are checked before any phase runs
    pub(super) fn new(
        kitchen: &'a Kitchen,
        recipe: &'a Recipe,
        version: RecipeVersion,
        overrides: &OptionOverrides,
        output_dir: &Path,
    ) -> Result<Self> {
        let options = resolve_options(recipe, overrides, &kitchen.config.settings)?;

        fs::create_dir_all(&kitchen.config.work_root)?;
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", version.package(), version.version()))
            .tempdir_in(&kitchen.config.work_root)
            .map_err(|e| Error::IoError(format!("Failed to create build directory: {}", e)))?;
        let work_path = work_dir.path().to_path_buf();

        let package_dir = output_dir.join(format!(
            "{}-{}-{}",
            version.package(),
            version.version(),
            options.linkage()
        ));

        Ok(Self {
            kitchen,
            recipe,
            options,
            state: LifecycleState::Defined,
            export_dir: work_path.join("export"),
            source_dir: work_path.join("source"),
            build_dir: work_path.join("build"),
            work_path,
            work_dir: Some(work_dir),
            package_dir,
            package_dir_created: false,
            tree: None,
            export: ExportManifest::default(),
            mutation_log: Vec::new(),
            validated: None,
            configuration: None,
            configured: None,
            artifacts: None,
            receipt: None,
            descriptor: None,
            log: String::new(),
            warnings: Vec::new(),
            version,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Run the next phase; terminal states are left untouched
    pub fn advance(&mut self) -> Result<LifecycleState> {
        match self.state.next_phase() {
            Some(phase) => self.run_phase(phase),
            None => Ok(self.state),
        }
    }

    /// Run one phase, which must be the one the current state leads to
    ///
    /// Asking for any other phase fails with [`Error::PhaseOutOfOrder`] and
    /// leaves the cook untouched.
    pub fn run_phase(&mut self, phase: Phase) -> Result<LifecycleState> {
        if phase.requires() != self.state {
            return Err(Error::PhaseOutOfOrder {
                phase,
                state: self.state,
            });
        }

        info!("{}: {}", self.version.reference(), phase);
        let result = match phase {
            Phase::Export => self.export(),
            Phase::Fetch => self.fetch(),
            Phase::Patch => self.patch(),
            Phase::Validate => self.validate(),
            Phase::Configure => self.configure(),
            Phase::Build => self.build(),
            Phase::Package => self.package(),
            Phase::Publish => self.publish(),
        };

        match result {
            Ok(()) => {
                self.state = phase.reaches();
                self.log_line(&format!("{} -> {}", phase, self.state));
                Ok(self.state)
            }
            Err(e) => {
                warn!("{}: {} phase failed: {}", self.version.reference(), phase, e);
                self.state = LifecycleState::Aborted;
                self.discard_package();
                Err(aborted(&self.version, phase, e))
            }
        }
    }

    /// Drive the lifecycle to a terminal state
    pub fn run(&mut self) -> Result<()> {
        while !self.state.is_terminal() {
            self.advance()?;
        }
        Ok(())
    }

    /// Keep the scratch tree on disk instead of deleting it on drop
    pub(super) fn keep_work_dir(&mut self) {
        if let Some(dir) = self.work_dir.take() {
            #[allow(deprecated)]
            let path = dir.into_path();
            info!("Keeping build directory {}", path.display());
        }
    }

    pub fn work_path(&self) -> &Path {
        &self.work_path
    }

    /// Configuration handed to the toolchain, once configured
    pub fn configuration(&self) -> Option<&BuildConfiguration> {
        self.configuration.as_ref()
    }

    /// Outputs of a published cook
    pub(super) fn into_result(mut self) -> Result<CookResult> {
        let (Some(descriptor), Some(receipt)) = (self.descriptor.take(), self.receipt.take())
        else {
            return Err(Error::NotFound(format!(
                "{} has not been published (state: {})",
                self.version.reference(),
                self.state
            )));
        };

        Ok(CookResult {
            package_dir: self.package_dir.clone(),
            descriptor,
            mutation_log: std::mem::take(&mut self.mutation_log),
            export: std::mem::take(&mut self.export),
            receipt,
            warnings: std::mem::take(&mut self.warnings),
            log: std::mem::take(&mut self.log),
        })
    }

    /// Defined -> Exported: stage recipe-local payloads
    fn export(&mut self) -> Result<()> {
        fs::create_dir_all(&self.export_dir)?;
        self.export = stage_payloads(self.recipe, &self.version, &self.export_dir)?;
        self.log_line(&format!("Staged {} payload(s)", self.export.len()));
        Ok(())
    }

    /// Exported -> Fetched: populate a fresh source tree
    fn fetch(&mut self) -> Result<()> {
        let source = self.version.source().clone();
        if source.is_remote() && source.sha256.is_none() {
            self.warn(format!("{} is fetched without a sha256", source.url));
        }

        fs::create_dir_all(&self.source_dir)?;
        self.kitchen.fetcher.fetch(&source, &self.source_dir)?;
        self.tree = Some(SourceTree::open(&self.source_dir)?);
        self.log_line(&format!("Fetched source: {}", source.url));
        Ok(())
    }

    /// Fetched -> Patched: apply the version's patch list in order
    fn patch(&mut self) -> Result<()> {
        let tree = self
            .tree
            .as_mut()
            .ok_or_else(|| Error::NotFound("source tree".to_string()))?;

        let engine = PatchEngine::new(&self.export_dir);
        let outcomes = engine.apply_all(tree, self.version.patches())?;
        self.mutation_log = tree.take_log();

        for record in &self.mutation_log {
            if record.outcome == PatchOutcome::Unchanged {
                warn!("Patch {} left the tree unchanged", record.description);
            }
        }
        let unchanged = outcomes
            .iter()
            .filter(|o| **o == PatchOutcome::Unchanged)
            .count();
        if unchanged > 0 {
            self.warn(format!("{} patch operation(s) changed nothing", unchanged));
        }

        let lines: Vec<String> = self
            .mutation_log
            .iter()
            .map(|r| format!("Applied patch {}: {}", r.index, r.description))
            .collect();
        for line in lines {
            self.log_line(&line);
        }
        Ok(())
    }

    /// Patched -> Validated: check the toolchain can build this configuration
    fn validate(&mut self) -> Result<()> {
        let kitchen = self.kitchen;
        let settings = &kitchen.config.settings;
        let max = kitchen.toolchain.max_cppstd(settings);
        let validated = toolchain::validate(self.recipe, &self.options, settings, max)?;
        self.log_line(&format!(
            "Validated: C++{} with {} {}",
            validated.cppstd, settings.compiler, settings.compiler_version
        ));
        self.validated = Some(validated);
        Ok(())
    }

    /// Validated -> Configured: fix the build configuration and configure
    fn configure(&mut self) -> Result<()> {
        let validated = self
            .validated
            .ok_or_else(|| Error::NotFound("validation result".to_string()))?;

        let paths = resolve_all(
            self.kitchen.resolver.as_ref(),
            self.version.requirements().iter(),
        )?;

        let configuration = BuildConfiguration::derive(
            self.recipe,
            &self.version,
            self.options.clone(),
            &self.kitchen.config.settings,
            validated,
            paths,
            BuildLayout {
                source_dir: self.source_dir.clone(),
                build_dir: self.build_dir.clone(),
                jobs: self.kitchen.config.jobs,
            },
        );

        let configured = self.kitchen.toolchain.configure(&configuration)?;
        self.log.push_str(&configured.log);
        self.configuration = Some(configuration);
        self.configured = Some(configured);
        Ok(())
    }

    /// Configured -> Built
    fn build(&mut self) -> Result<()> {
        let configured = self
            .configured
            .as_ref()
            .ok_or_else(|| Error::NotFound("configured build".to_string()))?;

        let artifacts = self.kitchen.toolchain.build(configured)?;
        self.log.push_str(&artifacts.log);
        self.artifacts = Some(artifacts);
        Ok(())
    }

    /// Built -> Packaged: install into the package layout and copy licenses
    fn package(&mut self) -> Result<()> {
        let artifacts = self
            .artifacts
            .as_ref()
            .ok_or_else(|| Error::NotFound("build artifacts".to_string()))?;

        if self.package_dir.exists() {
            debug!("Replacing {}", self.package_dir.display());
            fs::remove_dir_all(&self.package_dir)?;
        }
        fs::create_dir_all(&self.package_dir)?;
        self.package_dir_created = true;

        let receipt = self.kitchen.toolchain.install(artifacts, &self.package_dir)?;
        self.log.push_str(&receipt.log);

        match self.recipe.package.kind {
            PackageKind::HeaderLibrary | PackageKind::Application => {}
            _ => check_linkage(&receipt, self.options.linkage())?,
        }

        let licenses = self.copy_licenses()?;
        if licenses == 0 {
            self.warn(format!("No license files packaged for {}", self.version.reference()));
        }

        self.log_line(&format!(
            "Packaged {} file(s) into {}",
            receipt.files.len(),
            self.package_dir.display()
        ));
        self.receipt = Some(receipt);
        Ok(())
    }

    /// Packaged -> Published
    fn publish(&mut self) -> Result<()> {
        let mut descriptor = package_info::publish(self.recipe, &self.version, &self.options)?;
        // Point consumers at where the build system really put libraries
        if let Some(receipt) = &self.receipt
            && !descriptor.lib_dirs.is_empty()
        {
            let installed = receipt.library_dirs();
            if !installed.is_empty() {
                descriptor.lib_dirs = installed;
            }
        }
        info!(
            "Published {} ({} lib(s), {} consumer requirement(s))",
            self.version.reference(),
            descriptor.libs.len(),
            descriptor.requires.len()
        );
        self.descriptor = Some(descriptor);
        Ok(())
    }

    /// Copy license files into `<package>/licenses`
    ///
    /// Named files are looked up in the source tree, then among the staged
    /// exports. Without names, `LICENSE*`, `LICENCE*` and `COPYING*` at the
    /// source root are used.
    fn copy_licenses(&mut self) -> Result<usize> {
        let dest = self.package_dir.join("licenses");
        let mut sources = Vec::new();

        if self.recipe.package.license_files.is_empty() {
            for entry in fs::read_dir(&self.source_dir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().to_string();
                let upper = name.to_ascii_uppercase();
                if entry.file_type()?.is_file()
                    && DEFAULT_LICENSE_PREFIXES.iter().any(|p| upper.starts_with(p))
                {
                    sources.push((name, entry.path()));
                }
            }
        } else {
            for name in &self.recipe.package.license_files {
                let candidates = [self.source_dir.join(name), self.export_dir.join(name)];
                match candidates.into_iter().find(|p| p.is_file()) {
                    Some(path) => sources.push((name.clone(), path)),
                    None => self.warn(format!("License file {} not found", name)),
                }
            }
        }

        sources.sort();
        for (name, path) in &sources {
            let target = dest.join(name);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target)?;
            debug!("Packaged license {}", name);
        }
        Ok(sources.len())
    }

    /// Remove a partially populated package layout
    fn discard_package(&mut self) {
        if self.package_dir_created
            && let Err(e) = fs::remove_dir_all(&self.package_dir)
        {
            warn!("Failed to remove {}: {}", self.package_dir.display(), e);
        }
        self.package_dir_created = false;
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }
}

/// How an installed file links, judged by its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LibraryFlavor {
    Static,
    Shared,
}

fn library_flavor(path: &Path) -> Option<LibraryFlavor> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    // MinGW import libraries and MSVC .lib files serve both linkages
    if name.ends_with(".dll.a") || name.ends_with(".lib") {
        return None;
    }
    if name.ends_with(".a") {
        return Some(LibraryFlavor::Static);
    }
    if name.ends_with(".so")
        || name.contains(".so.")
        || name.ends_with(".dylib")
        || name.ends_with(".dll")
    {
        return Some(LibraryFlavor::Shared);
    }
    None
}

/// Reject installed libraries of the other linkage
pub(crate) fn check_linkage(receipt: &InstallReceipt, linkage: Linkage) -> Result<()> {
    let forbidden = match linkage {
        Linkage::Shared => LibraryFlavor::Static,
        Linkage::Static => LibraryFlavor::Shared,
    };

    let offenders: Vec<String> = receipt
        .library_files()
        .filter(|f| library_flavor(f) == Some(forbidden))
        .map(|f| f.display().to_string())
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(Error::LinkageViolation(format!(
            "{} build installed {}",
            linkage,
            offenders.join(", ")
        )))
    }
}

/// Whether `dir` holds nothing
pub(super) fn is_empty_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    Ok(WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().next().is_none())
}
