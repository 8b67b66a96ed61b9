// src/cli.rs
//! CLI definitions for galley
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "galley")]
#[command(author = "Galley Contributors")]
#[command(version)]
#[command(about = "Recipe-driven build orchestrator for third-party native libraries", long_about = None)]
pub struct Cli {
    /// Kitchen configuration file (default: <config dir>/galley/galley.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a package from a recipe
    Cook {
        /// Recipe file or recipe directory
        recipe: PathBuf,

        /// Version to cook (default: newest declared)
        #[arg(long)]
        version: Option<String>,

        /// Option override, repeatable (e.g. -o shared=True)
        #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
        options: Vec<String>,

        /// Output directory for the package layout
        #[arg(long, default_value = "./packages")]
        output: PathBuf,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Keep the scratch build tree after completion
        #[arg(long)]
        keep_builddir: bool,

        /// Only use cached or local sources
        #[arg(long)]
        offline: bool,

        /// Write the artifact descriptor JSON to this file
        #[arg(long)]
        descriptor: Option<PathBuf>,
    },

    /// Fetch and patch a version without building
    Patch {
        /// Recipe file or recipe directory
        recipe: PathBuf,

        /// Version to patch (default: newest declared)
        #[arg(long)]
        version: Option<String>,

        /// Empty directory to unpack the patched source into
        #[arg(long)]
        dest: PathBuf,

        /// Only use cached or local sources
        #[arg(long)]
        offline: bool,
    },

    /// Print the artifact descriptor without building
    Info {
        /// Recipe file or recipe directory
        recipe: PathBuf,

        /// Version to describe (default: newest declared)
        #[arg(long)]
        version: Option<String>,

        /// Option override, repeatable (e.g. -o shared=True)
        #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
        options: Vec<String>,
    },

    /// List the versions a recipe declares
    Versions {
        /// Recipe file or recipe directory
        recipe: PathBuf,
    },

    /// Validate a recipe without building
    Validate {
        /// Recipe file or recipe directory
        recipe: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cook_options() {
        let cli = Cli::try_parse_from([
            "galley",
            "cook",
            "recipes/disruptor-cpp",
            "--version",
            "1.3.1",
            "-o",
            "shared=True",
            "-o",
            "fPIC=False",
        ])
        .unwrap();

        match cli.command {
            Commands::Cook {
                version, options, ..
            } => {
                assert_eq!(version.as_deref(), Some("1.3.1"));
                assert_eq!(options, vec!["shared=True", "fPIC=False"]);
            }
            _ => panic!("expected cook"),
        }
    }
}
