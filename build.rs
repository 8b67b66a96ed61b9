// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: recipe file or directory
fn recipe_arg() -> Arg {
    Arg::new("recipe")
        .required(true)
        .value_name("RECIPE")
        .help("Recipe file or recipe directory")
}

/// Common argument: version to operate on
fn version_arg() -> Arg {
    Arg::new("version")
        .long("version")
        .value_name("VERSION")
        .help("Recipe version (default: newest declared)")
}

/// Common argument: repeatable option override
fn option_arg() -> Arg {
    Arg::new("option")
        .short('o')
        .long("option")
        .value_name("NAME=VALUE")
        .action(ArgAction::Append)
        .help("Option override, repeatable")
}

fn offline_arg() -> Arg {
    Arg::new("offline")
        .long("offline")
        .action(ArgAction::SetTrue)
        .help("Only use cached or local sources")
}

fn build_cli() -> Command {
    Command::new("galley")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Galley Contributors")
        .about("Recipe-driven build orchestrator for third-party native libraries")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Kitchen configuration file"),
        )
        .subcommand(
            Command::new("cook")
                .about("Build a package from a recipe")
                .arg(recipe_arg())
                .arg(version_arg())
                .arg(option_arg())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .default_value("./packages")
                        .help("Output directory for the package layout"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help("Number of parallel build jobs"),
                )
                .arg(
                    Arg::new("keep_builddir")
                        .long("keep-builddir")
                        .action(ArgAction::SetTrue)
                        .help("Keep the scratch build tree after completion"),
                )
                .arg(offline_arg())
                .arg(
                    Arg::new("descriptor")
                        .long("descriptor")
                        .value_name("PATH")
                        .help("Write the artifact descriptor JSON to this file"),
                ),
        )
        .subcommand(
            Command::new("patch")
                .about("Fetch and patch a version without building")
                .arg(recipe_arg())
                .arg(version_arg())
                .arg(
                    Arg::new("dest")
                        .long("dest")
                        .required(true)
                        .value_name("DIR")
                        .help("Empty directory to unpack the patched source into"),
                )
                .arg(offline_arg()),
        )
        .subcommand(
            Command::new("info")
                .about("Print the artifact descriptor without building")
                .arg(recipe_arg())
                .arg(version_arg())
                .arg(option_arg()),
        )
        .subcommand(
            Command::new("versions")
                .about("List the versions a recipe declares")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a recipe without building")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("galley.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
