// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::io;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Cook {
            recipe,
            version,
            options,
            output,
            jobs,
            keep_builddir,
            offline,
            descriptor,
        } => commands::cmd_cook(
            commands::CookArgs {
                recipe,
                version,
                options,
                output,
                jobs,
                keep_builddir,
                offline,
                descriptor,
            },
            config,
        ),
        Commands::Patch {
            recipe,
            version,
            dest,
            offline,
        } => commands::cmd_patch(&recipe, version.as_deref(), &dest, offline, config),
        Commands::Info {
            recipe,
            version,
            options,
        } => commands::cmd_info(&recipe, version.as_deref(), &options, config),
        Commands::Versions { recipe } => commands::cmd_versions(&recipe),
        Commands::Validate { recipe } => commands::cmd_validate(&recipe),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "galley", &mut io::stdout());
            Ok(())
        }
    }
}
