//! storyreload - live-reloading build pipeline for component catalogs.

mod actor;
mod builder;
mod cli;
mod config;
mod core;
mod logger;
mod reload;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ReloadConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ReloadConfig::load(&cli)?;
    debug!("config"; "{}", config.config_path.as_ref().map_or_else(
        || "defaults (no config file)".to_string(),
        |p| p.display().to_string(),
    ));

    match &cli.command {
        Commands::Build { package, output } => cli::build::build_once(&config, package, output),
        Commands::Serve { .. } => cli::serve::serve(config),
        Commands::Classify { paths } => {
            cli::classify::classify_paths(&config, paths);
            Ok(())
        }
    }
}
