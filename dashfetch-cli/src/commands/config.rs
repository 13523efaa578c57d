//! Configuration CLI commands.
//!
//! Provides `config show` and `config path` for inspecting the effective
//! settings without editing the INI file by hand.

use std::path::Path;

use clap::Subcommand;
use dashfetch::config::{default_config_path, ConfigFile};

use crate::error::CliError;
use crate::runner::GlobalOptions;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(global: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => default_config_path().ok_or_else(|| {
            CliError::Config("could not determine the home directory".to_string())
        })?,
    };

    match command {
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Print every setting with its effective value.
fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    };

    println!("Configuration: {}", source);
    println!();
    println!("[download]");
    println!("  workers      = {}", config.download.workers);
    println!("  timeout_secs = {}", config.download.timeout_secs);
    println!(
        "  output_dir   = {}",
        display_or_unset(config.download.output_dir.as_deref())
    );
    println!("  quality      = {}", config.download.quality);
    println!();
    println!("[api]");
    println!("  base_url     = {}", config.api.base_url);
    println!(
        "  country_code = {}",
        config.api.country_code.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("[logging]");
    println!("  level        = {}", config.logging.level);
    println!(
        "  file         = {}",
        display_or_unset(config.logging.file.as_deref())
    );

    Ok(())
}

fn display_or_unset(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}
