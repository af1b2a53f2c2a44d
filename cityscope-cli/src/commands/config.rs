//! Config command - manage the configuration file.

use clap::Subcommand;

use cityscope::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the config file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write the default config file if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init => run_init(),
    }
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", config.to_config_string());
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }
    let path = ConfigFile::ensure_exists()?;
    println!("Created config file: {}", path.display());
    Ok(())
}
