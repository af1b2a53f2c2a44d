//! cityscope CLI - inspect the layer catalog, extract features and run a
//! sync session against a city boundary.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::extract::ExtractArgs;
use commands::sync::SyncArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "cityscope")]
#[command(about = "Sync OpenStreetMap feature layers for a city and cluster them for display", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug-level logging
    #[arg(long, global = true)]
    debug: bool,

    /// Mirror log output to stdout
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in layer catalog
    Layers,

    /// Extract one layer for a city boundary
    Extract(ExtractArgs),

    /// Sync a set of layers for a city and print the resulting clusters
    Sync(SyncArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Layers => commands::layers::run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Extract(args) => commands::extract::run(args, cli.debug, cli.verbose).await,
        Commands::Sync(args) => commands::sync::run(args, cli.debug, cli.verbose).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
