mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "portico",
    version,
    about = "Inspect and live-reload installed portico components"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover component packages in site directories
    Scan {
        /// Site directory to scan (repeatable; defaults to PORTICO_SITE_DIRS)
        #[arg(long = "site-dir")]
        site_dirs: Vec<PathBuf>,
        /// Maximum concurrent package scans
        #[arg(long)]
        workers: Option<usize>,
        /// Print machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Validate a component manifest and resolve its assets
    Check {
        /// Path to a portico.toml manifest
        manifest: PathBuf,
        /// Asset root (default: the manifest's directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Start a dev-mode host and log component changes until Ctrl-C
    Watch {
        /// Path to runtime config TOML file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Scan {
            site_dirs,
            workers,
            json,
        } => commands::scan::execute(site_dirs, workers, json).await,
        Commands::Check { manifest, root } => commands::check::execute(&manifest, root.as_deref()),
        Commands::Watch { config } => commands::watch::execute(config.as_deref()).await,
    }
}
