//! vdrlink command-line entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Upload one document into a virtual data room.
#[derive(Debug, Parser)]
#[command(name = "vdrlink", version, about)]
pub struct Cli {
    /// File to upload.
    pub file: PathBuf,

    /// Destination project id.
    #[arg(long)]
    pub project: String,

    /// Destination folder id.
    #[arg(long)]
    pub folder: String,

    /// Document name in the data room (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,

    /// Configuration file (defaults to the per-user config path).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Service API root; overrides the config file.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Bearer token; overrides the config file.
    #[arg(long, env = "VDR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Whole-file attempts before giving up; overrides the config file.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Do not send per-chunk SHA-256 checksums.
    #[arg(long)]
    pub no_checksums: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    config.apply_overrides(&cli);
    config.validate()?;
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let document = rt.block_on(app::run(&config, &cli))?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
