//! CLI argument parsing and subcommand dispatch.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mcore::MeshworkConfig;
use std::path::PathBuf;

pub mod config;
pub mod demo;
pub mod pack;
pub mod serve;

/// Meshwork compute workers.
#[derive(Parser, Debug)]
#[command(name = "meshwork", about = "Meshwork slicing compute workers")]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a primary worker speaking framed JSON on stdin/stdout.
    Serve,
    /// Lay out rectangular blocks read from a JSON file.
    Pack(PackArgs),
    /// Load synthetic widgets into a local worker and compute traces
    /// and supports.
    Demo {
        /// Number of widgets to load.
        #[arg(long, default_value_t = 4)]
        widgets: u64,
    },
    /// Inspect configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

/// Arguments of `meshwork pack`.
#[derive(Args, Debug)]
pub struct PackArgs {
    /// Target area width.
    #[arg(long)]
    pub width: f64,
    /// Target area height.
    #[arg(long)]
    pub height: f64,
    /// Gap around each block; defaults to `[pack] spacing`.
    #[arg(long)]
    pub spacing: Option<f64>,
    /// Use shelf packing instead of guillotine packing.
    #[arg(long)]
    pub shelf: bool,
    /// Sort blocks by decreasing area first.
    #[arg(long)]
    pub sort: bool,
    /// JSON array of `{"w": .., "h": ..}` blocks.
    pub blocks: PathBuf,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML.
    Show,
}

impl Cli {
    /// The config named by `--config`, or the defaults.
    pub fn load_config(&self) -> Result<MeshworkConfig> {
        match &self.config {
            Some(path) => MeshworkConfig::load(path),
            None => Ok(MeshworkConfig::default()),
        }
    }

    /// Run the selected subcommand.
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        match self.command {
            Command::Serve => serve::run(&config).await,
            Command::Pack(args) => pack::run(&config, &args),
            Command::Demo { widgets } => demo::run(&config, widgets).await,
            Command::Config { action } => config::run(&action, &config),
        }
    }
}
