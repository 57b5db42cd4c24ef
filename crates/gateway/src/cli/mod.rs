//! Command-line surface. Pared down from the teacher's `Cli`/`Command` to
//! what a governance gateway actually needs to operate: serve, validate
//! config, and print the effective config.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sark_domain::config::Config;

#[derive(Debug, Parser)]
#[command(name = "sark-gateway", about = "SARK protocol-agnostic governance gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "sark.toml")]
    pub config: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default).
    Serve,
    /// Validate the config file and exit non-zero on error.
    ConfigValidate,
    /// Print the effective (defaults-merged) config as TOML.
    ConfigShow,
    Version,
}

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).map_err(|e| anyhow::anyhow!(e))
}
