//! ---
//! hmon_section: "05-operator-tooling"
//! hmon_subsection: "binary"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Operator CLI for inspecting captured measurement batches."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hmon_common::config::{AppConfig, LoadedAppConfig};
use hmon_common::logging::{self, ConsoleTarget};
use tracing::info;

mod decode;
mod ingest;
mod inspect;
mod schemas;

/// Searched in order when neither `--config` nor `HMON_CONFIG` is given.
const CONFIG_CANDIDATES: &[&str] = &["configs/hmon.toml", "/etc/hmon/hmon.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "HMON telemetry batch inspection utility",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to HMON_CONFIG, then configs/hmon.toml).
    #[arg(long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dump the raw wire structure of a payload without any schema.
    Inspect(inspect::InspectCommand),
    /// Resolve a measurement batch against a schema document.
    Decode(decode::DecodeCommand),
    /// Replay a batch through the ingest pipeline with in-memory storage.
    Ingest(ingest::IngestCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_deref())?;

    match &loaded {
        Some(loaded) => {
            let mut logging = loaded.config.logging.clone();
            logging.console = ConsoleTarget::Stderr;
            logging::init_tracing("hmonctl", &logging)?;
            info!(config_path = %loaded.source.display(), "configuration loaded");
        }
        None => logging::init_cli(),
    }
    let config = loaded.map(|loaded| loaded.config).unwrap_or_default();

    match cli.command {
        Commands::Inspect(cmd) => cmd.execute()?,
        Commands::Decode(cmd) => cmd.execute(&config)?,
        Commands::Ingest(cmd) => cmd.execute(&config)?,
    }
    Ok(())
}

/// An explicit `--config` must exist; the implicit candidates may not.
fn load_config(explicit: Option<&Path>) -> Result<Option<LoadedAppConfig>> {
    match explicit {
        Some(path) => Ok(Some(LoadedAppConfig {
            config: AppConfig::from_path(path)?,
            source: path.to_path_buf(),
        })),
        None => AppConfig::load_optional(CONFIG_CANDIDATES),
    }
}

/// Read a captured payload, either raw bytes or hex text.
pub(crate) fn read_payload(path: &Path, hex_input: bool) -> Result<Vec<u8>> {
    let raw = fs::read(path).with_context(|| format!("unable to read {}", path.display()))?;
    if !hex_input {
        return Ok(raw);
    }
    let text = String::from_utf8(raw)
        .with_context(|| format!("{} is not a hex text file", path.display()))?;
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(&compact).with_context(|| format!("invalid hex in {}", path.display()))
}
