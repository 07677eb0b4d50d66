//! ---
//! hmon_section: "05-operator-tooling"
//! hmon_subsection: "binary"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Operator CLI for inspecting captured measurement batches."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use hmon_common::AppConfig;
use hmon_ingest::MeasurementSchema;
use hmon_proto::{resolve_batch, ResolvedBatch, TimestampSource};

use crate::schemas::SchemaArgs;

#[derive(Debug, Args)]
pub struct DecodeCommand {
    /// Captured measurement batch.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    schema: SchemaArgs,

    /// Treat the batch file as hex text instead of raw bytes.
    #[arg(long = "hex", action = clap::ArgAction::SetTrue)]
    hex: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

impl DecodeCommand {
    pub fn execute(self, config: &AppConfig) -> Result<()> {
        let schema = self.schema.load(config)?.schema()?;
        let payload = crate::read_payload(&self.file, self.hex)?;
        let resolved = resolve_batch(&payload, &schema.lookup(), Utc::now())
            .with_context(|| format!("failed to decode {}", self.file.display()))?;

        let rendered = match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&resolved)?,
            OutputFormat::Table => render_table(&schema, &resolved),
        };
        println!("{rendered}");
        Ok(())
    }
}

fn render_table(schema: &MeasurementSchema, resolved: &ResolvedBatch) -> String {
    let mut out = String::new();
    let source = match resolved.timestamp_source {
        TimestampSource::Payload => "payload",
        TimestampSource::Fallback => "local clock",
    };
    let _ = writeln!(out, "schema:    {}@{}", schema.app_name, schema.version);
    let _ = writeln!(
        out,
        "timestamp: {} ({source})",
        resolved.timestamp.to_rfc3339()
    );
    let _ = writeln!(out, "{:>6}  {:<24} {:>16}  UNIT", "ID", "NAME", "VALUE");
    for reading in &resolved.readings {
        let _ = writeln!(
            out,
            "{:>6}  {:<24} {:>16}  {}",
            reading.id, reading.name, reading.value, reading.unit
        );
    }
    for skipped in &resolved.skipped {
        let _ = writeln!(out, "{:>6}  skipped: {}", skipped.id, skipped.reason.as_str());
    }
    out.trim_end().to_owned()
}
