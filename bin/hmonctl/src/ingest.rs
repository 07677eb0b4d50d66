//! ---
//! hmon_section: "05-operator-tooling"
//! hmon_subsection: "binary"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Operator CLI for inspecting captured measurement batches."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use hmon_common::AppConfig;
use hmon_ingest::{
    new_registry, DeviceContext, InMemoryTelemetrySink, IngestConfig, IngestMetrics,
    RecordingPublisher, TelemetryEvent, TelemetryIngestor,
};
use prometheus::TextEncoder;
use serde_json::json;

use crate::schemas::SchemaArgs;

/// Runs the same pipeline as the service, with the configured limits and
/// topic, but keeps records and events in memory and prints them.
#[derive(Debug, Args)]
pub struct IngestCommand {
    /// Captured measurement batch.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Device id attached to the stored records.
    #[arg(long = "device", value_name = "ID", default_value = "hmonctl")]
    device: String,

    #[command(flatten)]
    schema: SchemaArgs,

    /// Treat the batch file as hex text instead of raw bytes.
    #[arg(long = "hex", action = clap::ArgAction::SetTrue)]
    hex: bool,
}

impl IngestCommand {
    pub fn execute(self, config: &AppConfig) -> Result<()> {
        let schemas = self.schema.load(config)?;
        let payload = crate::read_payload(&self.file, self.hex)?;

        let sink = Arc::new(InMemoryTelemetrySink::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let mut ingestor = TelemetryIngestor::new(
            Arc::clone(&schemas.cache),
            Arc::clone(&sink),
            Arc::clone(&publisher),
            IngestConfig::from(&config.ingest),
        );
        let registry = if config.metrics.enabled {
            let registry = new_registry();
            ingestor = ingestor.with_metrics(IngestMetrics::new(registry.clone())?);
            Some(registry)
        } else {
            None
        };

        let device = DeviceContext::new(&self.device, &schemas.app_name, &schemas.version);
        let report = ingestor
            .ingest(&device, &payload)
            .with_context(|| format!("failed to ingest {}", self.file.display()))?;

        let events = publisher
            .messages()
            .into_iter()
            .map(|(topic, payload)| {
                let event: TelemetryEvent = serde_json::from_slice(&payload)?;
                Ok(json!({ "topic": topic, "event": event }))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut output = json!({
            "report": report,
            "records": sink.records(),
            "events": events,
        });
        if let Some(registry) = registry {
            let metrics = TextEncoder::new().encode_to_string(&registry.gather())?;
            output["metrics"] = serde_json::Value::String(metrics);
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
