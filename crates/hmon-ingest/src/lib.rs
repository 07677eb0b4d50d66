//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Telemetry ingestion for HMON devices: schema documents, the TTL schema
//! cache, the batch pipeline, and its Prometheus instrumentation.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod schema;

pub use cache::{Clock, ManualClock, SchemaCache, SystemClock, DEFAULT_SCHEMA_TTL};
pub use error::{IngestError, PublishError, Result, SchemaError, SinkError};
pub use metrics::{new_registry, IngestMetrics, SharedRegistry};
pub use pipeline::{
    DeviceContext, EventPublisher, InMemoryTelemetrySink, IngestConfig, IngestReport,
    RecordingPublisher, TelemetryEvent, TelemetryIngestor, TelemetryRecord, TelemetrySink,
    DEFAULT_MAX_BODY_BYTES, TELEMETRY_TOPIC,
};
pub use schema::{InMemorySchemaStore, MeasurementSchema, SchemaStore};
