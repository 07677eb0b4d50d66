//! ---
//! hmon_section: "01-core-functionality"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Shared configuration and logging primitives."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Shared primitives for the HMON telemetry workspace.
//! This crate exposes configuration loading, the shared ingest defaults,
//! and tracing initialisation consumed by the ingest pipeline and `hmonctl`.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, IngestSettings, LoadedAppConfig, LoggingConfig, MetricsConfig, SchemaCacheConfig,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_SCHEMA_TTL, DEFAULT_TELEMETRY_TOPIC,
};
pub use logging::{init_cli, init_tracing, ConsoleTarget, LogFormat};
