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

use anyhow::{anyhow, Context, Result};
use clap::Args;
use hmon_common::AppConfig;
use hmon_ingest::{InMemorySchemaStore, MeasurementSchema, SchemaCache};

/// Where the schema for a batch comes from: an explicit document, or the
/// configured schema directory addressed by firmware identity.
#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Schema document (JSON) for the firmware that produced the batch.
    #[arg(
        long = "schema",
        value_name = "JSON",
        conflicts_with = "app",
        required_unless_present = "app"
    )]
    schema: Option<PathBuf>,

    /// Firmware application name, looked up in `schema_cache.schema_dir`.
    #[arg(long = "app", value_name = "NAME", requires = "app_version")]
    app: Option<String>,

    /// Firmware application version, looked up in `schema_cache.schema_dir`.
    #[arg(long = "app-version", value_name = "VERSION", requires = "app")]
    app_version: Option<String>,
}

/// Schema cache primed for one command, plus the identity it was asked for.
pub struct LoadedSchemas {
    pub cache: Arc<SchemaCache<InMemorySchemaStore>>,
    pub app_name: String,
    pub version: String,
}

impl LoadedSchemas {
    pub fn schema(&self) -> Result<Arc<MeasurementSchema>> {
        self.cache
            .get(&self.app_name, &self.version)?
            .ok_or_else(|| anyhow!("no schema registered for {}@{}", self.app_name, self.version))
    }
}

impl SchemaArgs {
    pub fn load(&self, config: &AppConfig) -> Result<LoadedSchemas> {
        let ttl = config.schema_cache.ttl;
        if let Some(path) = &self.schema {
            let schema = MeasurementSchema::from_path(path)
                .with_context(|| format!("invalid schema document {}", path.display()))?;
            let cache = SchemaCache::new(InMemorySchemaStore::new(), ttl);
            let schema = cache.save(schema)?;
            return Ok(LoadedSchemas {
                cache: Arc::new(cache),
                app_name: schema.app_name.clone(),
                version: schema.version.clone(),
            });
        }

        let (Some(app_name), Some(version)) = (&self.app, &self.app_version) else {
            return Err(anyhow!("either --schema or --app with --app-version is required"));
        };
        let dir = config
            .schema_cache
            .schema_dir
            .as_deref()
            .ok_or_else(|| anyhow!("--app needs schema_cache.schema_dir in the configuration"))?;
        let store = InMemorySchemaStore::from_dir(dir)
            .with_context(|| format!("failed to load schemas from {}", dir.display()))?;
        Ok(LoadedSchemas {
            cache: Arc::new(SchemaCache::new(store, ttl)),
            app_name: app_name.clone(),
            version: version.clone(),
        })
    }
}
