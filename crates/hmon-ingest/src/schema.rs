//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Measurement schema documents and the store they live in.
//!
//! A schema maps the numeric measurement ids a device firmware emits to
//! names and units for one `(app_name, version)` pair.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hmon_proto::{MeasurementMeta, SchemaLookup};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SchemaError;

/// Schema document uploaded for one firmware application version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSchema {
    pub app_name: String,
    pub version: String,
    pub measurements: IndexMap<String, MeasurementMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MeasurementSchema {
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            measurements: IndexMap::new(),
            created_at: None,
        }
    }

    /// Builder-style helper keyed by the measurement name.
    pub fn with_measurement(mut self, meta: MeasurementMeta) -> Self {
        self.measurements.insert(meta.name.clone(), meta);
        self
    }

    /// Parse and validate a JSON schema document.
    ///
    /// Entries without an explicit `name` take the name of their map key.
    pub fn from_json_str(json: &str) -> Result<Self, SchemaError> {
        let mut schema: MeasurementSchema = serde_json::from_str(json)?;
        for (key, meta) in schema.measurements.iter_mut() {
            if meta.name.is_empty() {
                meta.name = key.clone();
            }
        }
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(schema_path = %path.display(), "parsing schema document");
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.app_name.trim().is_empty() || self.version.trim().is_empty() {
            return Err(SchemaError::MissingIdentity);
        }
        if self.measurements.is_empty() {
            return Err(SchemaError::Empty {
                app_name: self.app_name.clone(),
                version: self.version.clone(),
            });
        }
        let mut seen: HashMap<u32, &str> = HashMap::with_capacity(self.measurements.len());
        for meta in self.measurements.values() {
            if let Some(first) = seen.insert(meta.id, &meta.name) {
                return Err(SchemaError::DuplicateId {
                    id: meta.id,
                    first: first.to_owned(),
                    second: meta.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Id-keyed view used by the measurement resolver.
    pub fn lookup(&self) -> SchemaLookup {
        self.measurements
            .values()
            .map(|meta| (meta.id, meta.clone()))
            .collect()
    }
}

/// Persistent home of schema documents.
pub trait SchemaStore: Send + Sync {
    fn get(&self, app_name: &str, version: &str) -> Result<Option<MeasurementSchema>, SchemaError>;
    fn save(&self, schema: &MeasurementSchema) -> Result<(), SchemaError>;
}

type SchemaKey = (String, String);

/// Process-local store, used for tests and for schemas preloaded from disk.
#[derive(Debug, Default)]
pub struct InMemorySchemaStore {
    schemas: RwLock<HashMap<SchemaKey, MeasurementSchema>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` document in `dir`, in file name order. Two
    /// documents declaring the same `(app_name, version)` are an error.
    pub fn from_dir(dir: &Path) -> Result<Self, SchemaError> {
        let io_error = |source: std::io::Error| SchemaError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = fs::read_dir(dir)
            .map_err(io_error)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_error)?;
        paths.retain(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"));
        paths.sort();

        let store = Self::new();
        let mut origins: HashMap<SchemaKey, PathBuf> = HashMap::with_capacity(paths.len());
        for path in paths {
            let schema = MeasurementSchema::from_path(&path)?;
            let key = (schema.app_name.clone(), schema.version.clone());
            if let Some(first) = origins.get(&key) {
                warn!(
                    app_name = %schema.app_name,
                    version = %schema.version,
                    first = %first.display(),
                    second = %path.display(),
                    "duplicate schema document"
                );
                return Err(SchemaError::DuplicateSchema {
                    app_name: schema.app_name,
                    version: schema.version,
                    first: first.clone(),
                    second: path,
                });
            }
            store.save(&schema)?;
            origins.insert(key, path);
        }
        info!(schema_dir = %dir.display(), schemas = store.len(), "schema documents loaded");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

impl SchemaStore for InMemorySchemaStore {
    fn get(&self, app_name: &str, version: &str) -> Result<Option<MeasurementSchema>, SchemaError> {
        Ok(self
            .schemas
            .read()
            .get(&(app_name.to_owned(), version.to_owned()))
            .cloned())
    }

    fn save(&self, schema: &MeasurementSchema) -> Result<(), SchemaError> {
        schema.validate()?;
        self.schemas.write().insert(
            (schema.app_name.clone(), schema.version.clone()),
            schema.clone(),
        );
        Ok(())
    }
}
