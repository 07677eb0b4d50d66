//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Measurement batch ingestion.
//!
//! The pipeline takes the raw body a device posted, resolves it against the
//! schema registered for the device's firmware, stores one record per
//! reading, and announces the batch on the event bus. Transport and
//! authentication live outside this crate; callers hand in an already
//! authenticated [`DeviceContext`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmon_common::IngestSettings;
use hmon_proto::{resolve_batch, SkipReason};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::{Clock, SchemaCache, SystemClock};
use crate::error::{IngestError, PublishError, Result, SinkError};
use crate::metrics::IngestMetrics;
use crate::schema::SchemaStore;

pub use hmon_common::config::{
    DEFAULT_MAX_BODY_BYTES, DEFAULT_TELEMETRY_TOPIC as TELEMETRY_TOPIC,
};

/// Identity of the device that posted a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceContext {
    pub device_id: String,
    pub app_name: String,
    pub app_version: String,
}

impl DeviceContext {
    pub fn new(
        device_id: impl Into<String>,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            app_name: app_name.into(),
            app_version: app_version.into(),
        }
    }
}

/// One stored reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    /// Measurement name from the schema.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

/// Announcement published once per ingested batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub device_id: String,
    pub app_name: String,
    pub app_version: String,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one successful ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub stored: usize,
    pub skipped_unknown: usize,
    pub skipped_empty: usize,
    pub storage_failures: usize,
    pub timestamp: DateTime<Utc>,
}

/// Destination for telemetry records. Returns the id assigned to the record.
pub trait TelemetrySink: Send + Sync {
    fn save(&self, record: &TelemetryRecord) -> std::result::Result<String, SinkError>;
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn save(&self, record: &TelemetryRecord) -> std::result::Result<String, SinkError> {
        (**self).save(record)
    }
}

impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        (**self).publish(topic, payload)
    }
}

/// Pipeline limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub max_body_bytes: usize,
    pub telemetry_topic: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for IngestConfig {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            max_body_bytes: settings.max_body_bytes,
            telemetry_topic: settings.telemetry_topic.clone(),
        }
    }
}

pub struct TelemetryIngestor<S, T, P, C = SystemClock> {
    schemas: Arc<SchemaCache<S, C>>,
    sink: T,
    publisher: P,
    config: IngestConfig,
    metrics: Option<IngestMetrics>,
}

impl<S, T, P, C> TelemetryIngestor<S, T, P, C>
where
    S: SchemaStore,
    T: TelemetrySink,
    P: EventPublisher,
    C: Clock,
{
    pub fn new(schemas: Arc<SchemaCache<S, C>>, sink: T, publisher: P, config: IngestConfig) -> Self {
        Self {
            schemas,
            sink,
            publisher,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: IngestMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn schemas(&self) -> &Arc<SchemaCache<S, C>> {
        &self.schemas
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Decode, store, and announce one measurement batch.
    ///
    /// Framing errors reject the whole batch before anything is stored.
    /// Individual storage or publish failures are logged and do not fail
    /// the call.
    pub fn ingest(&self, device: &DeviceContext, body: &[u8]) -> Result<IngestReport> {
        if body.len() > self.config.max_body_bytes {
            warn!(
                device_id = %device.device_id,
                size = body.len(),
                max = self.config.max_body_bytes,
                "measurement batch rejected: body too large"
            );
            return Err(IngestError::BodyTooLarge {
                size: body.len(),
                max: self.config.max_body_bytes,
            });
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe_batch_size(body.len());
        }

        let schema = self
            .schemas
            .get(&device.app_name, &device.app_version)?
            .ok_or_else(|| IngestError::SchemaNotFound {
                app: device.app_name.clone(),
                version: device.app_version.clone(),
            })?;
        let lookup = schema.lookup();

        let now = self.schemas.clock().now();
        let resolved = match resolve_batch(body, &lookup, now) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(
                    device_id = %device.device_id,
                    kind = err.kind(),
                    error = %err,
                    "measurement batch rejected: decode failed"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.inc_decode_error(err.kind());
                }
                return Err(err.into());
            }
        };

        let mut stored = 0;
        let mut storage_failures = 0;
        for reading in &resolved.readings {
            let record = TelemetryRecord {
                device_id: device.device_id.clone(),
                timestamp: resolved.timestamp,
                kind: reading.name.clone(),
                value: reading.value,
                unit: reading.unit.clone(),
                created_at: now,
            };
            match self.sink.save(&record) {
                Ok(record_id) => {
                    debug!(record_id = %record_id, measurement = %reading.name, "telemetry record stored");
                    stored += 1;
                }
                Err(err) => {
                    error!(
                        device_id = %device.device_id,
                        measurement = %reading.name,
                        error = %err,
                        "failed to save telemetry"
                    );
                    storage_failures += 1;
                }
            }
        }

        let event = TelemetryEvent {
            device_id: device.device_id.clone(),
            app_name: device.app_name.clone(),
            app_version: device.app_version.clone(),
            count: stored,
            timestamp: resolved.timestamp,
        };
        let payload =
            serde_json::to_vec(&event).map_err(|err| IngestError::Publish(err.to_string()))?;
        if let Err(err) = self.publisher.publish(&self.config.telemetry_topic, &payload) {
            warn!(device_id = %device.device_id, error = %err, "failed to publish telemetry event");
        }

        let report = IngestReport {
            stored,
            skipped_unknown: resolved.skipped_count(SkipReason::UnknownId),
            skipped_empty: resolved.skipped_count(SkipReason::MissingValue),
            storage_failures,
            timestamp: resolved.timestamp,
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_batches_decoded();
            metrics.add_stored(report.stored);
            metrics.add_skipped(SkipReason::UnknownId, report.skipped_unknown);
            metrics.add_skipped(SkipReason::MissingValue, report.skipped_empty);
        }

        info!(
            device_id = %device.device_id,
            measurements = report.stored,
            timestamp = %report.timestamp,
            "telemetry batch processed"
        );
        Ok(report)
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemoryTelemetrySink {
    records: Mutex<Vec<TelemetryRecord>>,
    fail_kinds: Mutex<Vec<String>>,
}

impl InMemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future record with this measurement name.
    pub fn fail_on(&self, kind: impl Into<String>) {
        self.fail_kinds.lock().push(kind.into());
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn save(&self, record: &TelemetryRecord) -> std::result::Result<String, SinkError> {
        if self.fail_kinds.lock().iter().any(|kind| kind == &record.kind) {
            return Err(SinkError(format!("writes for '{}' are disabled", record.kind)));
        }
        let mut records = self.records.lock();
        records.push(record.clone());
        Ok(format!("record-{}", records.len()))
    }
}

/// Publisher that remembers every message, optionally failing all of them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) -> std::result::Result<(), PublishError> {
        if self.fail {
            return Err(PublishError {
                topic: topic.to_owned(),
                reason: "bus unavailable".to_owned(),
            });
        }
        self.messages
            .lock()
            .push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }
}
