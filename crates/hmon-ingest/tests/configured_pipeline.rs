//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "integration-tests"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;

use hmon_common::AppConfig;
use hmon_ingest::{
    DeviceContext, InMemorySchemaStore, InMemoryTelemetrySink, IngestConfig, IngestError,
    RecordingPublisher, SchemaCache, TelemetryEvent, TelemetryIngestor,
};
use hmon_proto::{MeasurementBatchBuilder, MeasurementValue};

const GREENHOUSE_SCHEMA: &str = r#"{
    "app_name": "greenhouse",
    "version": "0.4.1",
    "measurements": {
        "soil_moisture": { "id": 10, "type": "uint32", "unit": "percent" },
        "lamp_on": { "id": 11, "type": "bool", "unit": "" },
        "timestamp": { "id": 12, "type": "int64", "unit": "ms" }
    }
}"#;

#[test]
fn pipeline_built_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let schema_dir = dir.path().join("schemas");
    fs::create_dir(&schema_dir).unwrap();
    fs::write(schema_dir.join("greenhouse.json"), GREENHOUSE_SCHEMA).unwrap();

    let config_path = dir.path().join("hmon.toml");
    fs::write(
        &config_path,
        format!(
            "[ingest]\ntelemetry_topic = \"greenhouse-events\"\n\n[schema_cache]\nttl = 300\nschema_dir = {:?}\n",
            schema_dir.display().to_string()
        ),
    )
    .unwrap();

    let config = AppConfig::from_path(&config_path).unwrap();
    let store = InMemorySchemaStore::from_dir(config.schema_cache.schema_dir.as_deref().unwrap())
        .unwrap();
    let cache = Arc::new(SchemaCache::new(store, config.schema_cache.ttl));
    let sink = Arc::new(InMemoryTelemetrySink::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let ingestor = TelemetryIngestor::new(
        cache,
        Arc::clone(&sink),
        Arc::clone(&publisher),
        IngestConfig::from(&config.ingest),
    );

    let mut batch = MeasurementBatchBuilder::new();
    batch
        .push(12, MeasurementValue::Int64(1_717_171_717_000))
        .push(10, MeasurementValue::Uint32(37))
        .push(11, MeasurementValue::Bool(true));
    let device = DeviceContext::new("gh-01", "greenhouse", "0.4.1");

    let report = ingestor.ingest(&device, &batch.finish()).unwrap();
    assert_eq!(report.stored, 2);
    assert_eq!(report.timestamp.timestamp_millis(), 1_717_171_717_000);

    let values: Vec<_> = sink
        .records()
        .into_iter()
        .map(|record| (record.kind, record.value))
        .collect();
    assert_eq!(
        values,
        vec![("soil_moisture".to_owned(), 37.0), ("lamp_on".to_owned(), 1.0)]
    );

    let (topic, payload) = publisher.messages().remove(0);
    assert_eq!(topic, "greenhouse-events");
    let event: TelemetryEvent = serde_json::from_slice(&payload).unwrap();
    assert_eq!(event.device_id, "gh-01");
    assert_eq!(event.count, 2);
}

#[test]
fn schema_saved_through_cache_is_visible_to_pipeline() {
    let cache = Arc::new(SchemaCache::new(
        InMemorySchemaStore::new(),
        hmon_ingest::DEFAULT_SCHEMA_TTL,
    ));
    let ingestor = TelemetryIngestor::new(
        Arc::clone(&cache),
        InMemoryTelemetrySink::new(),
        RecordingPublisher::new(),
        IngestConfig::default(),
    );
    let device = DeviceContext::new("gh-02", "greenhouse", "0.4.1");

    let err = ingestor.ingest(&device, &[]).unwrap_err();
    assert!(matches!(err, IngestError::SchemaNotFound { .. }));

    cache
        .save(hmon_ingest::MeasurementSchema::from_json_str(GREENHOUSE_SCHEMA).unwrap())
        .unwrap();
    let report = ingestor.ingest(&device, &[]).unwrap();
    assert_eq!(report.stored, 0);
}
