//! ---
//! hmon_section: "05-operator-tooling"
//! hmon_subsection: "integration-tests"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Operator CLI for inspecting captured measurement batches."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use hmon_proto::{MeasurementBatchBuilder, MeasurementValue};

const SCHEMA: &str = r#"{
    "app_name": "weather-station",
    "version": "1.2.0",
    "measurements": {
        "temperature": { "id": 2, "type": "float", "unit": "celsius" },
        "timestamp": { "id": 3, "type": "uint64", "unit": "ms" }
    }
}"#;

fn fixture() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let mut batch = MeasurementBatchBuilder::new();
    batch
        .push(2, MeasurementValue::Float32(23.5))
        .push(3, MeasurementValue::Uint64(1_700_000_000_000))
        .push(77, MeasurementValue::Bool(true));
    let batch_path = dir.path().join("batch.hex");
    fs::write(&batch_path, hex::encode(batch.finish())).unwrap();
    let schema_path = dir.path().join("schema.json");
    fs::write(&schema_path, SCHEMA).unwrap();
    (dir, batch_path, schema_path)
}

/// Writes a config whose schema_dir holds the fixture schema and whose logs
/// land inside the temp dir.
fn write_config(dir: &Path, metrics_enabled: bool, max_body_bytes: usize) -> PathBuf {
    let schemas = dir.join("schemas");
    fs::create_dir_all(&schemas).unwrap();
    fs::write(schemas.join("weather-station-1.2.0.json"), SCHEMA).unwrap();

    let config = format!(
        r#"
[logging]
directory = {logs:?}
format = "pretty"

[ingest]
max_body_bytes = {max_body_bytes}
telemetry_topic = "bench-telemetry"

[schema_cache]
ttl = 60
schema_dir = {schemas:?}

[metrics]
enabled = {metrics_enabled}
"#,
        logs = dir.join("logs").display().to_string(),
        schemas = schemas.display().to_string(),
    );
    let path = dir.join("hmon.toml");
    fs::write(&path, config).unwrap();
    path
}

fn hmonctl() -> Command {
    let mut cmd = Command::cargo_bin("hmonctl").unwrap();
    cmd.env_remove("HMON_CONFIG");
    cmd
}

#[test]
fn decode_prints_json_readings() {
    let (_dir, batch, schema) = fixture();
    let output = hmonctl()
        .args(["decode", "--hex", "--format", "json", "--schema"])
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(output.status.success());

    let resolved: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resolved["readings"][0]["name"], "temperature");
    assert_eq!(resolved["readings"][0]["value"], 23.5);
    assert_eq!(resolved["timestamp_source"], "payload");
    assert_eq!(resolved["timestamp"], "2023-11-14T22:13:20Z");
    assert_eq!(resolved["skipped"][0]["id"], 77);
    assert_eq!(resolved["skipped"][0]["reason"], "unknown_id");
}

#[test]
fn decode_table_lists_skipped_ids() {
    let (_dir, batch, schema) = fixture();
    let output = hmonctl()
        .args(["decode", "--hex", "--schema"])
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("weather-station@1.2.0"));
    assert!(stdout.contains("temperature"));
    assert!(stdout.contains("skipped: unknown_id"));
}

#[test]
fn inspect_reports_truncated_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.bin");
    fs::write(&path, [0x0Au8, 0x05, 0x01]).unwrap();

    let output = hmonctl()
        .arg("inspect")
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("not a valid wire payload"));
}

#[test]
fn decode_finds_schema_by_app_in_configured_dir() {
    let (dir, batch, _schema) = fixture();
    let config = write_config(dir.path(), true, 1024);

    let output = hmonctl()
        .arg("--config")
        .arg(&config)
        .args(["decode", "--hex", "--format", "json"])
        .args(["--app", "weather-station", "--app-version", "1.2.0"])
        .arg(&batch)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let resolved: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(resolved["readings"][0]["name"], "temperature");
    assert!(dir.path().join("logs").is_dir());
}

#[test]
fn decode_reports_unregistered_firmware() {
    let (dir, batch, _schema) = fixture();
    let config = write_config(dir.path(), true, 1024);

    let output = hmonctl()
        .arg("--config")
        .arg(&config)
        .args(["decode", "--hex", "--app", "weather-station", "--app-version", "9.9.9"])
        .arg(&batch)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no schema registered for weather-station@9.9.9"));
}

#[test]
fn decode_by_app_without_schema_dir_fails() {
    let (_dir, batch, _schema) = fixture();
    let output = hmonctl()
        .args(["decode", "--hex", "--app", "weather-station", "--app-version", "1.2.0"])
        .arg(&batch)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("schema_cache.schema_dir"));
}

#[test]
fn decode_rejects_schema_together_with_app() {
    let (_dir, batch, schema) = fixture();
    let output = hmonctl()
        .args(["decode", "--hex", "--app", "weather-station", "--app-version", "1.2.0"])
        .arg("--schema")
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn ingest_uses_configured_topic_and_exports_metrics() {
    let (dir, batch, _schema) = fixture();
    let config = write_config(dir.path(), true, 1024);

    let output = hmonctl()
        .arg("--config")
        .arg(&config)
        .args(["ingest", "--hex", "--device", "ws-01"])
        .args(["--app", "weather-station", "--app-version", "1.2.0"])
        .arg(&batch)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["report"]["stored"], 1);
    assert_eq!(result["report"]["skipped_unknown"], 1);
    assert_eq!(result["records"][0]["device_id"], "ws-01");
    assert_eq!(result["records"][0]["type"], "temperature");
    assert_eq!(result["events"][0]["topic"], "bench-telemetry");
    assert_eq!(result["events"][0]["event"]["count"], 1);

    let metrics = result["metrics"].as_str().unwrap();
    assert!(metrics.contains("hmon_measurements_stored_total 1"));
    assert!(metrics.contains("hmon_batches_decoded_total 1"));
}

#[test]
fn ingest_omits_metrics_when_disabled() {
    let (dir, batch, schema) = fixture();
    let config = write_config(dir.path(), false, 1024);

    let output = hmonctl()
        .arg("--config")
        .arg(&config)
        .args(["ingest", "--hex", "--schema"])
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["report"]["stored"], 1);
    assert!(result.get("metrics").is_none());
}

#[test]
fn ingest_enforces_configured_body_limit() {
    let (dir, batch, schema) = fixture();
    let config = write_config(dir.path(), true, 4);

    let output = hmonctl()
        .arg("--config")
        .arg(&config)
        .args(["ingest", "--hex", "--schema"])
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn explicit_config_must_exist() {
    let (dir, batch, schema) = fixture();
    let output = hmonctl()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .args(["decode", "--hex", "--schema"])
        .arg(&schema)
        .arg(&batch)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unable to read config file"));
}
