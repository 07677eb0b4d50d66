//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Schema-less decoding of device telemetry batches.
//!
//! Devices post protobuf-encoded measurement batches, but the backend has no
//! generated code for them. This crate frames the raw bytes using only the
//! wire rules, then resolves measurements against a schema supplied at
//! runtime:
//!
//! - [`wire`] splits a buffer into generic `(field_number, payload)` fields
//! - [`value`] reinterprets payloads as floats, integers, strings, messages
//! - [`repeated`] pulls repeated embedded messages out of an envelope
//! - [`measurement`] selects each measurement's value and emits readings
//! - [`encode`] writes the same format, for fixtures and replay tooling
//!
//! Nothing here performs I/O or keeps state between calls.

pub mod encode;
pub mod error;
pub mod measurement;
pub mod repeated;
pub mod value;
pub mod varint;
pub mod wire;

pub use encode::{MeasurementBatchBuilder, WireWriter};
pub use error::{DecodeError, Result};
pub use measurement::{
    decode_measurement, decode_measurements, find_timestamp, resolve_batch,
    resolve_measurements, select_value, Measurement, MeasurementMeta, MeasurementValue, Reading,
    ResolvedBatch, SchemaLookup, SkipReason, SkippedMeasurement, TimestampSource, ValueKind,
    ENVELOPE_FIELD, MEASUREMENT_ID_FIELD, TIMESTAMP_MEASUREMENT,
};
pub use repeated::decode_repeated;
pub use wire::{decode, FieldPayload, GenericField, GenericMessage, WireType};
