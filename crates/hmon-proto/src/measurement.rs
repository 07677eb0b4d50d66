//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Schema-driven resolution of measurement batches.
//!
//! A batch is an envelope whose field 1 repeats an embedded measurement:
//!
//! ```text
//! Measurement {
//!   1: uint32 id            // semantic id, matched against the schema
//!   oneof value {
//!     2: float  3: double  4: int32  5: int64
//!     6: uint32 7: uint64  8: bool
//!   }
//! }
//! ```
//!
//! Resolution runs two passes over the decoded measurements: the first finds
//! the measurement named `timestamp` and turns it into the batch timestamp,
//! the second emits one [`Reading`] per remaining known measurement with its
//! value coerced to `f64`.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::repeated::decode_repeated;
use crate::wire::{GenericField, GenericMessage, WireType};

/// Envelope field carrying embedded measurements.
pub const ENVELOPE_FIELD: u32 = 1;
/// Field inside a measurement carrying its semantic id.
pub const MEASUREMENT_ID_FIELD: u32 = 1;
/// Schema name of the measurement that carries the batch timestamp.
pub const TIMESTAMP_MEASUREMENT: &str = "timestamp";

/// Schema entry for one measurement id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementMeta {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub declared_type: String,
    #[serde(default)]
    pub unit: String,
}

impl MeasurementMeta {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        declared_type: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            declared_type: declared_type.into(),
            unit: unit.into(),
        }
    }

    pub fn is_timestamp(&self) -> bool {
        self.name == TIMESTAMP_MEASUREMENT
    }
}

/// Schema snapshot keyed by measurement id.
pub type SchemaLookup = HashMap<u32, MeasurementMeta>;

/// Scalar kinds a measurement value may take, one per oneof slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Float32,
    Float64,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
}

impl ValueKind {
    pub const ALL: [ValueKind; 7] = [
        ValueKind::Float32,
        ValueKind::Float64,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Uint32,
        ValueKind::Uint64,
        ValueKind::Bool,
    ];

    /// Oneof slot used for this kind inside a measurement.
    pub fn field_number(self) -> u32 {
        match self {
            Self::Float32 => 2,
            Self::Float64 => 3,
            Self::Int32 => 4,
            Self::Int64 => 5,
            Self::Uint32 => 6,
            Self::Uint64 => 7,
            Self::Bool => 8,
        }
    }

    pub fn from_field_number(field_number: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.field_number() == field_number)
    }

    /// Wire type a well-formed encoder uses for this kind.
    pub fn wire_type(self) -> WireType {
        match self {
            Self::Float32 => WireType::Fixed32,
            Self::Float64 => WireType::Fixed64,
            _ => WireType::Varint,
        }
    }

    /// Parse the loose type names found in schema documents.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared.trim().to_ascii_lowercase().as_str() {
            "float" | "float32" | "f32" => Some(Self::Float32),
            "double" | "float64" | "f64" => Some(Self::Float64),
            "int32" | "i32" | "sint32" => Some(Self::Int32),
            "int64" | "i64" | "sint64" => Some(Self::Int64),
            "uint32" | "u32" => Some(Self::Uint32),
            "uint64" | "u64" => Some(Self::Uint64),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Bool => "bool",
        }
    }

    fn interpret(self, field: &GenericField<'_>) -> Option<MeasurementValue> {
        match self {
            Self::Float32 => field.as_float32().map(MeasurementValue::Float32),
            Self::Float64 => field.as_float64().map(MeasurementValue::Float64),
            Self::Int32 => field.as_int32().map(MeasurementValue::Int32),
            Self::Int64 => field.as_int64().map(MeasurementValue::Int64),
            Self::Uint32 => field.as_uint32().map(MeasurementValue::Uint32),
            Self::Uint64 => field.as_uint64().map(MeasurementValue::Uint64),
            Self::Bool => field.as_bool().map(MeasurementValue::Bool),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed measurement value as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MeasurementValue {
    Float32(f32),
    Float64(f64),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
}

impl MeasurementValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Float32(_) => ValueKind::Float32,
            Self::Float64(_) => ValueKind::Float64,
            Self::Int32(_) => ValueKind::Int32,
            Self::Int64(_) => ValueKind::Int64,
            Self::Uint32(_) => ValueKind::Uint32,
            Self::Uint64(_) => ValueKind::Uint64,
            Self::Bool(_) => ValueKind::Bool,
        }
    }

    /// Canonical storage form. 64-bit integers beyond 2^53 lose precision.
    pub fn to_f64(&self) -> f64 {
        match *self {
            Self::Float32(v) => f64::from(v),
            Self::Float64(v) => v,
            Self::Int32(v) => f64::from(v),
            Self::Int64(v) => v as f64,
            Self::Uint32(v) => f64::from(v),
            Self::Uint64(v) => v as f64,
            Self::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Integer view used for epoch-millisecond timestamps.
    pub fn as_epoch_millis(&self) -> Option<i64> {
        match *self {
            Self::Int32(v) => Some(i64::from(v)),
            Self::Int64(v) => Some(v),
            Self::Uint32(v) => Some(i64::from(v)),
            Self::Uint64(v) => i64::try_from(v).ok(),
            Self::Float32(_) | Self::Float64(_) | Self::Bool(_) => None,
        }
    }
}

/// One measurement sub-message after oneof selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub id: u32,
    /// `None` when no value slot was populated or the winning slot had the
    /// wrong wire type.
    pub value: Option<MeasurementValue>,
}

/// Pick the value slot of a measurement: the first field, in stream order,
/// whose number maps to a [`ValueKind`].
pub fn select_value<'m, 'a>(
    message: &'m GenericMessage<'a>,
) -> Option<(ValueKind, &'m GenericField<'a>)> {
    message.iter().find_map(|field| {
        ValueKind::from_field_number(field.field_number).map(|kind| (kind, field))
    })
}

/// Interpret one generic measurement sub-message.
pub fn decode_measurement(message: &GenericMessage<'_>) -> Measurement {
    let id = message
        .get_field(MEASUREMENT_ID_FIELD)
        .and_then(GenericField::as_uint32)
        .unwrap_or_default();

    let value = select_value(message).and_then(|(kind, field)| {
        let value = kind.interpret(field);
        if value.is_none() {
            debug!(
                measurement_id = id,
                expected = %kind.wire_type(),
                actual = %field.wire_type(),
                "value slot has mismatched wire type"
            );
        }
        value
    });

    Measurement { id, value }
}

/// Decode a batch envelope into measurements without consulting a schema.
pub fn decode_measurements(buf: &[u8]) -> Result<Vec<Measurement>> {
    let messages = decode_repeated(buf, ENVELOPE_FIELD)?;
    Ok(messages.iter().map(decode_measurement).collect())
}

/// A named, unit-tagged reading ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: u32,
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// Where the effective batch timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    Payload,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Id present on the wire but unknown to the schema snapshot.
    UnknownId,
    /// Known id without a usable value.
    MissingValue,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownId => "unknown_id",
            Self::MissingValue => "missing_value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMeasurement {
    pub id: u32,
    pub reason: SkipReason,
}

/// Outcome of resolving one batch against a schema snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBatch {
    pub readings: Vec<Reading>,
    pub timestamp: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
    pub skipped: Vec<SkippedMeasurement>,
}

impl ResolvedBatch {
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped
            .iter()
            .filter(|skipped| skipped.reason == reason)
            .count()
    }

    pub fn unknown_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.skipped
            .iter()
            .filter(|skipped| skipped.reason == SkipReason::UnknownId)
            .map(|skipped| skipped.id)
    }
}

/// First pass: the first measurement the schema names `timestamp` decides
/// the batch timestamp. Only integer values are accepted, as epoch
/// milliseconds; anything else yields `None`.
pub fn find_timestamp(measurements: &[Measurement], schema: &SchemaLookup) -> Option<DateTime<Utc>> {
    let carrier = measurements.iter().find(|m| {
        schema
            .get(&m.id)
            .is_some_and(MeasurementMeta::is_timestamp)
    })?;

    let millis = carrier.value.as_ref().and_then(MeasurementValue::as_epoch_millis);
    let timestamp = millis.and_then(DateTime::<Utc>::from_timestamp_millis);
    if timestamp.is_none() {
        debug!(
            measurement_id = carrier.id,
            value = ?carrier.value,
            "timestamp measurement not usable as epoch milliseconds"
        );
    }
    timestamp
}

/// Run both resolution passes over already-decoded measurements.
pub fn resolve_measurements(
    measurements: &[Measurement],
    schema: &SchemaLookup,
    fallback: DateTime<Utc>,
) -> ResolvedBatch {
    let (timestamp, timestamp_source) = match find_timestamp(measurements, schema) {
        Some(ts) => (ts, TimestampSource::Payload),
        None => (fallback, TimestampSource::Fallback),
    };

    let mut readings = Vec::with_capacity(measurements.len());
    let mut skipped = Vec::new();

    for measurement in measurements {
        let Some(meta) = schema.get(&measurement.id) else {
            warn!(measurement_id = measurement.id, "unknown measurement id");
            skipped.push(SkippedMeasurement {
                id: measurement.id,
                reason: SkipReason::UnknownId,
            });
            continue;
        };

        if meta.is_timestamp() {
            continue;
        }

        let Some(value) = measurement.value else {
            skipped.push(SkippedMeasurement {
                id: measurement.id,
                reason: SkipReason::MissingValue,
            });
            continue;
        };

        if let Some(declared) = ValueKind::from_declared(&meta.declared_type) {
            if declared != value.kind() {
                debug!(
                    measurement = %meta.name,
                    declared = %declared,
                    actual = %value.kind(),
                    "wire kind differs from declared schema type"
                );
            }
        }

        readings.push(Reading {
            id: measurement.id,
            name: meta.name.clone(),
            value: value.to_f64(),
            unit: meta.unit.clone(),
        });
    }

    ResolvedBatch {
        readings,
        timestamp,
        timestamp_source,
        skipped,
    }
}

/// Decode and resolve a measurement batch.
///
/// `fallback` is used as the batch timestamp when the payload does not carry
/// a usable `timestamp` measurement. Any framing error aborts the batch.
pub fn resolve_batch(
    buf: &[u8],
    schema: &SchemaLookup,
    fallback: DateTime<Utc>,
) -> Result<ResolvedBatch> {
    let measurements = decode_measurements(buf)?;
    let resolved = resolve_measurements(&measurements, schema, fallback);
    debug!(
        measurements = measurements.len(),
        readings = resolved.readings.len(),
        skipped = resolved.skipped.len(),
        timestamp_source = ?resolved.timestamp_source,
        "measurement batch resolved"
    );
    Ok(resolved)
}
