//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Wire-format writer used to build fixtures and replay payloads.
//!
//! The ingest path never encodes; this mirrors what device firmware emits so
//! tests and the CLI can produce realistic batches.

use bytes::{BufMut, Bytes, BytesMut};

use crate::measurement::{
    MeasurementValue, ENVELOPE_FIELD, MEASUREMENT_ID_FIELD,
};
use crate::varint::{put_varint, zigzag_encode_32, zigzag_encode_64};
use crate::wire::WireType;

pub use crate::varint::encode_varint;

/// Append-only writer for one message.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn tag(&mut self, field_number: u32, wire_type: WireType) -> &mut Self {
        put_varint(
            &mut self.buf,
            (u64::from(field_number) << 3) | u64::from(wire_type.code()),
        );
        self
    }

    /// Raw varint field; every integer and bool writer ends up here.
    pub fn varint(&mut self, field_number: u32, value: u64) -> &mut Self {
        self.tag(field_number, WireType::Varint);
        put_varint(&mut self.buf, value);
        self
    }

    pub fn uint64(&mut self, field_number: u32, value: u64) -> &mut Self {
        self.varint(field_number, value)
    }

    pub fn uint32(&mut self, field_number: u32, value: u32) -> &mut Self {
        self.uint64(field_number, u64::from(value))
    }

    /// Negative values are sign-extended to ten bytes, as protobuf `int64` does.
    pub fn int64(&mut self, field_number: u32, value: i64) -> &mut Self {
        self.uint64(field_number, value as u64)
    }

    pub fn int32(&mut self, field_number: u32, value: i32) -> &mut Self {
        self.int64(field_number, i64::from(value))
    }

    pub fn sint64(&mut self, field_number: u32, value: i64) -> &mut Self {
        self.varint(field_number, zigzag_encode_64(value))
    }

    pub fn sint32(&mut self, field_number: u32, value: i32) -> &mut Self {
        self.varint(field_number, zigzag_encode_32(value))
    }

    pub fn bool(&mut self, field_number: u32, value: bool) -> &mut Self {
        self.varint(field_number, u64::from(value))
    }

    pub fn fixed32(&mut self, field_number: u32, value: u32) -> &mut Self {
        self.tag(field_number, WireType::Fixed32);
        self.buf.put_u32_le(value);
        self
    }

    pub fn fixed64(&mut self, field_number: u32, value: u64) -> &mut Self {
        self.tag(field_number, WireType::Fixed64);
        self.buf.put_u64_le(value);
        self
    }

    pub fn float(&mut self, field_number: u32, value: f32) -> &mut Self {
        self.fixed32(field_number, value.to_bits())
    }

    pub fn double(&mut self, field_number: u32, value: f64) -> &mut Self {
        self.fixed64(field_number, value.to_bits())
    }

    pub fn bytes(&mut self, field_number: u32, value: &[u8]) -> &mut Self {
        self.tag(field_number, WireType::LengthDelimited);
        put_varint(&mut self.buf, value.len() as u64);
        self.buf.put_slice(value);
        self
    }

    pub fn string(&mut self, field_number: u32, value: &str) -> &mut Self {
        self.bytes(field_number, value.as_bytes())
    }

    /// Write an embedded message built by `build`.
    pub fn message<F>(&mut self, field_number: u32, build: F) -> &mut Self
    where
        F: FnOnce(&mut WireWriter),
    {
        let mut inner = WireWriter::new();
        build(&mut inner);
        self.bytes(field_number, &inner.buf)
    }

    /// Append raw bytes without framing. Useful for crafting corrupt input.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Builds a measurement batch envelope the way device firmware does.
#[derive(Debug, Default, Clone)]
pub struct MeasurementBatchBuilder {
    writer: WireWriter,
    count: usize,
}

impl MeasurementBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement carrying `value` in its oneof slot.
    pub fn push(&mut self, id: u32, value: MeasurementValue) -> &mut Self {
        self.writer.message(ENVELOPE_FIELD, |m| {
            m.uint32(MEASUREMENT_ID_FIELD, id);
            write_value(m, value);
        });
        self.count += 1;
        self
    }

    /// Append a measurement with an id but no value field.
    pub fn push_empty(&mut self, id: u32) -> &mut Self {
        self.writer.message(ENVELOPE_FIELD, |m| {
            m.uint32(MEASUREMENT_ID_FIELD, id);
        });
        self.count += 1;
        self
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(self) -> Bytes {
        self.writer.freeze()
    }
}

fn write_value(writer: &mut WireWriter, value: MeasurementValue) {
    let field = value.kind().field_number();
    match value {
        MeasurementValue::Float32(v) => writer.float(field, v),
        MeasurementValue::Float64(v) => writer.double(field, v),
        MeasurementValue::Int32(v) => writer.int32(field, v),
        MeasurementValue::Int64(v) => writer.int64(field, v),
        MeasurementValue::Uint32(v) => writer.uint32(field, v),
        MeasurementValue::Uint64(v) => writer.uint64(field, v),
        MeasurementValue::Bool(v) => writer.bool(field, v),
    };
}
