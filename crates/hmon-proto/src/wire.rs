//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Generic wire-format framing.
//!
//! Turns an untrusted byte buffer into an ordered list of
//! `(field_number, payload)` pairs using nothing but the tag, wire-type and
//! length rules. No schema is consulted here; interpretation of the payloads
//! lives in [`crate::value`].

use std::fmt;

use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::varint::decode_varint;

/// Framing rule for a field's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Map the low three tag bits onto a supported wire type.
    ///
    /// Codes 3 and 4 (group start/end) and 6/7 are rejected.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Varint => "varint",
            Self::Fixed64 => "fixed64",
            Self::LengthDelimited => "bytes",
            Self::Fixed32 => "fixed32",
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw payload of a field. The variant is the wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPayload<'a> {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Fixed32(u32),
}

impl FieldPayload<'_> {
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Varint(_) => WireType::Varint,
            Self::Fixed64(_) => WireType::Fixed64,
            Self::LengthDelimited(_) => WireType::LengthDelimited,
            Self::Fixed32(_) => WireType::Fixed32,
        }
    }
}

/// One decoded field, borrowing length-delimited payloads from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericField<'a> {
    pub field_number: u32,
    pub payload: FieldPayload<'a>,
}

impl<'a> GenericField<'a> {
    pub fn new(field_number: u32, payload: FieldPayload<'a>) -> Self {
        Self {
            field_number,
            payload,
        }
    }

    pub fn wire_type(&self) -> WireType {
        self.payload.wire_type()
    }
}

/// Fields in the order they appeared on the wire.
///
/// Duplicate field numbers are legal and represent repeated fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericMessage<'a> {
    fields: Vec<GenericField<'a>>,
}

impl<'a> GenericMessage<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &[GenericField<'a>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GenericField<'a>> {
        self.fields.iter()
    }

    /// First field carrying `field_number`, if any.
    pub fn get_field(&self, field_number: u32) -> Option<&GenericField<'a>> {
        self.fields
            .iter()
            .find(|field| field.field_number == field_number)
    }

    /// Every field carrying `field_number`, in stream order.
    pub fn get_all_fields(
        &self,
        field_number: u32,
    ) -> impl Iterator<Item = &GenericField<'a>> + '_ {
        self.fields
            .iter()
            .filter(move |field| field.field_number == field_number)
    }

    pub fn push(&mut self, field: GenericField<'a>) {
        self.fields.push(field);
    }
}

impl<'a> From<Vec<GenericField<'a>>> for GenericMessage<'a> {
    fn from(fields: Vec<GenericField<'a>>) -> Self {
        Self { fields }
    }
}

impl<'a> IntoIterator for GenericMessage<'a> {
    type Item = GenericField<'a>;
    type IntoIter = std::vec::IntoIter<GenericField<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'m, 'a> IntoIterator for &'m GenericMessage<'a> {
    type Item = &'m GenericField<'a>;
    type IntoIter = std::slice::Iter<'m, GenericField<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Decode `buf` into a [`GenericMessage`].
///
/// The whole buffer must be consumed by well-formed fields; the first framing
/// problem aborts decoding and no partial message is returned. An empty
/// buffer yields an empty message.
pub fn decode(buf: &[u8]) -> Result<GenericMessage<'_>> {
    let mut fields = Vec::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        let tag_offset = pos;
        let (tag, n) = decode_varint(&buf[pos..], pos)?;
        pos += n;

        let field_number = (tag >> 3) as u32;
        let code = (tag & 0x7) as u8;
        let wire_type =
            WireType::from_code(code).ok_or(DecodeError::UnknownWireType {
                field_number,
                wire_type: code,
                offset: tag_offset,
            })?;

        let payload = match wire_type {
            WireType::Varint => {
                let (value, n) = decode_varint(&buf[pos..], pos)?;
                pos += n;
                FieldPayload::Varint(value)
            }
            WireType::Fixed64 => {
                let raw: [u8; 8] = buf
                    .get(pos..pos + 8)
                    .and_then(|slice| slice.try_into().ok())
                    .ok_or(DecodeError::TruncatedFixed64 {
                        field_number,
                        offset: pos,
                    })?;
                pos += 8;
                FieldPayload::Fixed64(u64::from_le_bytes(raw))
            }
            WireType::LengthDelimited => {
                let (declared, n) = decode_varint(&buf[pos..], pos)?;
                pos += n;
                let remaining = buf.len() - pos;
                let len = usize::try_from(declared)
                    .ok()
                    .filter(|len| *len <= remaining)
                    .ok_or(DecodeError::TruncatedBytes {
                        field_number,
                        declared,
                        remaining,
                        offset: pos,
                    })?;
                let bytes = &buf[pos..pos + len];
                pos += len;
                FieldPayload::LengthDelimited(bytes)
            }
            WireType::Fixed32 => {
                let raw: [u8; 4] = buf
                    .get(pos..pos + 4)
                    .and_then(|slice| slice.try_into().ok())
                    .ok_or(DecodeError::TruncatedFixed32 {
                        field_number,
                        offset: pos,
                    })?;
                pos += 4;
                FieldPayload::Fixed32(u32::from_le_bytes(raw))
            }
        };

        fields.push(GenericField::new(field_number, payload));
    }

    Ok(GenericMessage::from(fields))
}
