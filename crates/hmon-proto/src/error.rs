//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use thiserror::Error;

/// Result alias used throughout the decoder core.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while framing or interpreting wire-format bytes.
///
/// None of these are retryable: a malformed buffer is malformed forever, and
/// a corrupted envelope cannot be trusted to delimit the fields that follow.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A varint ran past the 10 bytes needed for a 64-bit value.
    #[error("malformed varint at offset {offset}: exceeds 10 bytes")]
    MalformedVarint { offset: usize },

    /// The buffer ended while a varint continuation bit was still set.
    #[error("truncated varint at offset {offset}")]
    TruncatedVarint { offset: usize },

    /// Tag low bits are not one of the four supported wire types.
    #[error("field {field_number}: unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType {
        field_number: u32,
        wire_type: u8,
        offset: usize,
    },

    #[error("field {field_number}: not enough data for fixed32 at offset {offset}")]
    TruncatedFixed32 { field_number: u32, offset: usize },

    #[error("field {field_number}: not enough data for fixed64 at offset {offset}")]
    TruncatedFixed64 { field_number: u32, offset: usize },

    /// Declared length runs past the end of the buffer.
    #[error(
        "field {field_number}: length {declared} exceeds remaining {remaining} bytes at offset {offset}"
    )]
    TruncatedBytes {
        field_number: u32,
        declared: u64,
        remaining: usize,
        offset: usize,
    },

    /// An embedded message failed to decode.
    #[error("embedded message #{index} at field {field_number}: {source}")]
    Nested {
        field_number: u32,
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },

    /// Raised only by the validating string view.
    #[error("invalid utf-8 in length-delimited field: {source}")]
    InvalidUtf8 {
        #[from]
        source: std::str::Utf8Error,
    },
}

impl DecodeError {
    pub(crate) fn nested(field_number: u32, index: usize, source: DecodeError) -> Self {
        Self::Nested {
            field_number,
            index,
            source: Box::new(source),
        }
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedVarint { .. } => "malformed_varint",
            Self::TruncatedVarint { .. } => "truncated_varint",
            Self::UnknownWireType { .. } => "unknown_wire_type",
            Self::TruncatedFixed32 { .. } => "truncated_fixed32",
            Self::TruncatedFixed64 { .. } => "truncated_fixed64",
            Self::TruncatedBytes { .. } => "truncated_bytes",
            Self::Nested { .. } => "nested_decode_error",
            Self::InvalidUtf8 { .. } => "invalid_utf8",
        }
    }

    /// Innermost error, unwrapping any number of `Nested` layers.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            Self::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Decode failures never succeed on retry.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
