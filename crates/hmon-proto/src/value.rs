//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Typed views over raw field payloads.
//!
//! The wire carries no semantic type beyond its framing, so the caller picks
//! the view that matches the declared schema type. Every view returns `None`
//! when asked about a payload of a different wire type.

use std::borrow::Cow;

use crate::error::{DecodeError, Result};
use crate::varint::{zigzag_decode_32, zigzag_decode_64};
use crate::wire::{decode, FieldPayload, GenericField, GenericMessage};

impl<'a> FieldPayload<'a> {
    fn varint(&self) -> Option<u64> {
        match *self {
            Self::Varint(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_float32(&self) -> Option<f32> {
        match *self {
            Self::Fixed32(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }

    pub fn as_float64(&self) -> Option<f64> {
        match *self {
            Self::Fixed64(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    /// Low 32 bits of the varint, two's complement.
    pub fn as_int32(&self) -> Option<i32> {
        self.varint().map(|raw| raw as i32)
    }

    pub fn as_int64(&self) -> Option<i64> {
        self.varint().map(|raw| raw as i64)
    }

    pub fn as_uint32(&self) -> Option<u32> {
        self.varint().map(|raw| raw as u32)
    }

    pub fn as_uint64(&self) -> Option<u64> {
        self.varint()
    }

    pub fn as_sint32(&self) -> Option<i32> {
        self.varint().map(zigzag_decode_32)
    }

    pub fn as_sint64(&self) -> Option<i64> {
        self.varint().map(zigzag_decode_64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.varint().map(|raw| raw != 0)
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Self::LengthDelimited(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Permissive string view: invalid sequences become U+FFFD instead of
    /// failing. Borrows when the bytes are already valid UTF-8.
    pub fn as_string(&self) -> Option<Cow<'a, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }

    /// Validating string view.
    pub fn as_str(&self) -> Option<Result<&'a str>> {
        self.as_bytes()
            .map(|bytes| std::str::from_utf8(bytes).map_err(DecodeError::from))
    }

    /// Decode the payload as an embedded message.
    pub fn as_message(&self) -> Option<Result<GenericMessage<'a>>> {
        self.as_bytes().map(decode)
    }
}

impl<'a> GenericField<'a> {
    pub fn as_float32(&self) -> Option<f32> {
        self.payload.as_float32()
    }

    pub fn as_float64(&self) -> Option<f64> {
        self.payload.as_float64()
    }

    pub fn as_int32(&self) -> Option<i32> {
        self.payload.as_int32()
    }

    pub fn as_int64(&self) -> Option<i64> {
        self.payload.as_int64()
    }

    pub fn as_uint32(&self) -> Option<u32> {
        self.payload.as_uint32()
    }

    pub fn as_uint64(&self) -> Option<u64> {
        self.payload.as_uint64()
    }

    pub fn as_sint32(&self) -> Option<i32> {
        self.payload.as_sint32()
    }

    pub fn as_sint64(&self) -> Option<i64> {
        self.payload.as_sint64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.payload.as_bool()
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        self.payload.as_bytes()
    }

    pub fn as_string(&self) -> Option<Cow<'a, str>> {
        self.payload.as_string()
    }

    pub fn as_str(&self) -> Option<Result<&'a str>> {
        self.payload.as_str()
    }

    /// Decode the payload as an embedded message, tagging failures with this
    /// field's number.
    pub fn as_message(&self) -> Option<Result<GenericMessage<'a>>> {
        let field_number = self.field_number;
        self.payload.as_message().map(|decoded| {
            decoded.map_err(|source| DecodeError::nested(field_number, 0, source))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varint::{zigzag_decode_64, zigzag_encode_32, zigzag_encode_64};

    #[test]
    fn float_views_reinterpret_bits() {
        let f32_field = FieldPayload::Fixed32(23.5f32.to_bits());
        assert_eq!(f32_field.as_float32(), Some(23.5));
        assert_eq!(f32_field.as_float64(), None);

        let f64_field = FieldPayload::Fixed64((-0.125f64).to_bits());
        assert_eq!(f64_field.as_float64(), Some(-0.125));
        assert_eq!(f64_field.as_uint64(), None);
    }

    #[test]
    fn integer_views_truncate_and_reinterpret() {
        let raw = FieldPayload::Varint(u64::MAX);
        assert_eq!(raw.as_uint64(), Some(u64::MAX));
        assert_eq!(raw.as_int64(), Some(-1));
        assert_eq!(raw.as_uint32(), Some(u32::MAX));
        assert_eq!(raw.as_int32(), Some(-1));

        let big = FieldPayload::Varint(0x1_0000_0005);
        assert_eq!(big.as_uint32(), Some(5));
    }

    #[test]
    fn zigzag_views() {
        assert_eq!(FieldPayload::Varint(3).as_sint32(), Some(-2));
        assert_eq!(FieldPayload::Varint(4).as_sint64(), Some(2));
        assert_eq!(
            FieldPayload::Varint(zigzag_encode_32(i32::MIN)).as_sint32(),
            Some(i32::MIN)
        );
        assert_eq!(
            FieldPayload::Varint(zigzag_encode_64(i64::MIN)).as_sint64(),
            Some(i64::MIN)
        );
    }

    #[test]
    fn sint32_zigzags_before_truncating() {
        // bit 32 set: truncating first would drop it and yield 0
        assert_eq!(FieldPayload::Varint(1 << 32).as_sint32(), Some(i32::MIN));
        assert_eq!(FieldPayload::Varint((1 << 33) | 1).as_sint32(), Some(-1));
        for raw in [1u64 << 32, (1 << 33) | 1, u64::MAX, 0x1_2345_6789] {
            assert_eq!(
                FieldPayload::Varint(raw).as_sint32(),
                Some(zigzag_decode_64(raw) as i32),
                "raw {raw:#x}"
            );
        }
    }

    #[test]
    fn bool_is_nonzero() {
        assert_eq!(FieldPayload::Varint(0).as_bool(), Some(false));
        assert_eq!(FieldPayload::Varint(2).as_bool(), Some(true));
        assert_eq!(FieldPayload::Fixed32(1).as_bool(), None);
    }

    #[test]
    fn string_views_permissive_and_validating() {
        let valid = FieldPayload::LengthDelimited(b"celsius");
        assert_eq!(valid.as_string().as_deref(), Some("celsius"));
        assert!(matches!(valid.as_string(), Some(Cow::Borrowed(_))));
        assert_eq!(valid.as_str().unwrap().unwrap(), "celsius");

        let invalid = FieldPayload::LengthDelimited(&[0x66, 0xFF, 0x6F]);
        assert_eq!(invalid.as_string().as_deref(), Some("f\u{FFFD}o"));
        assert!(matches!(
            invalid.as_str(),
            Some(Err(DecodeError::InvalidUtf8 { .. }))
        ));
    }

    #[test]
    fn message_view_propagates_errors() {
        let nested = [0x08u8, 0x2A];
        let field = GenericField::new(6, FieldPayload::LengthDelimited(&nested));
        let message = field.as_message().unwrap().unwrap();
        assert_eq!(message.get_field(1).and_then(|f| f.as_uint32()), Some(42));

        let broken = [0x15u8, 0x00];
        let field = GenericField::new(6, FieldPayload::LengthDelimited(&broken));
        match field.as_message() {
            Some(Err(DecodeError::Nested {
                field_number,
                source,
                ..
            })) => {
                assert_eq!(field_number, 6);
                assert_eq!(source.kind(), "truncated_fixed32");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(GenericField::new(6, FieldPayload::Varint(1))
            .as_message()
            .is_none());
    }
}
