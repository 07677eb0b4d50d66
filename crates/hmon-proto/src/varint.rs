//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
//! Base-128 varints and zig-zag mapping.

use bytes::BufMut;

use crate::error::{DecodeError, Result};

/// Longest varint needed for a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Decode a varint from the start of `buf`.
///
/// Returns the value and the number of bytes consumed. `offset` is only used
/// to annotate errors with the absolute position in the enclosing buffer.
/// Bits beyond 64 in the tenth byte are discarded.
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(DecodeError::MalformedVarint { offset });
        }
        value |= u64::from(byte & PAYLOAD_MASK) << (7 * i as u32);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        return Err(DecodeError::MalformedVarint { offset });
    }
    Err(DecodeError::TruncatedVarint { offset })
}

/// Append the varint encoding of `value` to `buf`.
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= u64::from(CONTINUATION) {
        buf.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Convenience wrapper returning a freshly allocated encoding.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    put_varint(&mut out, value);
    out
}

/// Number of bytes `value` occupies once varint-encoded.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

pub fn zigzag_decode_64(raw: u64) -> i64 {
    ((raw >> 1) ^ (raw & 1).wrapping_neg()) as i64
}

/// Zig-zag decode of the full 64-bit varint, truncated to 32 bits after.
pub fn zigzag_decode_32(raw: u64) -> i32 {
    zigzag_decode_64(raw) as i32
}

pub fn zigzag_encode_64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_encode_32(value: i32) -> u64 {
    u64::from(((value << 1) ^ (value >> 31)) as u32)
}
