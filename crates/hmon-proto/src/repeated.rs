//! ---
//! hmon_section: "02-wire-format-decoding"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Wire decoder core: framing, interpretation, and measurement resolution."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use tracing::trace;

use crate::error::{DecodeError, Result};
use crate::wire::{decode, GenericMessage};

/// Decode an envelope and return every embedded message found at
/// `field_number`, in stream order.
///
/// Fields at that number that are not length-delimited are skipped. Any
/// framing error in the envelope or in an embedded message aborts the whole
/// extraction.
pub fn decode_repeated(buf: &[u8], field_number: u32) -> Result<Vec<GenericMessage<'_>>> {
    let envelope = decode(buf)?;
    let mut messages = Vec::new();

    for (index, field) in envelope.get_all_fields(field_number).enumerate() {
        let Some(bytes) = field.as_bytes() else {
            trace!(
                field_number,
                wire_type = %field.wire_type(),
                "skipping non-message field in envelope"
            );
            continue;
        };
        let embedded =
            decode(bytes).map_err(|source| DecodeError::nested(field_number, index, source))?;
        messages.push(embedded);
    }

    Ok(messages)
}
