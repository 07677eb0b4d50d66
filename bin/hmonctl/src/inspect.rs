//! ---
//! hmon_section: "05-operator-tooling"
//! hmon_subsection: "binary"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Operator CLI for inspecting captured measurement batches."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use hmon_proto::{decode, FieldPayload, GenericMessage};

/// Embedded messages deeper than this are printed as bytes.
const MAX_DEPTH: usize = 8;

#[derive(Debug, Args)]
pub struct InspectCommand {
    /// Captured payload file.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Treat the file as hex text instead of raw bytes.
    #[arg(long = "hex", action = clap::ArgAction::SetTrue)]
    hex: bool,
}

impl InspectCommand {
    pub fn execute(self) -> Result<()> {
        let payload = crate::read_payload(&self.file, self.hex)?;
        let message = decode(&payload)
            .with_context(|| format!("{} is not a valid wire payload", self.file.display()))?;
        let mut out = String::new();
        render(&message, 0, &mut out);
        print!("{out}");
        tracing::debug!(bytes = payload.len(), fields = message.len(), "payload inspected");
        Ok(())
    }
}

fn render(message: &GenericMessage<'_>, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for field in message {
        let _ = write!(out, "{indent}#{} {}: ", field.field_number, field.wire_type());
        match field.payload {
            FieldPayload::Varint(raw) => {
                let _ = writeln!(out, "{raw} (sint {})", field.as_sint64().unwrap_or_default());
            }
            FieldPayload::Fixed32(bits) => {
                let _ = writeln!(out, "0x{bits:08x} (float {})", f32::from_bits(bits));
            }
            FieldPayload::Fixed64(bits) => {
                let _ = writeln!(out, "0x{bits:016x} (double {})", f64::from_bits(bits));
            }
            FieldPayload::LengthDelimited(bytes) => {
                let nested = (depth < MAX_DEPTH && !bytes.is_empty())
                    .then(|| decode(bytes).ok())
                    .flatten();
                match nested {
                    Some(inner) => {
                        let _ = writeln!(out, "message ({} bytes)", bytes.len());
                        render(&inner, depth + 1, out);
                    }
                    None => match std::str::from_utf8(bytes) {
                        Ok(text) => {
                            let _ = writeln!(out, "{text:?}");
                        }
                        Err(_) => {
                            let _ = writeln!(out, "bytes {}", hex::encode(bytes));
                        }
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmon_proto::WireWriter;

    #[test]
    fn renders_nested_measurements() {
        let mut writer = WireWriter::new();
        writer.message(1, |m| {
            m.uint32(1, 2).float(2, 23.5);
        });
        let buf = writer.freeze();
        let message = decode(&buf).unwrap();

        let mut out = String::new();
        render(&message, 0, &mut out);
        assert_eq!(
            out,
            "#1 bytes: message (7 bytes)\n  #1 varint: 2 (sint 1)\n  #2 fixed32: 0x41bc0000 (float 23.5)\n"
        );
    }
}
