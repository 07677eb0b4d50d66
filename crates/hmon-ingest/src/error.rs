//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::path::PathBuf;

use hmon_proto::DecodeError;
use thiserror::Error;

/// Result alias for ingest operations.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Failures while parsing, validating, or storing schema documents.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema {app_name}@{version} declares no measurements")]
    Empty { app_name: String, version: String },
    #[error("schema identity is incomplete: app_name and version are required")]
    MissingIdentity,
    #[error("measurement id {id} is declared by both '{first}' and '{second}'")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },
    #[error(
        "schema {app_name}@{version} is declared by both {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicateSchema {
        app_name: String,
        version: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("failed to parse schema document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read schema document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("schema store failure: {0}")]
    Store(String),
}

/// A telemetry record could not be persisted.
#[derive(Debug, Error)]
#[error("telemetry sink rejected record: {0}")]
pub struct SinkError(pub String);

/// An event could not be delivered to the bus.
#[derive(Debug, Error)]
#[error("failed to publish to topic '{topic}': {reason}")]
pub struct PublishError {
    pub topic: String,
    pub reason: String,
}

/// Errors that reject a whole measurement batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("schema not found for {app}@{version}")]
    SchemaNotFound { app: String, version: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("request body of {size} bytes exceeds the {max} byte limit")]
    BodyTooLarge { size: usize, max: usize },
    #[error("failed to decode measurement batch: {0}")]
    Decode(#[from] DecodeError),
    #[error("telemetry event could not be prepared for publishing: {0}")]
    Publish(String),
}

impl IngestError {
    /// Whether the device sent something it should not have. Everything else
    /// is a server-side problem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::BodyTooLarge { .. } | Self::SchemaNotFound { .. }
        )
    }

    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaNotFound { .. } => "schema_not_found",
            Self::Schema(_) => "schema",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::Decode(err) => err.kind(),
            Self::Publish(_) => "publish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_and_size_errors_are_client_errors() {
        let decode = IngestError::from(DecodeError::TruncatedVarint { offset: 3 });
        assert!(decode.is_client_error());
        assert_eq!(decode.kind(), "truncated_varint");

        let too_large = IngestError::BodyTooLarge { size: 10, max: 5 };
        assert!(too_large.is_client_error());
        assert_eq!(
            too_large.to_string(),
            "request body of 10 bytes exceeds the 5 byte limit"
        );
    }

    #[test]
    fn store_failures_are_server_errors() {
        let err = IngestError::from(SchemaError::Store("connection reset".into()));
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "schema store failure: connection reset");
    }
}
