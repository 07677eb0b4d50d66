//! ---
//! hmon_section: "01-core-functionality"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Shared configuration and logging primitives."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::{ConsoleTarget, LogFormat};

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Largest measurement batch accepted unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Topic telemetry events are published on unless configured otherwise.
pub const DEFAULT_TELEMETRY_TOPIC: &str = "telemetry-events";

/// Lifetime of a cached schema unless configured otherwise.
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_telemetry_topic() -> String {
    DEFAULT_TELEMETRY_TOPIC.to_owned()
}

fn default_schema_ttl() -> Duration {
    DEFAULT_SCHEMA_TTL
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for HMON ingest services and tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "HMON_CONFIG";

    /// Load configuration from disk together with the effective source path,
    /// respecting the `HMON_CONFIG` override.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        Self::load_optional(candidates)?.ok_or_else(|| {
            anyhow!(
                "no configuration files found. inspected: {}",
                candidates
                    .iter()
                    .map(|p| p.as_ref().display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    /// Like [`AppConfig::load_with_source`], but `Ok(None)` when neither
    /// `HMON_CONFIG` nor any candidate points at a file. A file that exists
    /// and fails to parse is still an error.
    pub fn load_optional<P: AsRef<Path>>(candidates: &[P]) -> Result<Option<LoadedAppConfig>> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: path,
                }));
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(Some(LoadedAppConfig {
                    config,
                    source: path.to_path_buf(),
                }));
            }
        }

        Ok(None)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.ingest.validate()?;
        self.schema_cache.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default)]
    pub console: ConsoleTarget,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            console: ConsoleTarget::default(),
        }
    }
}

/// Limits and routing for the ingest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_telemetry_topic")]
    pub telemetry_topic: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: default_max_body_bytes(),
            telemetry_topic: default_telemetry_topic(),
        }
    }
}

impl IngestSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(anyhow!("ingest.max_body_bytes must be greater than zero"));
        }
        if self.telemetry_topic.trim().is_empty() {
            return Err(anyhow!("ingest.telemetry_topic must not be empty"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCacheConfig {
    #[serde(default = "default_schema_ttl")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub ttl: Duration,
    /// Directory of schema JSON documents preloaded into the store.
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_schema_ttl(),
            schema_dir: None,
        }
    }
}

impl SchemaCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(anyhow!("schema_cache.ttl must be greater than zero"));
        }
        if let Some(dir) = &self.schema_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(anyhow!(
                    "schema_cache.schema_dir {} is not a directory",
                    dir.display()
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.ingest.max_body_bytes, 1024 * 1024);
        assert_eq!(config.ingest.telemetry_topic, "telemetry-events");
        assert_eq!(config.schema_cache.ttl, Duration::from_secs(86_400));
        assert!(config.schema_cache.schema_dir.is_none());
        assert!(config.metrics.enabled);
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn sections_override_defaults() {
        let config: AppConfig = r#"
            [logging]
            directory = "/var/log/hmon"
            format = "pretty"

            [ingest]
            max_body_bytes = 4096
            telemetry_topic = "lab-events"

            [schema_cache]
            ttl = 90

            [metrics]
            enabled = false
        "#
        .parse()
        .unwrap();

        assert_eq!(config.logging.directory, PathBuf::from("/var/log/hmon"));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.ingest.max_body_bytes, 4096);
        assert_eq!(config.ingest.telemetry_topic, "lab-events");
        assert_eq!(config.schema_cache.ttl, Duration::from_secs(90));
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = "[ingest]\nmax_body_bytes = 0\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("max_body_bytes"));

        let err = "[schema_cache]\nttl = 0\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("ttl"));
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("hmon.toml");
        let mut file = fs::File::create(&present).unwrap();
        writeln!(file, "[ingest]\nmax_body_bytes = 2048").unwrap();

        let loaded = AppConfig::load_with_source(&[&missing, &present]).unwrap();
        assert_eq!(loaded.source, present);
        assert_eq!(loaded.config.ingest.max_body_bytes, 2048);
    }

    #[test]
    fn missing_candidates_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(AppConfig::load_optional(&[&missing]).unwrap().is_none());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[ingest]\nmax_body_bytes = \"lots\"\n").unwrap();
        assert!(AppConfig::load_optional(&[&missing, &broken]).is_err());
    }

    #[test]
    fn defaults_come_from_shared_constants() {
        let config = AppConfig::default();
        assert_eq!(config.ingest.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.ingest.telemetry_topic, DEFAULT_TELEMETRY_TOPIC);
        assert_eq!(config.schema_cache.ttl, DEFAULT_SCHEMA_TTL);
        assert_eq!(config.logging.console, ConsoleTarget::Stdout);
    }

    #[test]
    fn reports_inspected_candidates_when_none_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = AppConfig::load_with_source(&[&missing]).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
