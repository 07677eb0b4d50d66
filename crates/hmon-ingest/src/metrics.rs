//! ---
//! hmon_section: "04-telemetry-ingest"
//! hmon_subsection: "module"
//! hmon_type: "source"
//! hmon_scope: "code"
//! hmon_description: "Schema cache and telemetry ingest pipeline."
//! hmon_version: "v0.0.0-prealpha"
//! hmon_owner: "tbd"
//! ---
use std::sync::Arc;

use hmon_proto::SkipReason;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Shared registry type used by ingest components.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Counters recorded by the ingest pipeline.
#[derive(Clone, Debug)]
pub struct IngestMetrics {
    registry: SharedRegistry,
    batches_decoded: IntCounter,
    decode_errors: IntCounterVec,
    measurements_stored: IntCounter,
    measurements_skipped: IntCounterVec,
    batch_size_bytes: Histogram,
}

impl IngestMetrics {
    pub fn new(registry: SharedRegistry) -> prometheus::Result<Self> {
        let batches_decoded = IntCounter::with_opts(Opts::new(
            "hmon_batches_decoded_total",
            "Measurement batches decoded successfully",
        ))?;
        registry.register(Box::new(batches_decoded.clone()))?;

        let decode_errors = IntCounterVec::new(
            Opts::new(
                "hmon_decode_errors_total",
                "Measurement batches rejected by the wire decoder, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(decode_errors.clone()))?;

        let measurements_stored = IntCounter::with_opts(Opts::new(
            "hmon_measurements_stored_total",
            "Telemetry records accepted by the sink",
        ))?;
        registry.register(Box::new(measurements_stored.clone()))?;

        let measurements_skipped = IntCounterVec::new(
            Opts::new(
                "hmon_measurements_skipped_total",
                "Measurements dropped during resolution, by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(measurements_skipped.clone()))?;

        let batch_size_bytes = Histogram::with_opts(
            HistogramOpts::new("hmon_batch_size_bytes", "Size of received measurement batches")
                .buckets(prometheus::exponential_buckets(16.0, 4.0, 9)?),
        )?;
        registry.register(Box::new(batch_size_bytes.clone()))?;

        Ok(Self {
            registry,
            batches_decoded,
            decode_errors,
            measurements_stored,
            measurements_skipped,
            batch_size_bytes,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn observe_batch_size(&self, bytes: usize) {
        self.batch_size_bytes.observe(bytes as f64);
    }

    pub fn inc_batches_decoded(&self) {
        self.batches_decoded.inc();
    }

    pub fn inc_decode_error(&self, kind: &str) {
        self.decode_errors.with_label_values(&[kind]).inc();
    }

    pub fn add_stored(&self, count: usize) {
        self.measurements_stored.inc_by(count as u64);
    }

    pub fn add_skipped(&self, reason: SkipReason, count: usize) {
        if count > 0 {
            self.measurements_skipped
                .with_label_values(&[reason.as_str()])
                .inc_by(count as u64);
        }
    }
}
