//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Persistence abstractions and storage bindings."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{
    self, CounterVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

use crate::Result;

/// Metrics published by the persistence subsystem, labelled by record stream.
#[derive(Clone)]
pub struct PersistenceMetrics {
    records_appended: IntCounterVec,
    append_bytes: CounterVec,
    write_failures: IntCounterVec,
    streams_cleared: IntCounterVec,
    snapshots_saved: IntCounter,
    read_duration: HistogramVec,
    registry: Arc<Registry>,
}

impl PersistenceMetrics {
    /// Register all persistence metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let records_appended = IntCounterVec::new(
            Opts::new(
                "greenhouse_records_appended_total",
                "Total number of records appended to persistence logs",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(records_appended.clone()))?;

        let append_bytes = CounterVec::new(
            Opts::new(
                "greenhouse_append_bytes_total",
                "Total bytes appended to persistence logs",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(append_bytes.clone()))?;

        let write_failures = IntCounterVec::new(
            Opts::new(
                "greenhouse_write_failures_total",
                "Total number of persistence writes that failed",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(write_failures.clone()))?;

        let streams_cleared = IntCounterVec::new(
            Opts::new(
                "greenhouse_streams_cleared_total",
                "Number of times a persistence log was cleared",
            ),
            &["stream"],
        )?;
        registry.register(Box::new(streams_cleared.clone()))?;

        let snapshots_saved = IntCounter::new(
            "greenhouse_snapshots_saved_total",
            "Total number of equipment snapshots persisted",
        )?;
        registry.register(Box::new(snapshots_saved.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "greenhouse_log_read_duration_seconds",
            "Duration spent reading persistence logs back from disk",
        )
        .buckets(prometheus::exponential_buckets(0.0005, 2.0, 12)?);
        let read_duration = HistogramVec::new(histogram_opts, &["stream"])?;
        registry.register(Box::new(read_duration.clone()))?;

        Ok(Self {
            records_appended,
            append_bytes,
            write_failures,
            streams_cleared,
            snapshots_saved,
            read_duration,
            registry,
        })
    }

    /// Record a successful append of `bytes` bytes to `stream`.
    pub fn record_append(&self, stream: &str, bytes: usize) {
        self.records_appended.with_label_values(&[stream]).inc();
        self.append_bytes
            .with_label_values(&[stream])
            .inc_by(bytes as f64);
    }

    /// Record a failed write to `stream`.
    pub fn record_write_failure(&self, stream: &str) {
        self.write_failures.with_label_values(&[stream]).inc();
    }

    /// Record that `stream` was cleared.
    pub fn record_clear(&self, stream: &str) {
        self.streams_cleared.with_label_values(&[stream]).inc();
    }

    /// Record a persisted snapshot.
    pub fn record_snapshot_saved(&self) {
        self.snapshots_saved.inc();
    }

    /// Observe the time spent reading `stream` back from disk.
    pub fn observe_read_duration(&self, stream: &str, seconds: f64) {
        self.read_duration
            .with_label_values(&[stream])
            .observe(seconds);
    }

    /// Render every metric of the backing registry in the Prometheus text format.
    pub fn render_text(&self) -> Result<String> {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for PersistenceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceMetrics").finish_non_exhaustive()
    }
}
