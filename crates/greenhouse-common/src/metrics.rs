//! ---
//! gh_section: "01-core-functionality"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Shared primitives and utilities for the simulation runtime."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Running statistics over absolute deviations between observed and target
/// tick spacing. Memory use is constant however long the loop runs.
#[derive(Debug, Default)]
pub struct JitterHistogram {
    stats: Mutex<RunningStats>,
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn sample_variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        }
    }
}

impl JitterHistogram {
    pub fn record(&self, jitter: Duration) {
        self.stats.lock().push(jitter.as_secs_f64() * 1_000.0);
    }

    pub fn len(&self) -> usize {
        self.stats.lock().count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        let stats = *self.stats.lock();
        if stats.count == 0 {
            return None;
        }
        Some(JitterSummary {
            mean_ms: stats.mean,
            std_dev_ms: stats.sample_variance().sqrt(),
            max_ms: stats.max,
            min_ms: stats.min,
            samples: stats.count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JitterSummary {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub max_ms: f64,
    pub min_ms: f64,
    pub samples: u64,
}

/// Measures the spacing between consecutive ticks against the target interval.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    histogram: JitterHistogram,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            histogram: JitterHistogram::default(),
        }
    }

    /// Record a tick observed at `now`, returning the spacing since the previous tick.
    pub fn record_tick_at(&self, now: Instant) -> Option<Duration> {
        let mut last_tick = self.last_tick.lock();
        let spacing = last_tick.map(|previous| now.saturating_duration_since(previous));
        if let Some(actual) = spacing {
            let jitter = if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            };
            self.histogram.record(jitter);
        }
        *last_tick = Some(now);
        spacing
    }

    pub fn record_tick(&self) -> Option<Duration> {
        self.record_tick_at(Instant::now())
    }

    pub fn target_interval(&self) -> Duration {
        self.target_interval
    }

    pub fn histogram(&self) -> &JitterHistogram {
        &self.histogram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_spacing() {
        let reporter = LoopTimingReporter::new(Duration::from_secs(5));
        assert!(reporter.record_tick_at(Instant::now()).is_none());
        assert!(reporter.histogram().summary().is_none());
    }

    #[test]
    fn jitter_is_absolute_deviation_from_target() {
        let reporter = LoopTimingReporter::new(Duration::from_secs(5));
        let start = Instant::now();
        reporter.record_tick_at(start);
        let spacing = reporter
            .record_tick_at(start + Duration::from_millis(5_200))
            .unwrap();
        assert_eq!(spacing, Duration::from_millis(5_200));
        reporter.record_tick_at(start + Duration::from_millis(10_000));

        let summary = reporter.histogram().summary().unwrap();
        assert_eq!(summary.samples, 2);
        assert!((summary.max_ms - 200.0).abs() < 1e-6);
        assert!((summary.min_ms - 200.0).abs() < 1e-6);
        assert!(summary.std_dev_ms.abs() < 1e-6);
    }

    #[test]
    fn long_runs_keep_exact_statistics() {
        let histogram = JitterHistogram::default();
        for _ in 0..50_000 {
            histogram.record(Duration::from_millis(10));
            histogram.record(Duration::from_millis(30));
        }
        assert_eq!(histogram.len(), 100_000);

        let summary = histogram.summary().unwrap();
        assert_eq!(summary.samples, 100_000);
        assert!((summary.mean_ms - 20.0).abs() < 1e-9);
        assert!((summary.min_ms - 10.0).abs() < 1e-9);
        assert!((summary.max_ms - 30.0).abs() < 1e-9);
        // Sample std dev of alternating 10/30 over n values is 10 * sqrt(n / (n - 1)).
        let expected = 10.0 * (100_000.0_f64 / 99_999.0).sqrt();
        assert!((summary.std_dev_ms - expected).abs() < 1e-6);
    }

    #[test]
    fn single_sample_has_zero_spread() {
        let histogram = JitterHistogram::default();
        histogram.record(Duration::from_micros(1_500));
        let summary = histogram.summary().unwrap();
        assert_eq!(summary.samples, 1);
        assert!((summary.mean_ms - 1.5).abs() < 1e-9);
        assert_eq!(summary.std_dev_ms, 0.0);
        assert_eq!(summary.min_ms, summary.max_ms);
    }
}
