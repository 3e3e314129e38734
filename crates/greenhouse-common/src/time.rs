//! ---
//! gh_section: "01-core-functionality"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Shared primitives and utilities for the simulation runtime."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Parse a user supplied interval in (possibly fractional) seconds.
pub fn interval_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("interval must be a positive number of seconds, got {secs}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|err| anyhow!("interval {secs}s is out of range: {err}"))
}

/// Wall-clock span covered by `ticks` ticks at the given interval.
pub fn approximate_run_duration(ticks: u64, interval: Duration) -> Duration {
    interval.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
}

/// Signed deviation between observed and expected spacing, in microseconds.
pub fn jitter_us(actual: Duration, expected: Duration) -> i64 {
    let actual_us = actual.as_secs_f64() * 1_000_000.0;
    let expected_us = expected.as_secs_f64() * 1_000_000.0;
    (actual_us - expected_us).round() as i64
}
