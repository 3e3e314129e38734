//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Runtime helpers supporting the tick loop."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

/// Fixed-period ticker for the simulation loop.
///
/// The first tick completes one full period after construction. Ticks that
/// are missed because a tick overran are delayed rather than bursted.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
    period: Duration,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, period }
    }

    /// Wait for the next tick and return the instant it actually fired,
    /// which trails the scheduled deadline when the loop ran late.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await;
        Instant::now()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
