//! ---
//! gh_section: "03-persistence-logging"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Structured logging adapters and sinks."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Tick-aware logging helpers shared by the simulation engine and tools.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline stderr subscriber for tools and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Starting preset the simulation was launched with.
    pub preset: Option<&'a str>,
    /// Tick number the event relates to.
    pub tick: Option<u64>,
    /// Weather label in effect at the time of the event.
    pub weather: Option<&'a str>,
    /// Run mode (open-loop, closed-loop, training).
    pub mode: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a preset name.
    pub fn with_preset(mut self, preset: &'a str) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Attach a tick value.
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Attach the current weather label.
    pub fn with_weather(mut self, weather: &'a str) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Attach a run mode descriptor.
    pub fn with_mode(mut self, mode: &'a str) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    /// Stable label recorded in the `outcome` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (simulation start, stop, clear).
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            preset = ctx.preset.unwrap_or(""),
            tick = ctx.tick.unwrap_or_default(),
            weather = ctx.weather.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            preset = ctx.preset.unwrap_or(""),
            tick = ctx.tick.unwrap_or_default(),
            weather = ctx.weather.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            message = %message
        ),
    }
}
