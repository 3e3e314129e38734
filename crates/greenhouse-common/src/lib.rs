//! ---
//! gh_section: "01-core-functionality"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Shared primitives and utilities for the simulation runtime."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
//! Core shared primitives for the greenhouse simulation workspace.
//! This crate exposes configuration loading, tracing initialisation and
//! loop timing helpers consumed by the simulation engine and the CLI.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, SimulationConfig, StorageConfig,
    ThresholdConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
