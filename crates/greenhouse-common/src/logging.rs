//! ---
//! gh_section: "01-core-functionality"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Shared primitives and utilities for the simulation runtime."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::io::Write;

use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "GREENHOUSE_LOG";
const FALLBACK_DIRECTIVE: &str = "info";

/// Writer guards for the installed subscriber. Dropping them stops the
/// background writers, so they live for the whole process.
struct WriterGuards {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Available console log formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
    /// Single-line events without targets, for interactive runs.
    Compact,
}

/// Where the active filter directive came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FilterSource {
    GreenhouseLog,
    RustLog,
    Config,
    Fallback,
}

/// The filter directive chosen at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChoice {
    pub directive: String,
    pub source: FilterSource,
    /// Set when a higher-priority directive was present but unparsable.
    pub rejected: Option<String>,
}

/// Pick the filter directive: `GREENHOUSE_LOG`, then `RUST_LOG`, then the
/// configured `level`, then `info`. The first directive that fails to parse
/// is reported in `rejected` and resolution stops at the fallback.
pub fn resolve_filter(
    greenhouse_log: Option<&str>,
    rust_log: Option<&str>,
    configured: Option<&str>,
) -> FilterChoice {
    let candidates = [
        (greenhouse_log, FilterSource::GreenhouseLog),
        (rust_log, FilterSource::RustLog),
        (configured, FilterSource::Config),
    ];
    for (directive, source) in candidates {
        let Some(directive) = directive.map(str::trim).filter(|d| !d.is_empty()) else {
            continue;
        };
        return match EnvFilter::try_new(directive) {
            Ok(_) => FilterChoice {
                directive: directive.to_owned(),
                source,
                rejected: None,
            },
            Err(err) => FilterChoice {
                directive: FALLBACK_DIRECTIVE.to_owned(),
                source: FilterSource::Fallback,
                rejected: Some(format!("{source} directive {directive:?}: {err}")),
            },
        };
    }
    FilterChoice {
        directive: FALLBACK_DIRECTIVE.to_owned(),
        source: FilterSource::Fallback,
        rejected: None,
    }
}

fn console_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let timer = fmt::time::UtcTime::rfc_3339();
    match format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(timer)
            .json()
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(timer)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_target(false)
            .with_timer(timer)
            .compact()
            .with_writer(writer)
            .boxed(),
    }
}

/// Install the global tracing subscriber for `service_name`.
///
/// Console events go to stderr so stdout carries only the per-tick readout.
/// When `config.file` is set, a daily rolling JSON file named after
/// `file_prefix` (or the service) is also written under `config.directory`.
/// A second call keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let greenhouse_log = std::env::var(LOG_ENV).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let choice = resolve_filter(
        greenhouse_log.as_deref(),
        rust_log.as_deref(),
        config.level.as_deref(),
    );
    let filter = EnvFilter::try_new(&choice.directive)?;

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    let console = console_layer(config.format, console_writer);

    let (file, file_guard) = if config.file {
        std::fs::create_dir_all(&config.directory)?;
        let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
        let appender = daily(&config.directory, format!("{prefix}.log"));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .is_ok();
    if !installed {
        let _ = writeln!(
            std::io::stderr(),
            "tracing already initialised; keeping the existing subscriber"
        );
        return Ok(());
    }
    let _ = GUARDS.set(WriterGuards {
        _console: console_guard,
        _file: file_guard,
    });

    if let Some(rejected) = &choice.rejected {
        warn!(%rejected, "invalid log filter; defaulting to info");
    }
    info!(
        service = %service_name,
        filter = %choice.directive,
        filter_source = %choice.source,
        log_dir = %config.directory.display(),
        file_output = config.file,
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}
