//! ---
//! gh_section: "05-external-interfaces"
//! gh_subsection: "binary"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "run-simulation subcommand: drives the tick loop and prints readings."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use greenhouse_common::config::AppConfig;
use greenhouse_common::time::{approximate_run_duration, interval_from_secs};
use greenhouse_persistence::PersistenceMetrics;
use greenhouse_sim::{
    EquipmentSet, FileStore, Reading, RunOptions, SimulationRunner, SimulationStore,
};
use prometheus::Registry;
use tracing::{info, warn};

use crate::PresetArg;

const METRICS_FILE: &str = "metrics.prom";

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Starting configuration.
    #[arg(long, value_enum)]
    pub config: Option<PresetArg>,
    /// Seconds between ticks.
    #[arg(long)]
    pub interval: Option<f64>,
    /// Keep previously persisted readings and resume from the latest one.
    #[arg(long = "continue")]
    pub continue_run: bool,
    /// Seed the generator for a reproducible run.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Stop after this many ticks.
    #[arg(long)]
    pub ticks: Option<u64>,
    /// Apply the threshold controller every tick.
    #[arg(long)]
    pub closed_loop: bool,
    /// Directory holding readings, commands and equipment state.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

impl RunArgs {
    fn options(&self, config: &AppConfig) -> Result<RunOptions> {
        let mut options = RunOptions::from_config(&config.simulation, &config.thresholds)?;
        if let Some(preset) = self.config {
            options.preset = preset.into();
        }
        if let Some(secs) = self.interval {
            options.interval = interval_from_secs(secs)?;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options.clear_data = !self.continue_run;
        options.max_ticks = self.ticks;
        options.closed_loop |= self.closed_loop;
        Ok(options)
    }
}

pub async fn run(args: RunArgs, config: &AppConfig) -> Result<()> {
    let options = args.options(config)?;
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.directory.clone());

    let registry = Arc::new(Registry::new());
    let metrics = if config.metrics.enabled {
        Some(PersistenceMetrics::new(registry.clone())?)
    } else {
        None
    };
    let store = FileStore::open(&data_dir, metrics.clone())
        .with_context(|| format!("unable to open data directory {}", data_dir.display()))?;

    println!(
        "Starting greenhouse simulation with '{}' configuration",
        options.preset
    );
    println!("Interval: {}s", options.interval.as_secs_f64());
    if options.closed_loop {
        println!("Mode: closed loop (threshold controller active)");
    }
    println!("Press Ctrl+C to stop\n");

    let interval = options.interval;
    let mut handle = SimulationRunner::new(store, options).start()?;
    let startup = handle.startup().clone();
    if let Some(cleared) = startup.cleared {
        println!(
            "Cleared {} readings and {} commands",
            cleared.readings, cleared.commands
        );
    }
    if startup.resumed {
        println!("Resuming from tick {}", startup.initial.tick);
    } else {
        println!("Initial state:");
    }
    println!("{}", tick_line(&startup.initial));
    println!("Equipment: {}\n", equipment_summary(&startup.equipment));

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "unable to listen for ctrl-c");
                }
                println!("\nStopping simulation...");
                break;
            }
            event = handle.next_event() => match event {
                Some(event) => {
                    println!("{}", tick_line(&event.reading));
                    if let Some(command) = event.command {
                        println!("         command: {}", equipment_summary(&command));
                    }
                }
                None => break,
            },
        }
    }

    let report = handle.shutdown().await?;
    let elapsed = approximate_run_duration(report.last_tick, interval);
    println!("\nSimulation stopped.");
    println!("Total readings: {}", report.store.reading_count());
    println!("Last tick: {}", report.last_tick);
    println!("Approximate duration: {:.0}s", elapsed.as_secs_f64());
    if report.tick_errors > 0 {
        println!("Tick errors: {}", report.tick_errors);
    }
    if let Some(jitter) = report.jitter {
        info!(
            samples = jitter.samples,
            mean_ms = jitter.mean_ms,
            std_dev_ms = jitter.std_dev_ms,
            max_ms = jitter.max_ms,
            "tick jitter summary"
        );
    }

    if let Some(metrics) = metrics {
        let path = data_dir.join(METRICS_FILE);
        fs::write(&path, metrics.render_text()?)
            .with_context(|| format!("unable to write {}", path.display()))?;
        info!(path = %path.display(), "persistence metrics written");
    }
    Ok(())
}

/// `[HH:MM:SS] Tick   1 | Sunny      | T=...` console readout.
pub(crate) fn tick_line(reading: &Reading) -> String {
    let conditions = &reading.conditions;
    format!(
        "[{}] Tick {:3} | {:10} | T={:.1}°C | H={:.1}% | S={:.1}% | L={:.0}lux | CO2={:.0}ppm",
        reading.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        reading.tick,
        reading.weather.as_ref(),
        conditions.temperature,
        conditions.humidity,
        conditions.soil_moisture,
        conditions.light_intensity,
        conditions.co2_concentration,
    )
}

pub(crate) fn equipment_summary(equipment: &EquipmentSet) -> String {
    let active: Vec<&str> = equipment.active().map(|unit| unit.label()).collect();
    if active.is_empty() {
        "all off".to_owned()
    } else {
        active.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use greenhouse_sim::{Conditions, Equipment, Preset, Weather};
    use std::time::Duration;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            interval: None,
            continue_run: false,
            seed: None,
            ticks: None,
            closed_loop: false,
            data_dir: None,
        }
    }

    #[test]
    fn defaults_come_from_configuration() {
        let options = args().options(&AppConfig::default()).unwrap();
        assert_eq!(options.preset, Preset::Optimal);
        assert_eq!(options.interval, Duration::from_secs(5));
        assert!(options.clear_data);
        assert!(!options.closed_loop);
    }

    #[test]
    fn flags_override_configuration() {
        let mut run = args();
        run.config = Some(PresetArg::HotHumid);
        run.interval = Some(10.0);
        run.continue_run = true;
        run.ticks = Some(4);
        let options = run.options(&AppConfig::default()).unwrap();
        assert_eq!(options.preset, Preset::HotHumid);
        assert_eq!(options.interval, Duration::from_secs(10));
        assert!(!options.clear_data);
        assert_eq!(options.max_ticks, Some(4));
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let mut run = args();
        run.interval = Some(0.0);
        assert!(run.options(&AppConfig::default()).is_err());
    }

    #[test]
    fn tick_line_shows_every_metric() {
        let reading = Reading {
            tick: 7,
            timestamp: Utc::now(),
            conditions: Conditions::new(22.04, 60.0, 70.5, 6500.0, 800.0),
            weather: Weather::ClearSky,
        };
        let line = tick_line(&reading);
        assert!(line.contains("Tick   7"));
        assert!(line.contains("Clear_sky"));
        assert!(line.contains("T=22.0°C"));
        assert!(line.contains("L=6500lux"));
        assert!(line.contains("CO2=800ppm"));
    }

    #[test]
    fn equipment_summary_lists_active_units() {
        assert_eq!(equipment_summary(&EquipmentSet::all_off()), "all off");
        let set = EquipmentSet::all_off()
            .with(Equipment::Heater, true)
            .with(Equipment::Co2Injector, true);
        assert_eq!(equipment_summary(&set), "Heater, CO2 Injector");
    }
}
