//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Periodic tick loop: lifecycle, scheduling and per-tick persistence."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use greenhouse_common::config::{SimulationConfig, ThresholdConfig};
use greenhouse_common::metrics::{JitterSummary, LoopTimingReporter};
use greenhouse_common::time::jitter_us;
use greenhouse_logging::{gh_debug, gh_error, gh_info, log_system_event, LogContext, SystemEventOutcome};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::decision::{DecisionModel, DecisionThresholds};
use crate::generator::GreenhouseGenerator;
use crate::model::{CommandRecord, EquipmentSet, Reading, Weather};
use crate::presets::Preset;
use crate::schedule::RateLimiter;
use crate::store::{ClearSummary, SimulationStore};

/// Tick interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Parameters of a single simulation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub preset: Preset,
    pub interval: Duration,
    /// Drop persisted readings and commands before starting.
    pub clear_data: bool,
    pub seed: Option<u64>,
    /// Stop after this many loop ticks. The initial reading is not counted.
    pub max_ticks: Option<u64>,
    /// Run the decision model each tick and apply its command.
    pub closed_loop: bool,
    pub thresholds: DecisionThresholds,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            interval: DEFAULT_INTERVAL,
            clear_data: true,
            seed: None,
            max_ticks: None,
            closed_loop: false,
            thresholds: DecisionThresholds::default(),
        }
    }
}

impl RunOptions {
    /// Derive run options from the `[simulation]` and `[thresholds]` sections.
    pub fn from_config(simulation: &SimulationConfig, thresholds: &ThresholdConfig) -> Result<Self> {
        let preset = Preset::from_str(&simulation.preset)
            .map_err(|_| anyhow!("unknown preset '{}'", simulation.preset))?;
        if simulation.interval.is_zero() {
            return Err(anyhow!("simulation interval must be greater than zero"));
        }
        Ok(Self {
            preset,
            interval: simulation.interval,
            seed: simulation.seed,
            closed_loop: simulation.closed_loop,
            thresholds: DecisionThresholds::from(thresholds),
            ..Self::default()
        })
    }

    fn mode_label(&self) -> &'static str {
        if self.closed_loop {
            "closed-loop"
        } else {
            "open-loop"
        }
    }
}

/// Live view of a running simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerStatus {
    pub running: bool,
    pub tick: u64,
    pub preset: Preset,
    pub interval: Duration,
    pub weather: Weather,
    pub closed_loop: bool,
    /// Readings persisted by this run, including the initial one.
    pub readings_written: u64,
    pub commands_written: u64,
    pub tick_errors: u64,
}

/// What happened before the first loop tick.
#[derive(Debug, Clone)]
pub struct StartupReport {
    /// The freshly persisted tick-0 reading, or the stored reading the run resumed from.
    pub initial: Reading,
    pub resumed: bool,
    pub cleared: Option<ClearSummary>,
    pub equipment: EquipmentSet,
}

/// Emitted after every successful loop tick.
#[derive(Debug, Clone)]
pub struct TickEvent {
    pub reading: Reading,
    pub command: Option<EquipmentSet>,
    /// Time since the previous loop tick, absent for the first one.
    pub spacing: Option<Duration>,
}

/// Final state handed back when the loop terminates.
#[derive(Debug)]
pub struct RunReport<S> {
    pub store: S,
    pub ticks_run: u64,
    pub last_tick: u64,
    pub readings_written: u64,
    pub tick_errors: u64,
    pub jitter: Option<JitterSummary>,
}

/// Owns the store and generator until started.
#[derive(Debug)]
pub struct SimulationRunner<S> {
    store: S,
    options: RunOptions,
}

impl<S: SimulationStore + 'static> SimulationRunner<S> {
    pub fn new(store: S, options: RunOptions) -> Self {
        Self { store, options }
    }

    /// Run startup synchronously, then spawn the tick loop onto the current tokio runtime.
    pub fn start(self) -> Result<RunnerHandle<S>> {
        let SimulationRunner { mut store, options } = self;
        let mut generator = GreenhouseGenerator::new(options.preset, options.seed);
        let startup = initialize(&mut store, &mut generator, &options)?;

        let status = Arc::new(Mutex::new(RunnerStatus {
            running: true,
            tick: generator.tick(),
            preset: options.preset,
            interval: options.interval,
            weather: generator.weather(),
            closed_loop: options.closed_loop,
            readings_written: u64::from(!startup.resumed),
            commands_written: 0,
            tick_errors: 0,
        }));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let weather = generator.weather();
        let ctx = LogContext::new()
            .with_preset(options.preset.as_ref())
            .with_tick(generator.tick())
            .with_weather(weather.as_ref())
            .with_mode(options.mode_label());
        log_system_event(
            Some(&ctx),
            "simulation.start",
            if startup.resumed {
                "simulation resumed from stored state"
            } else {
                "simulation started"
            },
            SystemEventOutcome::Success,
        );

        let state = LoopState {
            store,
            generator,
            model: DecisionModel::new(options.thresholds),
            options,
            status: status.clone(),
            events: events_tx,
        };
        let task = tokio::spawn(run_loop(state, shutdown_rx));

        Ok(RunnerHandle {
            startup,
            status,
            events: events_rx,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Lifecycle handle for a spawned tick loop.
#[derive(Debug)]
pub struct RunnerHandle<S> {
    startup: StartupReport,
    status: Arc<Mutex<RunnerStatus>>,
    events: mpsc::UnboundedReceiver<TickEvent>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<RunReport<S>>,
}

impl<S> RunnerHandle<S> {
    pub fn startup(&self) -> &StartupReport {
        &self.startup
    }

    pub fn status(&self) -> RunnerStatus {
        self.status.lock().clone()
    }

    /// Wait for the next tick. Returns `None` once the loop has terminated.
    pub async fn next_event(&mut self) -> Option<TickEvent> {
        self.events.recv().await
    }

    /// Ask the loop to stop after the tick in progress.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// Wait for the loop to terminate on its own (tick limit) or after [`Self::stop`].
    pub async fn join(self) -> Result<RunReport<S>> {
        let RunnerHandle { shutdown, task, .. } = self;
        let report = task.await.context("simulation task failed")?;
        drop(shutdown);
        Ok(report)
    }

    pub async fn shutdown(self) -> Result<RunReport<S>> {
        self.stop();
        self.join().await
    }
}

fn initialize<S: SimulationStore>(
    store: &mut S,
    generator: &mut GreenhouseGenerator,
    options: &RunOptions,
) -> Result<StartupReport> {
    let cleared = if options.clear_data {
        let summary = store.clear().context("unable to clear previous simulation data")?;
        log_system_event(
            None,
            "simulation.clear",
            &format!(
                "cleared {} readings and {} commands",
                summary.readings, summary.commands
            ),
            SystemEventOutcome::Success,
        );
        Some(summary)
    } else {
        None
    };

    if !options.clear_data {
        if let Some(latest) = store.latest_reading().cloned() {
            let equipment = store
                .equipment()
                .context("unable to restore equipment state")?
                .unwrap_or_else(|| generator.equipment());
            generator.resume(&latest, equipment);
            gh_info!(
                context = LogContext::new()
                    .with_preset(options.preset.as_ref())
                    .with_tick(latest.tick)
                    .with_weather(latest.weather.as_ref()),
                "continuing from stored reading"
            );
            return Ok(StartupReport {
                initial: latest,
                resumed: true,
                cleared,
                equipment,
            });
        }
    }

    let initial = generator.initialize();
    let equipment = generator.equipment();
    store
        .save_equipment(&equipment)
        .context("unable to store initial equipment state")?;
    store
        .append_reading(&initial)
        .context("unable to persist initial reading")?;
    Ok(StartupReport {
        initial,
        resumed: false,
        cleared,
        equipment,
    })
}

struct LoopState<S> {
    store: S,
    generator: GreenhouseGenerator,
    model: DecisionModel,
    options: RunOptions,
    status: Arc<Mutex<RunnerStatus>>,
    events: mpsc::UnboundedSender<TickEvent>,
}

impl<S: SimulationStore> LoopState<S> {
    /// Advance the generator and persist the reading.
    fn step(&mut self) -> Result<Reading> {
        let reading = self.generator.next_reading();
        self.store.append_reading(&reading)?;
        Ok(reading)
    }

    /// Decide, persist and apply the equipment command for `reading`.
    fn control(&mut self, reading: &Reading) -> Result<EquipmentSet> {
        let previous = self.store.latest_command().map(|record| record.equipment);
        let command = self.model.decide(&reading.conditions, previous.as_ref());
        self.store.append_command(&CommandRecord {
            tick: reading.tick,
            timestamp: Utc::now(),
            equipment: command,
        })?;
        self.store.save_equipment(&command)?;
        self.generator.set_equipment(command);
        Ok(command)
    }

    fn record_error(&self, mode: &str, err: &anyhow::Error) {
        self.status.lock().tick_errors += 1;
        let preset = self.options.preset;
        let ctx = LogContext::new()
            .with_preset(preset.as_ref())
            .with_tick(self.generator.tick())
            .with_mode(mode);
        gh_error!(context = ctx, "tick failed: {err:#}");
    }
}

async fn run_loop<S: SimulationStore>(
    mut state: LoopState<S>,
    mut shutdown: broadcast::Receiver<()>,
) -> RunReport<S> {
    let interval = state.options.interval;
    let mut limiter = RateLimiter::new(interval);
    let reporter = LoopTimingReporter::new(interval);
    let preset = state.options.preset;
    let mode = state.options.mode_label();
    let mut ticks_run = 0u64;

    loop {
        if let Some(limit) = state.options.max_ticks {
            if ticks_run >= limit {
                gh_info!(context = LogContext::new().with_preset(preset.as_ref()), "tick limit of {limit} reached");
                break;
            }
        }

        tokio::select! {
            _ = shutdown.recv() => {
                gh_debug!(context = LogContext::new().with_preset(preset.as_ref()), "shutdown signal received");
                break;
            }
            fired = limiter.tick() => {
                let spacing = reporter.record_tick_at(fired.into_std());
                ticks_run += 1;
                let reading = match state.step() {
                    Ok(reading) => reading,
                    Err(err) => {
                        state.record_error(mode, &err);
                        continue;
                    }
                };
                {
                    let mut status = state.status.lock();
                    status.tick = reading.tick;
                    status.weather = reading.weather;
                    status.readings_written += 1;
                }

                let command = if state.options.closed_loop {
                    match state.control(&reading) {
                        Ok(command) => {
                            state.status.lock().commands_written += 1;
                            Some(command)
                        }
                        Err(err) => {
                            state.record_error(mode, &err);
                            None
                        }
                    }
                } else {
                    None
                };

                let ctx = LogContext::new()
                    .with_preset(preset.as_ref())
                    .with_tick(reading.tick)
                    .with_weather(reading.weather.as_ref())
                    .with_mode(mode);
                gh_debug!(
                    context = ctx,
                    "reading persisted (jitter {} us)",
                    spacing.map(|actual| jitter_us(actual, interval)).unwrap_or_default()
                );
                let _ = state.events.send(TickEvent { reading, command, spacing });
            }
        }
    }

    let (readings_written, tick_errors) = {
        let mut status = state.status.lock();
        status.running = false;
        (status.readings_written, status.tick_errors)
    };
    let last_tick = state.generator.tick();
    log_system_event(
        Some(&LogContext::new().with_preset(preset.as_ref()).with_tick(last_tick).with_mode(mode)),
        "simulation.stop",
        "simulation stopped",
        SystemEventOutcome::Success,
    );

    RunReport {
        store: state.store,
        ticks_run,
        last_tick,
        readings_written,
        tick_errors,
        jitter: reporter.histogram().summary(),
    }
}
