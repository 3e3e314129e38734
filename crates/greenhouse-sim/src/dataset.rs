//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Closed-loop training data generation and CSV export."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use strum::IntoEnumIterator;

use crate::decision::{DecisionModel, DecisionThresholds};
use crate::generator::GreenhouseGenerator;
use crate::model::{CommandRecord, Conditions, Equipment, EquipmentSet, Metric};
use crate::presets::Preset;
use crate::store::{MemoryStore, SimulationStore};

pub const DEFAULT_SAMPLES: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Parameters of a training data run.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub preset: Preset,
    /// Rows to keep. One extra warm-up tick is simulated and discarded.
    pub samples: usize,
    pub seed: u64,
    pub with_prev_state: bool,
    pub thresholds: DecisionThresholds,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            samples: DEFAULT_SAMPLES,
            seed: DEFAULT_SEED,
            with_prev_state: false,
            thresholds: DecisionThresholds::default(),
        }
    }
}

impl TrainingOptions {
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(anyhow!("samples must be greater than zero"));
        }
        Ok(())
    }

    /// `{preset}_samples{n}_seed{seed}_{YYYYmmdd-HHMMSS}.csv`
    pub fn file_name(&self, at: DateTime<Local>) -> String {
        format!(
            "{}_samples{}_seed{}_{}.csv",
            self.preset,
            self.samples,
            self.seed,
            at.format("%Y%m%d-%H%M%S")
        )
    }
}

/// One kept sample: the reading, the equipment before the decision and the decision.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    /// Zero-based index among kept rows.
    pub index: usize,
    pub conditions: Conditions,
    pub previous: EquipmentSet,
    pub command: EquipmentSet,
}

/// Iterator over closed-loop samples. Runs on its own store so persisted
/// simulation data is never touched.
#[derive(Debug)]
pub struct TrainingRun<S = MemoryStore> {
    generator: GreenhouseGenerator,
    model: DecisionModel,
    store: S,
    steps_total: usize,
    step: usize,
}

impl TrainingRun<MemoryStore> {
    pub fn new(options: &TrainingOptions) -> Result<Self> {
        Self::with_store(options, MemoryStore::new())
    }
}

impl<S: SimulationStore> TrainingRun<S> {
    pub fn with_store(options: &TrainingOptions, mut store: S) -> Result<Self> {
        options.validate()?;
        let mut generator = GreenhouseGenerator::new(options.preset, Some(options.seed));
        let initial = generator.initialize();
        store.save_equipment(&generator.equipment())?;
        store.append_reading(&initial)?;
        Ok(Self {
            generator,
            model: DecisionModel::new(options.thresholds),
            store,
            steps_total: options.samples + 1,
            step: 0,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn advance(&mut self) -> Result<TrainingRow> {
        let reading = self.generator.next_reading();
        self.store.append_reading(&reading)?;
        let previous = self.generator.equipment();
        let last_command = self.store.latest_command().map(|record| record.equipment);
        let command = self.model.decide(&reading.conditions, last_command.as_ref());
        self.store.append_command(&CommandRecord {
            tick: reading.tick,
            timestamp: reading.timestamp,
            equipment: command,
        })?;
        self.store.save_equipment(&command)?;
        self.generator.set_equipment(command);
        Ok(TrainingRow {
            index: self.step.saturating_sub(1),
            conditions: reading.conditions,
            previous,
            command,
        })
    }
}

impl<S: SimulationStore> Iterator for TrainingRun<S> {
    type Item = Result<TrainingRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.step < self.steps_total {
            let row = self.advance();
            let step = self.step;
            self.step += 1;
            match row {
                // The first tick only warms up the closed loop.
                Ok(_) if step == 0 => continue,
                other => return Some(other),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.steps_total.saturating_sub(self.step.max(1));
        (remaining, Some(remaining))
    }
}

/// Column names in output order.
pub fn header(with_prev_state: bool) -> Vec<String> {
    let mut columns: Vec<String> = Metric::iter().map(|metric| metric.to_string()).collect();
    if with_prev_state {
        columns.extend(Equipment::iter().map(|unit| format!("prev_{unit}")));
    }
    columns.extend(Equipment::iter().map(|unit| unit.to_string()));
    columns
}

/// Streaming CSV writer for [`TrainingRow`]s.
pub struct TrainingWriter<W: Write> {
    writer: csv::Writer<W>,
    with_prev_state: bool,
    rows: usize,
}

impl<W: Write> TrainingWriter<W> {
    pub fn new(inner: W, with_prev_state: bool) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer
            .write_record(header(with_prev_state))
            .context("unable to write csv header")?;
        Ok(Self {
            writer,
            with_prev_state,
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &TrainingRow) -> Result<()> {
        let mut record: Vec<String> = Metric::iter()
            .map(|metric| format_value(row.conditions.get(metric)))
            .collect();
        if self.with_prev_state {
            record.extend(Equipment::iter().map(|unit| format_flag(row.previous.get(unit))));
        }
        record.extend(Equipment::iter().map(|unit| format_flag(row.command.get(unit))));
        self.writer
            .write_record(&record)
            .with_context(|| format!("unable to write csv row {}", row.index))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and return the number of data rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush().context("unable to flush csv output")?;
        Ok(self.rows)
    }
}

/// Run a full training session and write it to `path`, creating parent directories.
pub fn generate_training_file(options: &TrainingOptions, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create {}", parent.display()))?;
        }
    }
    let file = File::create(path).with_context(|| format!("unable to create {}", path.display()))?;
    let mut writer = TrainingWriter::new(file, options.with_prev_state)?;
    for row in TrainingRun::new(options)? {
        writer.write_row(&row?)?;
    }
    writer.finish()
}

/// Resolve the output path from an explicit file name or the default naming scheme.
pub fn output_path(options: &TrainingOptions, dir: &Path, file_name: Option<&str>) -> PathBuf {
    match file_name {
        Some(name) => dir.join(name),
        None => dir.join(options.file_name(Local::now())),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn format_value(value: f64) -> String {
    round2(value).to_string()
}

fn format_flag(on: bool) -> String {
    if on { "True" } else { "False" }.to_owned()
}
