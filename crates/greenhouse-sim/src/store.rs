//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Storage seam for readings, commands and equipment state."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use greenhouse_persistence::{
    load_snapshot, save_snapshot, verify_snapshot, PersistenceMetrics, RecordLog,
    RecordLogReader,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{CommandRecord, EquipmentSet, Reading};

pub const READINGS_FILE: &str = "readings.jsonl";
pub const COMMANDS_FILE: &str = "commands.jsonl";
pub const EQUIPMENT_FILE: &str = "equipment.json";

const READINGS_STREAM: &str = "readings";
const COMMANDS_STREAM: &str = "commands";

/// Records removed by [`SimulationStore::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub readings: usize,
    pub commands: usize,
}

/// Persistence used by the tick loop and the dataset generator.
pub trait SimulationStore: Send {
    /// Drop every reading and command. The equipment state is left in place.
    fn clear(&mut self) -> Result<ClearSummary>;
    fn append_reading(&mut self, reading: &Reading) -> Result<()>;
    fn append_command(&mut self, command: &CommandRecord) -> Result<()>;
    fn latest_reading(&self) -> Option<&Reading>;
    fn latest_command(&self) -> Option<&CommandRecord>;
    fn reading_count(&self) -> usize;
    fn command_count(&self) -> usize;
    fn readings(&self) -> Result<Vec<Reading>>;
    fn commands(&self) -> Result<Vec<CommandRecord>>;
    /// Stored equipment state, `None` when nothing was saved yet.
    fn equipment(&self) -> Result<Option<EquipmentSet>>;
    fn save_equipment(&mut self, equipment: &EquipmentSet) -> Result<()>;
}

/// Read-only view of a data directory, produced by [`FileStore::inspect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub data_dir: PathBuf,
    pub readings: usize,
    pub commands: usize,
    pub latest_reading: Option<Reading>,
    pub equipment: Option<EquipmentSet>,
    pub equipment_verified: bool,
}

/// Store backed by JSON-lines record logs and a hashed equipment snapshot.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    readings: RecordLog<Reading>,
    commands: RecordLog<CommandRecord>,
    latest_reading: Option<Reading>,
    latest_command: Option<CommandRecord>,
    metrics: Option<PersistenceMetrics>,
}

impl FileStore {
    pub fn open(root: &Path, metrics: Option<PersistenceMetrics>) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("unable to create data directory {}", root.display()))?;
        let readings = RecordLog::<Reading>::open(&root.join(READINGS_FILE), READINGS_STREAM)
            .with_context(|| format!("unable to open {READINGS_FILE} in {}", root.display()))?;
        let commands = RecordLog::<CommandRecord>::open(&root.join(COMMANDS_FILE), COMMANDS_STREAM)
            .with_context(|| format!("unable to open {COMMANDS_FILE} in {}", root.display()))?;
        let latest_reading = readings
            .last()
            .context("unable to read latest reading")?
            .map(|entry| entry.record);
        let latest_command = commands
            .last()
            .context("unable to read latest command")?
            .map(|entry| entry.record);
        debug!(
            root = %root.display(),
            readings = readings.len(),
            commands = commands.len(),
            "file store opened"
        );
        Ok(Self {
            root: root.to_path_buf(),
            readings,
            commands,
            latest_reading,
            latest_command,
            metrics,
        })
    }

    /// Summarize a data directory without creating, repairing or writing anything.
    pub fn inspect(root: &Path) -> Result<StoreSummary> {
        let (readings, latest_reading) = scan_log::<Reading>(&root.join(READINGS_FILE))?;
        let (commands, _) = scan_log::<CommandRecord>(&root.join(COMMANDS_FILE))?;
        let equipment_path = root.join(EQUIPMENT_FILE);
        let equipment = if equipment_path.exists() {
            match load_snapshot(&equipment_path) {
                Ok(equipment) => Some(equipment),
                Err(err) => {
                    warn!(path = %equipment_path.display(), error = %err, "equipment snapshot rejected");
                    None
                }
            }
        } else {
            None
        };
        Ok(StoreSummary {
            data_dir: root.to_path_buf(),
            readings,
            commands,
            latest_reading,
            equipment,
            equipment_verified: verify_snapshot(&equipment_path),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn equipment_path(&self) -> PathBuf {
        self.root.join(EQUIPMENT_FILE)
    }

    /// Whether the equipment snapshot exists and passes its integrity check.
    pub fn equipment_verified(&self) -> bool {
        verify_snapshot(&self.equipment_path())
    }

    pub fn metrics(&self) -> Option<&PersistenceMetrics> {
        self.metrics.as_ref()
    }

    fn record_outcome(&self, stream: &str, outcome: &Result<(u64, usize)>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match outcome {
            Ok((_, bytes)) => metrics.record_append(stream, *bytes),
            Err(_) => metrics.record_write_failure(stream),
        }
    }
}

impl SimulationStore for FileStore {
    fn clear(&mut self) -> Result<ClearSummary> {
        let readings = self
            .readings
            .truncate()
            .context("unable to clear readings")?;
        let commands = self
            .commands
            .truncate()
            .context("unable to clear commands")?;
        self.latest_reading = None;
        self.latest_command = None;
        if let Some(metrics) = &self.metrics {
            metrics.record_clear(READINGS_STREAM);
            metrics.record_clear(COMMANDS_STREAM);
        }
        Ok(ClearSummary { readings, commands })
    }

    fn append_reading(&mut self, reading: &Reading) -> Result<()> {
        let outcome = self.readings.append(reading).map_err(anyhow::Error::from);
        self.record_outcome(READINGS_STREAM, &outcome);
        outcome.with_context(|| format!("unable to persist reading for tick {}", reading.tick))?;
        self.latest_reading = Some(reading.clone());
        Ok(())
    }

    fn append_command(&mut self, command: &CommandRecord) -> Result<()> {
        let outcome = self.commands.append(command).map_err(anyhow::Error::from);
        self.record_outcome(COMMANDS_STREAM, &outcome);
        outcome.with_context(|| format!("unable to persist command for tick {}", command.tick))?;
        self.latest_command = Some(command.clone());
        Ok(())
    }

    fn latest_reading(&self) -> Option<&Reading> {
        self.latest_reading.as_ref()
    }

    fn latest_command(&self) -> Option<&CommandRecord> {
        self.latest_command.as_ref()
    }

    fn reading_count(&self) -> usize {
        self.readings.len()
    }

    fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn readings(&self) -> Result<Vec<Reading>> {
        let started = Instant::now();
        let entries = self.readings.entries().context("unable to read readings")?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_read_duration(READINGS_STREAM, started.elapsed().as_secs_f64());
        }
        Ok(entries.into_iter().map(|entry| entry.record).collect())
    }

    fn commands(&self) -> Result<Vec<CommandRecord>> {
        let started = Instant::now();
        let entries = self.commands.entries().context("unable to read commands")?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_read_duration(COMMANDS_STREAM, started.elapsed().as_secs_f64());
        }
        Ok(entries.into_iter().map(|entry| entry.record).collect())
    }

    fn equipment(&self) -> Result<Option<EquipmentSet>> {
        let path = self.equipment_path();
        if !path.exists() {
            return Ok(None);
        }
        match load_snapshot(&path) {
            Ok(equipment) => Ok(Some(equipment)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "equipment snapshot rejected");
                Err(err).with_context(|| format!("unable to load {}", path.display()))
            }
        }
    }

    fn save_equipment(&mut self, equipment: &EquipmentSet) -> Result<()> {
        let path = self.equipment_path();
        save_snapshot(equipment, &path)
            .with_context(|| format!("unable to save {}", path.display()))?;
        if let Some(metrics) = &self.metrics {
            metrics.record_snapshot_saved();
        }
        Ok(())
    }
}

fn scan_log<T: DeserializeOwned>(path: &Path) -> Result<(usize, Option<T>)> {
    if !path.exists() {
        return Ok((0, None));
    }
    let mut count = 0;
    let mut last = None;
    for entry in RecordLogReader::<T>::open(path)
        .with_context(|| format!("unable to read {}", path.display()))?
    {
        last = Some(entry?.record);
        count += 1;
    }
    Ok((count, last))
}

/// Volatile store used for dataset generation and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    readings: Vec<Reading>,
    commands: Vec<CommandRecord>,
    equipment: Option<EquipmentSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulationStore for MemoryStore {
    fn clear(&mut self) -> Result<ClearSummary> {
        let summary = ClearSummary {
            readings: self.readings.len(),
            commands: self.commands.len(),
        };
        self.readings.clear();
        self.commands.clear();
        Ok(summary)
    }

    fn append_reading(&mut self, reading: &Reading) -> Result<()> {
        self.readings.push(reading.clone());
        Ok(())
    }

    fn append_command(&mut self, command: &CommandRecord) -> Result<()> {
        self.commands.push(command.clone());
        Ok(())
    }

    fn latest_reading(&self) -> Option<&Reading> {
        self.readings.last()
    }

    fn latest_command(&self) -> Option<&CommandRecord> {
        self.commands.last()
    }

    fn reading_count(&self) -> usize {
        self.readings.len()
    }

    fn command_count(&self) -> usize {
        self.commands.len()
    }

    fn readings(&self) -> Result<Vec<Reading>> {
        Ok(self.readings.clone())
    }

    fn commands(&self) -> Result<Vec<CommandRecord>> {
        Ok(self.commands.clone())
    }

    fn equipment(&self) -> Result<Option<EquipmentSet>> {
        Ok(self.equipment)
    }

    fn save_equipment(&mut self, equipment: &EquipmentSet) -> Result<()> {
        self.equipment = Some(*equipment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Conditions, Equipment, Weather};
    use chrono::Utc;
    use prometheus::Registry;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn reading(tick: u64) -> Reading {
        Reading {
            tick,
            timestamp: Utc::now(),
            conditions: Conditions::new(22.0, 65.0, 60.0, 5_000.0, 400.0),
            weather: Weather::ClearSky,
        }
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path(), None).unwrap();
            store.append_reading(&reading(0)).unwrap();
            store.append_reading(&reading(1)).unwrap();
            store
                .save_equipment(&EquipmentSet::all_off().with(Equipment::Heater, true))
                .unwrap();
        }
        let store = FileStore::open(dir.path(), None).unwrap();
        assert_eq!(store.reading_count(), 2);
        assert_eq!(store.latest_reading().unwrap().tick, 1);
        assert!(store.equipment().unwrap().unwrap().heater);
        assert!(store.equipment_verified());
        let ticks: Vec<u64> = store.readings().unwrap().iter().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![0, 1]);
    }

    #[test]
    fn open_recovers_from_a_torn_reading() {
        let dir = tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path(), None).unwrap();
            store.append_reading(&reading(0)).unwrap();
            store.append_reading(&reading(1)).unwrap();
        }
        let path = dir.path().join(READINGS_FILE);
        let mut contents = fs::read(&path).unwrap();
        contents.extend_from_slice(br#"{"sequence":3,"timest"#);
        fs::write(&path, contents).unwrap();

        let summary = FileStore::inspect(dir.path()).unwrap();
        assert_eq!(summary.readings, 2);

        let mut store = FileStore::open(dir.path(), None).unwrap();
        assert_eq!(store.reading_count(), 2);
        assert_eq!(store.latest_reading().unwrap().tick, 1);
        store.append_reading(&reading(2)).unwrap();
        assert_eq!(store.readings().unwrap().len(), 3);
    }

    #[test]
    fn inspect_reports_contents_without_writing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("never-created");
        let empty = FileStore::inspect(&missing).unwrap();
        assert_eq!(empty.readings, 0);
        assert!(empty.latest_reading.is_none());
        assert!(empty.equipment.is_none());
        assert!(!empty.equipment_verified);
        assert!(!missing.exists());

        {
            let mut store = FileStore::open(dir.path(), None).unwrap();
            store.append_reading(&reading(4)).unwrap();
            store
                .save_equipment(&EquipmentSet::all_off().with(Equipment::Lights, true))
                .unwrap();
        }
        let summary = FileStore::inspect(dir.path()).unwrap();
        assert_eq!(summary.readings, 1);
        assert_eq!(summary.commands, 0);
        assert_eq!(summary.latest_reading.map(|r| r.tick), Some(4));
        assert_eq!(summary.equipment.map(|set| set.lights), Some(true));
        assert!(summary.equipment_verified);
    }

    #[test]
    fn clear_drops_readings_and_commands() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(Registry::new());
        let metrics = PersistenceMetrics::new(registry).unwrap();
        let mut store = FileStore::open(dir.path(), Some(metrics)).unwrap();
        store.append_reading(&reading(0)).unwrap();
        store
            .append_command(&CommandRecord {
                tick: 1,
                timestamp: Utc::now(),
                equipment: EquipmentSet::all_off(),
            })
            .unwrap();

        let summary = store.clear().unwrap();
        assert_eq!(summary, ClearSummary { readings: 1, commands: 1 });
        assert_eq!(store.reading_count(), 0);
        assert!(store.latest_reading().is_none());
        assert!(store.latest_command().is_none());

        let text = store.metrics().unwrap().render_text().unwrap();
        assert!(text.contains("greenhouse_streams_cleared_total{stream=\"commands\"} 1"));
    }

    #[test]
    fn missing_equipment_snapshot_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        assert!(store.equipment().unwrap().is_none());
        assert!(!store.equipment_verified());
    }

    #[test]
    fn tampered_equipment_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path(), None).unwrap();
        store.save_equipment(&EquipmentSet::all_off()).unwrap();
        let path = store.equipment_path();
        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\"heater\": false", "\"heater\": true")).unwrap();
        assert!(store.equipment().is_err());
    }

    #[test]
    fn memory_store_behaves_like_a_log() {
        let mut store = MemoryStore::new();
        store.append_reading(&reading(0)).unwrap();
        store.append_reading(&reading(1)).unwrap();
        assert_eq!(store.latest_reading().unwrap().tick, 1);
        assert_eq!(store.clear().unwrap().readings, 2);
        assert_eq!(store.reading_count(), 0);
        assert!(store.equipment().unwrap().is_none());
    }
}
