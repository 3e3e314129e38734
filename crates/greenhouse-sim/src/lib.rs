//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Greenhouse simulation engine and dataset tooling."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
//! Greenhouse environment simulation: the weather/equipment model, the
//! periodic tick loop, the threshold controller and the dataset tooling
//! built on top of them.

pub mod dataset;
pub mod decision;
pub mod generator;
pub mod model;
pub mod presets;
pub mod runner;
pub mod schedule;
pub mod split;
pub mod store;

pub use dataset::{TrainingOptions, TrainingRow, TrainingRun, TrainingWriter};
pub use decision::{DecisionModel, DecisionThresholds};
pub use generator::GreenhouseGenerator;
pub use model::{CommandRecord, Conditions, Equipment, EquipmentSet, Metric, Reading, Weather};
pub use presets::Preset;
pub use runner::{
    RunOptions, RunReport, RunnerHandle, RunnerStatus, SimulationRunner, StartupReport, TickEvent,
};
pub use split::{SplitOptions, SplitRatios, SplitReport};
pub use store::{FileStore, MemoryStore, SimulationStore, StoreSummary};
