//! ---
//! gh_section: "05-external-interfaces"
//! gh_subsection: "binary"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Command line entrypoint for running the greenhouse simulator."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use greenhouse_common::config::AppConfig;
use greenhouse_common::logging::init_tracing;
use greenhouse_sim::Preset;
use tracing::info;

mod run;
mod split;
mod status;
mod training;

const DEFAULT_CONFIG_PATH: &str = "configs/greenhouse.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Greenhouse environment simulator",
    long_about = None
)]
struct Cli {
    /// Settings file; falls back to GREENHOUSE_CONFIG, then configs/greenhouse.toml.
    #[arg(long = "config-file", global = true, value_name = "PATH")]
    config_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the periodic simulation loop until interrupted.
    #[command(name = "run-simulation", alias = "run_simulation")]
    RunSimulation(run::RunArgs),
    /// Generate a closed-loop training dataset as CSV.
    #[command(name = "generate-training-data", alias = "generate_training_data")]
    GenerateTrainingData(training::TrainingArgs),
    /// Split every CSV in a directory into train/val/test partitions.
    #[command(name = "split-dataset", alias = "split_dataset")]
    SplitDataset(split::SplitArgs),
    /// Show the persisted simulation state.
    Status(status::StatusArgs),
}

/// Starting configuration names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub(crate) enum PresetArg {
    Optimal,
    ColdStart,
    HotHumid,
    Random,
}

impl From<PresetArg> for Preset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Optimal => Preset::Optimal,
            PresetArg::ColdStart => Preset::ColdStart,
            PresetArg::HotHumid => Preset::HotHumid,
            PresetArg::Random => Preset::Random,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = AppConfig::load_with_source(
        cli.config_file.as_deref(),
        &[PathBuf::from(DEFAULT_CONFIG_PATH)],
    )?;
    init_tracing("greenhousectl", &loaded.config.logging)?;
    match &loaded.source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    let config = loaded.config;
    match cli.command {
        Commands::RunSimulation(args) => run::run(args, &config).await,
        Commands::GenerateTrainingData(args) => training::run(args, &config).await,
        Commands::SplitDataset(args) => split::run(args),
        Commands::Status(args) => status::run(args, &config),
    }
}
