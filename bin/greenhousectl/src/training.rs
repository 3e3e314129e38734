//! ---
//! gh_section: "05-external-interfaces"
//! gh_subsection: "binary"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "generate-training-data subcommand: closed-loop CSV datasets."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use greenhouse_common::config::AppConfig;
use greenhouse_common::time::interval_from_secs;
use greenhouse_sim::dataset::{output_path, DEFAULT_SAMPLES, DEFAULT_SEED};
use greenhouse_sim::{DecisionThresholds, TrainingOptions, TrainingRow, TrainingRun, TrainingWriter};
use tracing::info;

use crate::run::equipment_summary;
use crate::PresetArg;

#[derive(Debug, Args)]
pub struct TrainingArgs {
    /// Starting configuration.
    #[arg(long, value_enum, default_value = "optimal")]
    pub config: PresetArg,
    /// Number of rows to write.
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: usize,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
    /// Output directory.
    #[arg(long, default_value = "datasets", value_name = "DIR")]
    pub outdir: PathBuf,
    /// Output file name inside the output directory.
    #[arg(long, value_name = "FILE")]
    pub output: Option<String>,
    /// Seconds to pause between samples.
    #[arg(long)]
    pub interval: Option<f64>,
    /// Print every generated row.
    #[arg(long)]
    pub show: bool,
    /// Add the equipment state before each decision as prev_* columns.
    #[arg(long)]
    pub with_prev_state: bool,
}

impl TrainingArgs {
    fn options(&self, config: &AppConfig) -> TrainingOptions {
        TrainingOptions {
            preset: self.config.into(),
            samples: self.samples,
            seed: self.seed,
            with_prev_state: self.with_prev_state,
            thresholds: DecisionThresholds::from(&config.thresholds),
        }
    }
}

pub async fn run(args: TrainingArgs, config: &AppConfig) -> Result<()> {
    let options = args.options(config);
    options.validate()?;
    let pause = args.interval.map(interval_from_secs).transpose()?;
    let path = output_path(&options, &args.outdir, args.output.as_deref());

    fs::create_dir_all(&args.outdir)
        .with_context(|| format!("unable to create {}", args.outdir.display()))?;
    let file = File::create(&path).with_context(|| format!("unable to create {}", path.display()))?;
    let mut writer = TrainingWriter::new(file, options.with_prev_state)?;

    eprintln!(
        "Generating {} samples with '{}' configuration (seed {})",
        options.samples, options.preset, options.seed
    );
    for row in TrainingRun::new(&options)? {
        let row = row?;
        writer.write_row(&row)?;
        if args.show {
            println!("{}", row_line(&row));
        }
        if let Some(pause) = pause {
            tokio::time::sleep(pause).await;
        }
    }
    let rows = writer.finish()?;

    info!(path = %path.display(), rows, preset = %options.preset, "training data written");
    eprintln!("Wrote {rows} rows to {}", path.display());
    Ok(())
}

fn row_line(row: &TrainingRow) -> String {
    let conditions = &row.conditions;
    format!(
        "{:5} | T={:.2} H={:.2} S={:.2} L={:.2} CO2={:.2} | {}",
        row.index,
        conditions.temperature,
        conditions.humidity,
        conditions.soil_moisture,
        conditions.light_intensity,
        conditions.co2_concentration,
        equipment_summary(&row.command)
    )
}
