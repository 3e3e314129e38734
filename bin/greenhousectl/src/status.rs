//! ---
//! gh_section: "05-external-interfaces"
//! gh_subsection: "binary"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "status subcommand: summary of the persisted simulation state."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use greenhouse_common::config::AppConfig;
use greenhouse_sim::{FileStore, StoreSummary};

use crate::run::{equipment_summary, tick_line};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Directory holding readings, commands and equipment state.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Print machine readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: StatusArgs, config: &AppConfig) -> Result<()> {
    let data_dir = args
        .data_dir
        .unwrap_or_else(|| config.storage.directory.clone());
    let summary = FileStore::inspect(&data_dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&summary));
    }
    Ok(())
}

fn render(summary: &StoreSummary) -> String {
    let latest = match &summary.latest_reading {
        Some(reading) => tick_line(reading),
        None => "none".to_owned(),
    };
    let equipment = match &summary.equipment {
        Some(equipment) => format!(
            "{} (verified: {})",
            equipment_summary(equipment),
            if summary.equipment_verified { "yes" } else { "no" }
        ),
        None => "not recorded".to_owned(),
    };
    format!(
        "Data directory: {}\nReadings: {}\nCommands: {}\nLatest: {latest}\nEquipment: {equipment}\n",
        summary.data_dir.display(),
        summary.readings,
        summary.commands,
    )
}
