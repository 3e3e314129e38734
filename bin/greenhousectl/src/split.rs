//! ---
//! gh_section: "05-external-interfaces"
//! gh_subsection: "binary"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "split-dataset subcommand: train/val/test partitioning of CSV files."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use greenhouse_sim::split::split_directory;
use greenhouse_sim::{SplitOptions, SplitRatios, SplitReport};

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Directory containing the CSV files to split.
    #[arg(long, default_value = "datasets", value_name = "DIR")]
    pub input_dir: PathBuf,
    /// Directory receiving train/, val/ and test/.
    #[arg(long, default_value = "datasets/splits", value_name = "DIR")]
    pub output_dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[arg(long, default_value_t = 0.70)]
    pub train: f64,
    #[arg(long, default_value_t = 0.15)]
    pub val: f64,
    #[arg(long, default_value_t = 0.15)]
    pub test: f64,
}

impl SplitArgs {
    fn options(&self) -> SplitOptions {
        SplitOptions {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            seed: self.seed,
            ratios: SplitRatios {
                train: self.train,
                val: self.val,
                test: self.test,
            },
        }
    }
}

pub fn run(args: SplitArgs) -> Result<()> {
    let report = split_directory(&args.options())?;
    print!("{}", render(&report));
    println!("Output written to {}", args.output_dir.display());
    Ok(())
}

fn render(report: &SplitReport) -> String {
    let mut out = String::new();
    for file in &report.files {
        out.push_str(&format!(
            "{:40} train={:6} val={:6} test={:6}\n",
            file.file_name, file.counts.train, file.counts.val, file.counts.test
        ));
    }
    out.push_str(&format!(
        "{:40} train={:6} val={:6} test={:6}\n",
        "TOTALS", report.totals.train, report.totals.val, report.totals.test
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenhouse_sim::split::{FileSplit, SplitCounts};

    #[test]
    fn ratios_are_checked_before_touching_files() {
        let args = SplitArgs {
            input_dir: PathBuf::from("does-not-exist"),
            output_dir: PathBuf::from("unused"),
            seed: 42,
            train: 0.9,
            val: 0.2,
            test: 0.1,
        };
        let err = run(args).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn render_lists_files_then_totals() {
        let counts = SplitCounts { train: 7, val: 1, test: 3 };
        let report = SplitReport {
            files: vec![FileSplit {
                file_name: "optimal.csv".to_owned(),
                counts,
            }],
            totals: counts,
        };
        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("optimal.csv"));
        assert!(lines[1].starts_with("TOTALS"));
        assert!(lines[1].contains("test=     3"));
    }
}
