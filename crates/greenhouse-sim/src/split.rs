//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Per-file deterministic train/val/test split of CSV datasets."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

const RATIO_TOLERANCE: f64 = 1e-9;

/// Fractions of each file assigned to the three partitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.70,
            val: 0.15,
            test: 0.15,
        }
    }
}

impl SplitRatios {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("train", self.train), ("val", self.val), ("test", self.test)] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{name} ratio must be a non-negative number, got {value}"));
            }
        }
        let sum = self.train + self.val + self.test;
        if (sum - 1.0).abs() > RATIO_TOLERANCE {
            return Err(anyhow!("train + val + test must sum to 1.0, got {sum}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub seed: u64,
    pub ratios: SplitRatios,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.train + self.val + self.test
    }

    fn add(&mut self, other: SplitCounts) {
        self.train += other.train;
        self.val += other.val;
        self.test += other.test;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSplit {
    pub file_name: String,
    pub counts: SplitCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
    pub files: Vec<FileSplit>,
    pub totals: SplitCounts,
}

/// Partition sizes for `rows` rows: floors for train and val, the rest is test.
pub fn split_sizes(rows: usize, ratios: &SplitRatios) -> SplitCounts {
    let train = (rows as f64 * ratios.train).floor() as usize;
    let val = ((rows as f64 * ratios.val).floor() as usize).min(rows - train);
    SplitCounts {
        train,
        val,
        test: rows - train - val,
    }
}

/// Stable per-file shuffle seed, distinct across file names.
pub fn file_seed(file_name: &str, seed: u64) -> u64 {
    let digest = Sha256::digest(file_name.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) ^ seed) & 0xFFFF_FFFF
}

/// Split every `*.csv` directly under the input directory into
/// `train/`, `val/` and `test/` below the output directory.
pub fn split_directory(options: &SplitOptions) -> Result<SplitReport> {
    options.ratios.validate()?;
    let files = csv_files(&options.input_dir)?;
    if files.is_empty() {
        return Err(anyhow!(
            "no .csv files found in {}",
            options.input_dir.display()
        ));
    }

    let dirs = ["train", "val", "test"].map(|part| options.output_dir.join(part));
    for dir in &dirs {
        fs::create_dir_all(dir).with_context(|| format!("unable to create {}", dir.display()))?;
    }

    let mut report = SplitReport::default();
    for path in files {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("non UTF-8 file name {}", path.display()))?
            .to_owned();
        let counts = split_file(&path, &file_name, &dirs, options)
            .with_context(|| format!("unable to split {}", path.display()))?;
        info!(
            file = %file_name,
            train = counts.train,
            val = counts.val,
            test = counts.test,
            "dataset split"
        );
        report.totals.add(counts);
        report.files.push(FileSplit { file_name, counts });
    }
    Ok(report)
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("input directory {} does not exist", dir.display()));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("csv"))
        .collect();
    files.sort();
    Ok(files)
}

fn split_file(
    path: &Path,
    file_name: &str,
    dirs: &[PathBuf; 3],
    options: &SplitOptions,
) -> Result<SplitCounts> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let seed = file_seed(file_name, options.seed);
    rows.shuffle(&mut StdRng::seed_from_u64(seed));
    debug!(file = %file_name, seed, rows = rows.len(), "rows shuffled");

    let counts = split_sizes(rows.len(), &options.ratios);
    let (train, rest) = rows.split_at(counts.train);
    let (val, test) = rest.split_at(counts.val);
    for (dir, part) in dirs.iter().zip([train, val, test]) {
        let target = dir.join(file_name);
        let mut writer = csv::Writer::from_path(&target)
            .with_context(|| format!("unable to create {}", target.display()))?;
        writer.write_record(&headers)?;
        for row in part {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn write_csv(dir: &Path, name: &str, rows: usize) {
        let mut writer = csv::Writer::from_path(dir.join(name)).unwrap();
        writer.write_record(["temperature", "heater"]).unwrap();
        for index in 0..rows {
            writer
                .write_record([index.to_string(), "False".to_owned()])
                .unwrap();
        }
        writer.flush().unwrap();
    }

    fn read_first_column(path: &Path) -> Vec<String> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader
            .records()
            .map(|record| record.unwrap()[0].to_owned())
            .collect()
    }

    #[test]
    fn sizes_follow_floor_rule() {
        let ratios = SplitRatios::default();
        assert_eq!(
            split_sizes(1000, &ratios),
            SplitCounts { train: 700, val: 150, test: 150 }
        );
        assert_eq!(
            split_sizes(11, &ratios),
            SplitCounts { train: 7, val: 1, test: 3 }
        );
        assert_eq!(split_sizes(0, &ratios).total(), 0);
    }

    #[test]
    fn ratios_must_sum_to_one() {
        assert!(SplitRatios::default().validate().is_ok());
        let bad = SplitRatios { train: 0.8, val: 0.15, test: 0.15 };
        assert!(bad.validate().is_err());
        let negative = SplitRatios { train: 1.2, val: -0.2, test: 0.0 };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn file_seed_is_stable_and_name_dependent() {
        assert_eq!(file_seed("a.csv", 42), file_seed("a.csv", 42));
        assert_ne!(file_seed("a.csv", 42), file_seed("b.csv", 42));
        assert!(file_seed("a.csv", 42) <= 0xFFFF_FFFF);
    }

    #[test]
    fn split_covers_every_row_once() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_csv(input.path(), "optimal.csv", 40);
        write_csv(input.path(), "cold_start.csv", 21);
        fs::write(input.path().join("notes.txt"), "ignored").unwrap();

        let options = SplitOptions {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            seed: 42,
            ratios: SplitRatios::default(),
        };
        let report = split_directory(&options).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].file_name, "cold_start.csv");
        assert_eq!(report.totals.total(), 61);
        assert_eq!(report.files[1].counts, SplitCounts { train: 28, val: 6, test: 6 });

        let mut seen = BTreeSet::new();
        for part in ["train", "val", "test"] {
            for value in read_first_column(&output.path().join(part).join("optimal.csv")) {
                assert!(seen.insert(value));
            }
        }
        assert_eq!(seen.len(), 40);
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let input = tempdir().unwrap();
        write_csv(input.path(), "random.csv", 30);
        let run = |seed: u64| {
            let output = tempdir().unwrap();
            let options = SplitOptions {
                input_dir: input.path().to_path_buf(),
                output_dir: output.path().to_path_buf(),
                seed,
                ratios: SplitRatios::default(),
            };
            split_directory(&options).unwrap();
            read_first_column(&output.path().join("train").join("random.csv"))
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }

    #[test]
    fn empty_input_directory_is_an_error() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let options = SplitOptions {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            seed: 42,
            ratios: SplitRatios::default(),
        };
        assert!(split_directory(&options).is_err());
    }
}
