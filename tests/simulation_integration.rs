//! ---
//! gh_section: "15-testing-qa"
//! gh_subsection: "integration-tests"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "End-to-end tick loop runs against the file-backed store."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use greenhouse_persistence::PersistenceMetrics;
use greenhouse_sim::store::READINGS_FILE;
use greenhouse_sim::{
    FileStore, Preset, RunOptions, SimulationRunner, SimulationStore, Weather,
};
use prometheus::Registry;
use tempfile::tempdir;

fn options(preset: Preset, ticks: u64) -> RunOptions {
    greenhouse_logging::init();
    RunOptions {
        preset,
        interval: Duration::from_secs(5),
        seed: Some(11),
        max_ticks: Some(ticks),
        ..RunOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn presets_seed_the_initial_reading() {
    let cases = [
        (Preset::Optimal, Weather::ClearSky, 22.0),
        (Preset::ColdStart, Weather::Cloudy, 15.0),
        (Preset::HotHumid, Weather::Sunny, 30.0),
    ];
    for (preset, weather, temperature) in cases {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), None).unwrap();
        let handle = SimulationRunner::new(store, options(preset, 1)).start().unwrap();
        let initial = handle.startup().initial.clone();
        assert_eq!(initial.tick, 0);
        assert_eq!(initial.weather, weather, "{preset}");
        let tolerance = temperature * 0.05;
        assert!(
            (initial.conditions.temperature - temperature).abs() <= tolerance,
            "{preset}: {}",
            initial.conditions.temperature
        );
        handle.join().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn readings_survive_restart_and_continue() {
    let dir = tempdir().unwrap();
    let first = SimulationRunner::new(
        FileStore::open(dir.path(), None).unwrap(),
        options(Preset::ColdStart, 4),
    )
    .start()
    .unwrap()
    .join()
    .await
    .unwrap();
    assert_eq!(first.last_tick, 4);
    drop(first);

    let continued = RunOptions {
        clear_data: false,
        ..options(Preset::Optimal, 3)
    };
    let report = SimulationRunner::new(FileStore::open(dir.path(), None).unwrap(), continued)
        .start()
        .unwrap()
        .join()
        .await
        .unwrap();
    let ticks: Vec<u64> = report
        .store
        .readings()
        .unwrap()
        .iter()
        .map(|reading| reading.tick)
        .collect();
    assert_eq!(ticks, (0..=7).collect::<Vec<u64>>());
    drop(report);

    let fresh = SimulationRunner::new(
        FileStore::open(dir.path(), None).unwrap(),
        options(Preset::Optimal, 1),
    )
    .start()
    .unwrap();
    assert_eq!(fresh.startup().cleared.unwrap().readings, 8);
    let report = fresh.join().await.unwrap();
    assert_eq!(report.store.reading_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn closed_loop_run_updates_persistence_metrics() {
    let dir = tempdir().unwrap();
    let registry = Arc::new(Registry::new());
    let metrics = PersistenceMetrics::new(registry).unwrap();
    let store = FileStore::open(dir.path(), Some(metrics.clone())).unwrap();
    let run = RunOptions {
        closed_loop: true,
        ..options(Preset::HotHumid, 4)
    };

    let report = SimulationRunner::new(store, run).start().unwrap().join().await.unwrap();
    assert_eq!(report.store.reading_count(), 5);
    assert_eq!(report.store.command_count(), 4);
    assert!(report.store.equipment_verified());

    let text = metrics.render_text().unwrap();
    assert!(text.contains("greenhouse_records_appended_total{stream=\"readings\"} 5"));
    assert!(text.contains("greenhouse_records_appended_total{stream=\"commands\"} 4"));
    assert!(text.contains("greenhouse_snapshots_saved_total 5"));
    assert!(text.contains("greenhouse_streams_cleared_total{stream=\"readings\"} 1"));
}

#[tokio::test(start_paused = true)]
async fn readings_log_is_json_lines_with_header() {
    let dir = tempdir().unwrap();
    SimulationRunner::new(
        FileStore::open(dir.path(), None).unwrap(),
        options(Preset::Optimal, 2),
    )
    .start()
    .unwrap()
    .join()
    .await
    .unwrap();

    let contents = fs::read_to_string(dir.path().join(READINGS_FILE)).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["stream"], "readings");
    for (index, entry) in lines[1..].iter().enumerate() {
        assert_eq!(entry["sequence"], index as u64 + 1);
        assert_eq!(entry["record"]["tick"], index as u64);
        for field in [
            "temperature",
            "humidity",
            "soil_moisture",
            "light_intensity",
            "co2_concentration",
        ] {
            assert!(entry["record"][field].is_f64(), "{field}");
        }
    }
}
