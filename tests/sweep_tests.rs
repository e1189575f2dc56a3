// tests/sweep_tests.rs
//! Parameter sweep integration tests
//!
//! Runs small grids over a synthetic population at both granularities and
//! checks report accounting, skip behaviour and that results do not depend on
//! the number of workers.

use std::fs;
use std::path::{Path, PathBuf};

use rqa_core::config::AnalysisConfig;
use rqa_core::data::{write_synthetic_dataset, Group, ParameterGrid, RangeSpec, SyntheticDatasetSpec, TaskId};
use rqa_core::pipeline::{PipelineMetadata, PipelineOrchestrator};
use rqa_core::sweep::{ParameterSweepCoordinator, SweepGranularity, SweepRequest};
use tempfile::TempDir;

fn write_population(data_root: &Path) {
    let spec = SyntheticDatasetSpec {
        subjects_per_group: 3,
        tasks: vec![TaskId::new(1).unwrap()],
        samples: 120,
        seed: 11,
    };
    write_synthetic_dataset(data_root, "v1", &spec).unwrap();
}

fn coordinator(data_root: &Path, output_root: &Path) -> ParameterSweepCoordinator {
    let mut config = AnalysisConfig::default();
    config.paths.data_root = data_root.to_path_buf();
    config.paths.output_root = output_root.to_path_buf();
    ParameterSweepCoordinator::new(PipelineOrchestrator::new(&config))
}

fn two_point_grid() -> ParameterGrid {
    ParameterGrid {
        m_range: RangeSpec::single(2, 1),
        tau_range: RangeSpec::new(1, 2, 1),
        eps_range: RangeSpec::single(0.1, 0.05),
        lmin_range: RangeSpec::single(2, 1),
    }
}

fn request(granularity: SweepGranularity, workers: usize) -> SweepRequest {
    SweepRequest {
        grid: two_point_grid(),
        groups: Group::ALL.to_vec(),
        data_version: "v1".to_string(),
        workers,
        granularity,
        skip_completed: false,
        batch_id: Some("batch-1".to_string()),
    }
}

fn merged_outputs(paths: &[PathBuf]) -> Vec<Vec<u8>> {
    paths
        .iter()
        .map(|p| fs::read(p.join("step2_data_merging").join("merged_rqa_features.csv")).unwrap())
        .collect()
}

#[test]
fn test_combination_sweep_completes_every_point() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let report = coordinator(data.path(), out.path())
        .run(&request(SweepGranularity::Combination, 2))
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert!(report.errors.is_empty());
    assert_eq!(
        report.output_paths,
        vec![
            out.path().join("m2_tau1_eps0.100_lmin2"),
            out.path().join("m2_tau2_eps0.100_lmin2"),
        ]
    );

    for path in &report.output_paths {
        let metadata = PipelineMetadata::load(&path.join("metadata.json")).unwrap().unwrap();
        assert!(metadata.is_finished());
        assert_eq!(metadata.batch_id.as_deref(), Some("batch-1"));
        assert!(metadata.task_id.is_some());
    }
}

#[test]
fn test_skip_completed_leaves_finished_points_alone() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());
    let coordinator = coordinator(data.path(), out.path());

    let first = coordinator.run(&request(SweepGranularity::Combination, 2)).unwrap();
    assert_eq!(first.processed, 2);

    let mut again = request(SweepGranularity::Combination, 2);
    again.skip_completed = true;
    let second = coordinator.run(&again).unwrap();

    assert_eq!(second.processed, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.output_paths, first.output_paths);
}

#[test]
fn test_file_granularity_matches_combination_granularity() {
    let data = TempDir::new().unwrap();
    let by_combination = TempDir::new().unwrap();
    let by_file = TempDir::new().unwrap();
    write_population(data.path());

    let combination_report = coordinator(data.path(), by_combination.path())
        .run(&request(SweepGranularity::Combination, 2))
        .unwrap();
    let file_report = coordinator(data.path(), by_file.path())
        .run(&request(SweepGranularity::File, 3))
        .unwrap();

    // 9 trajectories x 2 combinations
    assert_eq!(file_report.processed, 18);
    assert_eq!(file_report.failed, 0);
    assert_eq!(file_report.output_paths.len(), 2);

    for path in &file_report.output_paths {
        let metadata = PipelineMetadata::load(&path.join("metadata.json")).unwrap().unwrap();
        assert!(metadata.is_finished());
    }

    assert_eq!(
        merged_outputs(&combination_report.output_paths),
        merged_outputs(&file_report.output_paths)
    );
}

#[test]
fn test_file_granularity_rerun_drops_removed_inputs() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());
    let coordinator = coordinator(data.path(), out.path());

    let first = coordinator.run(&request(SweepGranularity::File, 2)).unwrap();
    assert_eq!(first.processed, 18);

    let control_dir = data.path().join("v1").join("control");
    let mut inputs: Vec<PathBuf> = fs::read_dir(&control_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    inputs.sort();
    fs::remove_file(&inputs[0]).unwrap();

    let second = coordinator.run(&request(SweepGranularity::File, 2)).unwrap();
    assert_eq!(second.processed, 16);
    assert_eq!(second.failed, 0);

    for (path, merged) in second.output_paths.iter().zip(merged_outputs(&second.output_paths)) {
        let rows = String::from_utf8(merged).unwrap().lines().count() - 1;
        assert_eq!(rows, 8);
        let metadata = PipelineMetadata::load(&path.join("metadata.json")).unwrap().unwrap();
        assert!(metadata.is_finished());
    }
}

#[test]
fn test_results_independent_of_worker_count() {
    let data = TempDir::new().unwrap();
    let single = TempDir::new().unwrap();
    let many = TempDir::new().unwrap();
    write_population(data.path());

    let one = coordinator(data.path(), single.path())
        .run(&request(SweepGranularity::Combination, 1))
        .unwrap();
    let four = coordinator(data.path(), many.path())
        .run(&request(SweepGranularity::Combination, 4))
        .unwrap();

    assert_eq!(one.processed, four.processed);
    assert_eq!(merged_outputs(&one.output_paths), merged_outputs(&four.output_paths));
}

#[test]
fn test_sweep_request_from_config() {
    let mut config = AnalysisConfig::default();
    config.sweep.workers = 3;
    config.sweep.granularity = SweepGranularity::File;
    config.paths.data_version = "v2".to_string();

    let request = SweepRequest::from_config(&config);
    assert_eq!(request.workers, 3);
    assert_eq!(request.granularity, SweepGranularity::File);
    assert_eq!(request.data_version, "v2");
    assert_eq!(request.grid, config.sweep.grid());
    assert_eq!(request.groups, Group::ALL.to_vec());
}
