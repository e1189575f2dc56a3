// tests/pipeline_integration_tests.rs
//! End-to-end runs of the five-stage pipeline on a synthetic population
//!
//! Covers:
//! - Row, feature and statistics counts across all stages
//! - Byte-identical outputs when a combination is re-run
//! - Bad input files are skipped without aborting the run
//! - Single-step execution against cached artifacts

use std::fs;
use std::path::Path;

use rqa_core::config::AnalysisConfig;
use rqa_core::data::{
    write_synthetic_dataset, FeatureTable, Group, ParameterCombination, SyntheticDatasetSpec, TaskId,
};
use rqa_core::error::{ErrorCategory, RqaError};
use rqa_core::pipeline::statistics::read_comparisons;
use rqa_core::pipeline::{PipelineMetadata, PipelineOrchestrator, PipelineRequest, PipelineStep};
use tempfile::TempDir;

const SUBJECTS_PER_GROUP: usize = 3;

fn write_population(data_root: &Path) {
    let spec = SyntheticDatasetSpec {
        subjects_per_group: SUBJECTS_PER_GROUP,
        tasks: vec![TaskId::new(1).unwrap()],
        samples: 200,
        seed: 7,
    };
    write_synthetic_dataset(data_root, "v1", &spec).unwrap();
}

fn orchestrator(data_root: &Path, output_root: &Path) -> PipelineOrchestrator {
    let mut config = AnalysisConfig::default();
    config.paths.data_root = data_root.to_path_buf();
    config.paths.output_root = output_root.to_path_buf();
    PipelineOrchestrator::new(&config)
}

fn params() -> ParameterCombination {
    ParameterCombination::new(2, 1, 0.1, 2).unwrap()
}

#[test]
fn test_end_to_end_counts() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let orchestrator = orchestrator(data.path(), out.path());
    let request = PipelineRequest::all_groups(params());
    let response = orchestrator.run(&request);

    assert!(response.success, "pipeline failed: {:?}", response.error);
    assert_eq!(response.signature, "m2_tau1_eps0.100_lmin2");
    assert_eq!(response.processed_files, 9);
    assert_eq!(response.failed_files, 0);
    assert_eq!(response.total_records, 9);

    let layout = orchestrator.layout(&request.params);
    assert_eq!(layout.root(), out.path().join("m2_tau1_eps0.100_lmin2"));

    for group in Group::ALL {
        let step1 = fs::read_dir(layout.step1_group_dir(group)).unwrap().count();
        assert_eq!(step1, SUBJECTS_PER_GROUP);
    }

    let merged = FeatureTable::read_csv(&layout.merged_file()).unwrap();
    assert_eq!(merged.len(), 9);
    assert_eq!(merged.features.len(), 15);

    let enriched = FeatureTable::read_csv(&layout.enriched_file()).unwrap();
    assert_eq!(enriched.len(), 9);
    assert_eq!(enriched.features.len(), 23);

    let comparisons = read_comparisons(&layout.comparison_file()).unwrap();
    assert_eq!(comparisons.len(), 23);
    for comparison in &comparisons {
        assert!(
            (0.0..=1.0).contains(&comparison.p_value),
            "{} has p = {}",
            comparison.feature,
            comparison.p_value
        );
        assert_eq!(comparison.counts, [3, 3, 3]);
    }

    assert!(layout.plot_summary_file().is_file());
    assert_eq!(response.plots, response.significant_features.min(10));

    let metadata = PipelineMetadata::load(&layout.metadata_file()).unwrap().unwrap();
    assert!(metadata.is_finished());
    assert_eq!(metadata.records(PipelineStep::Extraction), Some(9));
    assert_eq!(metadata.records(PipelineStep::Merging), Some(9));
    assert_eq!(metadata.records(PipelineStep::Enrichment), Some(23));
}

#[test]
fn test_rerun_is_byte_identical() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let orchestrator = orchestrator(data.path(), out.path());
    let request = PipelineRequest::all_groups(params());
    let layout = orchestrator.layout(&request.params);

    assert!(orchestrator.run(&request).success);
    let first: Vec<Vec<u8>> = [layout.merged_file(), layout.enriched_file(), layout.comparison_file()]
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    let second_response = orchestrator.run(&request);
    assert!(second_response.success);
    assert_eq!(second_response.total_records, 9);
    let second: Vec<Vec<u8>> = [layout.merged_file(), layout.enriched_file(), layout.comparison_file()]
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_bad_files_are_skipped() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let control_dir = data.path().join("v1").join("control");
    fs::write(control_dir.join("c90q1.csv"), "x,y\n0.5,0.5\n").unwrap();
    fs::write(control_dir.join("c91q1.csv"), "time,value\n0,1\n1,2\n").unwrap();

    let orchestrator = orchestrator(data.path(), out.path());
    let response = orchestrator.run(&PipelineRequest::all_groups(params()));

    assert!(response.success, "pipeline failed: {:?}", response.error);
    assert_eq!(response.processed_files, 9);
    assert_eq!(response.failed_files, 2);
    assert_eq!(response.total_records, 9);
}

#[test]
fn test_group_subset() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let orchestrator = orchestrator(data.path(), out.path());
    let request = PipelineRequest::new(params(), &[Group::Ad, Group::Control], "v1");
    let response = orchestrator.run(&request);

    assert!(response.success, "pipeline failed: {:?}", response.error);
    assert_eq!(response.total_records, 6);

    let comparisons = read_comparisons(&orchestrator.layout(&request.params).comparison_file()).unwrap();
    assert!(comparisons.iter().all(|c| c.counts == [3, 0, 3]));
}

#[test]
fn test_single_steps_reuse_cached_artifacts() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let orchestrator = orchestrator(data.path(), out.path());
    let request = PipelineRequest::all_groups(params());

    match orchestrator.run_step(&request, PipelineStep::Enrichment) {
        Err(e @ RqaError::MissingArtifact { .. }) => assert_eq!(e.category(), ErrorCategory::MissingArtifact),
        other => panic!("expected missing artifact, got {:?}", other),
    }

    assert_eq!(orchestrator.run_step(&request, PipelineStep::Extraction).unwrap(), 9);
    assert_eq!(orchestrator.run_step(&request, PipelineStep::Merging).unwrap(), 9);
    assert_eq!(orchestrator.run_step(&request, PipelineStep::Enrichment).unwrap(), 23);
    assert_eq!(orchestrator.run_step(&request, PipelineStep::StatisticalTesting).unwrap(), 23);

    let layout = orchestrator.layout(&request.params);
    let metadata = PipelineMetadata::load(&layout.metadata_file()).unwrap().unwrap();
    assert!(metadata.is_completed(PipelineStep::StatisticalTesting));
    assert!(!metadata.is_completed(PipelineStep::Visualization));

    orchestrator.run_step(&request, PipelineStep::Visualization).unwrap();
    let metadata = PipelineMetadata::load(&layout.metadata_file()).unwrap().unwrap();
    assert!(metadata.is_finished());
}

#[test]
fn test_invalid_parameters_rejected_before_work() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_population(data.path());

    let orchestrator = orchestrator(data.path(), out.path());
    let mut request = PipelineRequest::all_groups(params());
    request.params.eps = 0.0;

    let response = orchestrator.run(&request);
    assert!(!response.success);
    assert!(response.error.unwrap().contains("VALIDATION"));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}
