// tests/config_tests.rs
//! Layered configuration loading
//!
//! Tests that touch process environment variables run serially.

use std::io::Write;
use std::path::PathBuf;

use rqa_core::analysis::RankBy;
use rqa_core::config::{AnalysisConfig, ConfigError, ConfigLoader};
use rqa_core::rqa::DistanceMetric;
use rqa_core::sweep::SweepGranularity;
use serial_test::serial;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
#[serial]
fn test_full_file_round_trip() {
    let file = config_file(
        r#"
[paths]
data_root = "gaze"
output_root = "results"
data_version = "v3"

[rqa]
m = 4
tau = 3
eps = 0.08
lmin = 3
joint_metric = "abs_diff"

[sweep]
workers = 6
granularity = "file"
skip_completed = true
eps_range = { start = 0.01, end = 0.05, step = 0.01 }

[statistics]
significance_level = 0.01
max_plots = 4

[aggregation]
top_k = 20
rank_by = "effect_size"
"#,
    );

    let mut loader = ConfigLoader::with_paths(vec![file.path().to_path_buf()]);
    let config = loader.load().unwrap();

    assert_eq!(config.paths.data_root, PathBuf::from("gaze"));
    assert_eq!(config.paths.data_version, "v3");
    assert_eq!(config.rqa.params().unwrap().signature(), "m4_tau3_eps0.080_lmin3");
    assert_eq!(config.rqa.joint_metric, DistanceMetric::AbsDiff);
    assert_eq!(config.sweep.granularity, SweepGranularity::File);
    assert!(config.sweep.skip_completed);
    assert_eq!(config.sweep.grid().expand().unwrap().combinations.len(), 3 * 3 * 5);
    assert_eq!(config.statistics.max_plots, 4);
    assert_eq!(config.aggregation.rank_by, RankBy::EffectSize);
    assert!(config.validate_consistency().is_ok());

    let exported = NamedTempFile::new().unwrap();
    loader.export_config(exported.path()).unwrap();
    let mut reloaded = ConfigLoader::with_paths(vec![exported.path().to_path_buf()]);
    assert_eq!(reloaded.load().unwrap(), config);
}

#[test]
#[serial]
fn test_environment_overrides_files() {
    let file = config_file("[sweep]\nworkers = 2\n\n[rqa]\neps = 0.02\n");

    std::env::set_var("RQA_SWEEP_WORKERS", "9");
    std::env::set_var("RQA_RQA_LMIN", "4");
    std::env::set_var("RQA_SWEEP_TAU_RANGE_END", "5");
    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load();
    std::env::remove_var("RQA_SWEEP_WORKERS");
    std::env::remove_var("RQA_RQA_LMIN");
    std::env::remove_var("RQA_SWEEP_TAU_RANGE_END");

    let config = result.unwrap();
    assert_eq!(config.sweep.workers, 9);
    assert_eq!(config.rqa.lmin, 4);
    assert_eq!(config.rqa.eps, 0.02);
    assert_eq!(config.sweep.tau_range.end, 5);
}

#[test]
#[serial]
fn test_invalid_environment_override_rejected() {
    std::env::set_var("RQA_SWEEP_WORKERS", "0");
    let result = ConfigLoader::with_paths(Vec::new()).load();
    std::env::remove_var("RQA_SWEEP_WORKERS");

    match result {
        Err(ConfigError::ValidationError(violations)) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].field, "sweep.workers");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_schema_and_dependency_errors() {
    let file = config_file(
        r#"
[rqa]
m = 25
axis_metric = "manhattan"

[sweep.m_range]
start = 5
end = 2
step = 1
"#,
    );

    let err = ConfigLoader::with_paths(vec![file.path().to_path_buf()])
        .without_environment()
        .load()
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("rqa.m"));
    assert!(message.contains("rqa.axis_metric"));

    // schema errors are reported before cross-field checks
    let file = config_file("[sweep.m_range]\nstart = 5\nend = 2\nstep = 1\n");
    let err = ConfigLoader::with_paths(vec![file.path().to_path_buf()])
        .without_environment()
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("sweep.m_range"));
}

#[test]
#[serial]
fn test_malformed_toml_is_parse_error() {
    let file = config_file("[rqa\nm = ");
    let result = ConfigLoader::with_paths(vec![file.path().to_path_buf()]).load();
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_defaults_are_consistent() {
    let config = AnalysisConfig::default();
    assert!(config.validate_consistency().is_ok());
    assert_eq!(config.sweep.grid().expand().unwrap().combinations.len(), 3 * 3 * 4);
}
