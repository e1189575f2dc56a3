// src/config/mod.rs
//! Analysis configuration: defaults, layered loading and schema checks

pub mod constants;
pub mod loader;
pub mod schema_validator;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};
pub use schema_validator::{SchemaValidator, SchemaViolation};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::analysis::RankBy;
use crate::data::params::{ParameterCombination, ParameterGrid, RangeSpec};
use crate::rqa::DistanceMetric;
use crate::sweep::SweepGranularity;
use crate::utils::validation::ValidationResult;

/// Complete analysis configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub rqa: RqaConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// Input and output locations
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PathsConfig {
    #[serde(default = "defaults::data_root")]
    pub data_root: PathBuf,

    #[serde(default = "defaults::output_root")]
    pub output_root: PathBuf,

    #[serde(default = "defaults::data_version")]
    pub data_version: String,
}

/// Single-run parameters and distance metrics
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RqaConfig {
    #[serde(default = "defaults::m")]
    pub m: usize,

    #[serde(default = "defaults::tau")]
    pub tau: usize,

    #[serde(default = "defaults::eps")]
    pub eps: f64,

    #[serde(default = "defaults::lmin")]
    pub lmin: usize,

    /// Metric for the per-axis signals
    #[serde(default = "defaults::axis_metric")]
    pub axis_metric: DistanceMetric,

    /// Metric for the joint (x, y) signal
    #[serde(default = "defaults::joint_metric")]
    pub joint_metric: DistanceMetric,
}

/// Grid and worker pool settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SweepConfig {
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    #[serde(default)]
    pub granularity: SweepGranularity,

    #[serde(default = "defaults::skip_completed")]
    pub skip_completed: bool,

    #[serde(default = "defaults::m_range")]
    pub m_range: RangeSpec<usize>,

    #[serde(default = "defaults::tau_range")]
    pub tau_range: RangeSpec<usize>,

    #[serde(default = "defaults::eps_range")]
    pub eps_range: RangeSpec<f64>,

    #[serde(default = "defaults::lmin_range")]
    pub lmin_range: RangeSpec<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StatisticsConfig {
    #[serde(default = "defaults::significance_level")]
    pub significance_level: f64,

    /// Upper bound on step-5 plots per combination
    #[serde(default = "defaults::max_plots")]
    pub max_plots: usize,
}

/// Composite sensitivity score weights
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScoringConfig {
    #[serde(default = "defaults::f_weight")]
    pub f_weight: f64,

    #[serde(default = "defaults::effect_weight")]
    pub effect_weight: f64,

    #[serde(default = "defaults::consistency_weight")]
    pub consistency_weight: f64,

    #[serde(default = "defaults::p_weight")]
    pub p_weight: f64,

    #[serde(default = "defaults::f_normalizer")]
    pub f_normalizer: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AggregationConfig {
    #[serde(default = "defaults::top_k")]
    pub top_k: usize,

    #[serde(default = "defaults::top_k_params")]
    pub top_k_params: usize,

    #[serde(default = "defaults::top_n_features")]
    pub top_n_features: usize,

    #[serde(default)]
    pub rank_by: RankBy,
}

/// Default value providers using constants
mod defaults {
    use std::path::PathBuf;

    use crate::config::constants::*;
    use crate::data::params::{ParameterGrid, RangeSpec};
    use crate::rqa::DistanceMetric;

    pub fn data_root() -> PathBuf { PathBuf::from(paths::DEFAULT_DATA_ROOT) }
    pub fn output_root() -> PathBuf { PathBuf::from(paths::DEFAULT_OUTPUT_ROOT) }
    pub fn data_version() -> String { paths::DEFAULT_DATA_VERSION.to_string() }

    pub fn m() -> usize { params::DEFAULT_EMBEDDING_DIMENSION }
    pub fn tau() -> usize { params::DEFAULT_TIME_DELAY }
    pub fn eps() -> f64 { params::DEFAULT_EPSILON }
    pub fn lmin() -> usize { params::DEFAULT_LINE_LENGTH }
    pub fn axis_metric() -> DistanceMetric { DistanceMetric::AbsDiff }
    pub fn joint_metric() -> DistanceMetric { DistanceMetric::Euclidean }

    pub fn workers() -> usize { sweep::DEFAULT_WORKERS }
    pub fn skip_completed() -> bool { false }
    pub fn m_range() -> RangeSpec<usize> { ParameterGrid::default().m_range }
    pub fn tau_range() -> RangeSpec<usize> { ParameterGrid::default().tau_range }
    pub fn eps_range() -> RangeSpec<f64> { ParameterGrid::default().eps_range }
    pub fn lmin_range() -> RangeSpec<usize> { ParameterGrid::default().lmin_range }

    pub fn significance_level() -> f64 { statistics::DEFAULT_SIGNIFICANCE_LEVEL }
    pub fn max_plots() -> usize { statistics::DEFAULT_MAX_PLOTS }

    pub fn f_weight() -> f64 { scoring::F_WEIGHT }
    pub fn effect_weight() -> f64 { scoring::EFFECT_WEIGHT }
    pub fn consistency_weight() -> f64 { scoring::CONSISTENCY_WEIGHT }
    pub fn p_weight() -> f64 { scoring::P_WEIGHT }
    pub fn f_normalizer() -> f64 { scoring::F_NORMALIZER }

    pub fn top_k() -> usize { aggregation::DEFAULT_TOP_K }
    pub fn top_k_params() -> usize { aggregation::DEFAULT_TOP_K_PARAMS }
    pub fn top_n_features() -> usize { aggregation::DEFAULT_TOP_N_FEATURES }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: defaults::data_root(),
            output_root: defaults::output_root(),
            data_version: defaults::data_version(),
        }
    }
}

impl Default for RqaConfig {
    fn default() -> Self {
        Self {
            m: defaults::m(),
            tau: defaults::tau(),
            eps: defaults::eps(),
            lmin: defaults::lmin(),
            axis_metric: defaults::axis_metric(),
            joint_metric: defaults::joint_metric(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            granularity: SweepGranularity::default(),
            skip_completed: defaults::skip_completed(),
            m_range: defaults::m_range(),
            tau_range: defaults::tau_range(),
            eps_range: defaults::eps_range(),
            lmin_range: defaults::lmin_range(),
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            significance_level: defaults::significance_level(),
            max_plots: defaults::max_plots(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            f_weight: defaults::f_weight(),
            effect_weight: defaults::effect_weight(),
            consistency_weight: defaults::consistency_weight(),
            p_weight: defaults::p_weight(),
            f_normalizer: defaults::f_normalizer(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::top_k(),
            top_k_params: defaults::top_k_params(),
            top_n_features: defaults::top_n_features(),
            rank_by: RankBy::default(),
        }
    }
}

impl RqaConfig {
    /// The configured single-run combination
    pub fn params(&self) -> ValidationResult<ParameterCombination> {
        ParameterCombination::new(self.m, self.tau, self.eps, self.lmin)
    }
}

impl SweepConfig {
    pub fn grid(&self) -> ParameterGrid {
        ParameterGrid {
            m_range: self.m_range,
            tau_range: self.tau_range,
            eps_range: self.eps_range,
            lmin_range: self.lmin_range,
        }
    }
}

impl AnalysisConfig {
    /// Cross-section checks the per-field schema cannot express
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.rqa.params() {
            errors.push(format!("rqa: {}", e));
        }

        if let Err(e) = self.sweep.grid().expand() {
            errors.push(format!("sweep: {}", e));
        }

        if self.sweep.workers == 0 || self.sweep.workers > sweep::MAX_WORKERS {
            errors.push(format!(
                "sweep.workers must be between 1 and {}, got {}",
                sweep::MAX_WORKERS,
                self.sweep.workers
            ));
        }

        let alpha = self.statistics.significance_level;
        if !(alpha > 0.0 && alpha < 1.0) {
            errors.push(format!("statistics.significance_level must be in (0, 1), got {}", alpha));
        }

        if !(self.scoring.f_normalizer > 0.0) {
            errors.push(format!(
                "scoring.f_normalizer must be positive, got {}",
                self.scoring.f_normalizer
            ));
        }

        if self.paths.data_version.trim().is_empty() {
            errors.push("paths.data_version must not be empty".to_string());
        }

        if self.paths.output_root == self.paths.data_root {
            errors.push(format!(
                "paths.output_root must differ from paths.data_root ({})",
                self.paths.data_root.display()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "data={} version={} output={} workers={} granularity={:?}",
            self.paths.data_root.display(),
            self.paths.data_version,
            self.paths.output_root.display(),
            self.sweep.workers,
            self.sweep.granularity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = AnalysisConfig::default();
        assert_eq!(config.rqa.m, params::DEFAULT_EMBEDDING_DIMENSION);
        assert_eq!(config.sweep.workers, sweep::DEFAULT_WORKERS);
        assert_eq!(config.paths.data_version, "v1");
        assert!(config.validate_consistency().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AnalysisConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AnalysisConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
[rqa]
eps = 0.1
axis_metric = "euclidean"

[sweep]
granularity = "file"
m_range = { start = 2, end = 3, step = 1 }
"#,
        )
        .unwrap();

        assert_eq!(config.rqa.eps, 0.1);
        assert_eq!(config.rqa.m, 2);
        assert_eq!(config.rqa.axis_metric, DistanceMetric::Euclidean);
        assert_eq!(config.sweep.granularity, SweepGranularity::File);
        assert_eq!(config.sweep.grid().m_range, RangeSpec::new(2, 3, 1));
        assert_eq!(config.scoring.f_normalizer, 100.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AnalysisConfig::default();
        config.rqa.eps = 1.5;
        config.sweep.workers = 0;
        config.sweep.m_range = RangeSpec::new(5, 2, 1);

        let errors = config.validate_consistency().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
