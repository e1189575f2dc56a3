// src/config/constants.rs
//! System-wide configuration constants

/// Parameter combination bounds (inclusive)
pub mod params {
    pub const MIN_EMBEDDING_DIMENSION: usize = 1;
    pub const MAX_EMBEDDING_DIMENSION: usize = 20;
    pub const MIN_TIME_DELAY: usize = 1;
    pub const MAX_TIME_DELAY: usize = 20;
    /// Exclusive lower bound
    pub const MIN_EPSILON_EXCLUSIVE: f64 = 0.0;
    pub const MAX_EPSILON: f64 = 1.0;
    pub const MIN_LINE_LENGTH: usize = 2;
    pub const MAX_LINE_LENGTH: usize = 10;

    pub const DEFAULT_EMBEDDING_DIMENSION: usize = 2;
    pub const DEFAULT_TIME_DELAY: usize = 1;
    pub const DEFAULT_EPSILON: f64 = 0.05;
    pub const DEFAULT_LINE_LENGTH: usize = 2;

    /// Decimal places of eps in the signature
    pub const SIGNATURE_EPS_PRECISION: usize = 3;
}

/// RQA computation constants
pub mod rqa {
    /// Guard for ENT / RR complexity ratios
    pub const COMPLEXITY_EPSILON: f64 = 1e-10;
    /// Metrics computed per axis mode
    pub const METRICS_PER_MODE: usize = 5;
    pub const RAW_FEATURE_COUNT: usize = 15;
    pub const DERIVED_FEATURE_COUNT: usize = 8;
}

/// Statistical testing constants
pub mod statistics {
    pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
    pub const MIN_NON_EMPTY_GROUPS: usize = 2;
    pub const DEFAULT_MAX_PLOTS: usize = 10;
}

/// Composite sensitivity score weights
pub mod scoring {
    pub const F_WEIGHT: f64 = 0.4;
    pub const EFFECT_WEIGHT: f64 = 0.3;
    pub const CONSISTENCY_WEIGHT: f64 = 0.2;
    pub const P_WEIGHT: f64 = 0.1;
    /// F statistics are divided by this and capped at 1
    pub const F_NORMALIZER: f64 = 100.0;
}

/// Ranking defaults
pub mod aggregation {
    pub const DEFAULT_TOP_K: usize = 10;
    pub const DEFAULT_TOP_K_PARAMS: usize = 5;
    pub const DEFAULT_TOP_N_FEATURES: usize = 5;
}

/// Sweep execution constants
pub mod sweep {
    pub const DEFAULT_WORKERS: usize = 4;
    pub const MAX_WORKERS: usize = 256;
    /// Error messages retained in a batch report
    pub const MAX_REPORTED_ERRORS: usize = 10;
}

/// Filesystem layout
pub mod paths {
    pub const DEFAULT_DATA_ROOT: &str = "data";
    pub const DEFAULT_OUTPUT_ROOT: &str = "rqa_output";
    pub const DEFAULT_DATA_VERSION: &str = "v1";

    pub const STEP1_DIR: &str = "step1_rqa_features";
    pub const STEP2_DIR: &str = "step2_data_merging";
    pub const STEP3_DIR: &str = "step3_feature_enrichment";
    pub const STEP4_DIR: &str = "step4_statistical_analysis";
    pub const STEP5_DIR: &str = "step5_visualization";
    pub const PLOTS_DIR: &str = "statistical_plots";

    pub const STEP1_SUFFIX: &str = "_rqa.csv";
    pub const MERGED_FILE: &str = "merged_rqa_features.csv";
    pub const ENRICHED_FILE: &str = "enriched_features.csv";
    pub const COMPARISON_FILE: &str = "group_comparison.csv";
    pub const PLOT_SUMMARY_FILE: &str = "plot_summary.csv";
    pub const METADATA_FILE: &str = "metadata.json";

    pub const SENSITIVITY_DIR: &str = "sensitivity_analysis";
    pub const SENSITIVITY_FILE: &str = "sensitivity_records.csv";
    pub const AGGREGATION_DIR: &str = "feature_aggregation";
    pub const CROSS_PARAMETER_FILE: &str = "cross_parameter_top_features.csv";
    pub const TOP_PARAMETER_FILE: &str = "top_parameter_features.csv";

    pub const DEFAULT_CONFIG_FILE: &str = "rqa.toml";
    pub const LOCAL_CONFIG_FILE: &str = "rqa.local.toml";

    /// Environment override prefix, e.g. `RQA_SWEEP_WORKERS`
    pub const ENV_PREFIX: &str = "RQA_";
}
