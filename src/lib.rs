//! RQA-Core: recurrence quantification analysis of gaze trajectories
//!
//! This library turns 2D gaze trajectories into recurrence descriptors and
//! searches parameter space for the combinations that best separate diagnostic
//! groups. It features:
//!
//! - Delay embedding, recurrence matrices and line-length statistics
//! - A staged, file-persisted pipeline per parameter combination
//! - Parallel parameter sweeps on a fixed worker pool
//! - Cross-task sensitivity scoring and bounded feature ranking
//! - Layered TOML configuration with schema checks
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rqa_core::config::AnalysisConfig;
//! use rqa_core::data::ParameterCombination;
//! use rqa_core::pipeline::{PipelineOrchestrator, PipelineRequest};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::default();
//!     let orchestrator = PipelineOrchestrator::new(&config);
//!
//!     let params = ParameterCombination::new(2, 1, 0.05, 2)?;
//!     let request = PipelineRequest::all_groups(params);
//!     let response = orchestrator.run(&request);
//!
//!     println!("{}: {} significant features", response.signature, response.significant_features);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod rqa;
pub mod sweep;
pub mod utils;

// Re-export commonly used types for convenience
pub use analysis::{FeatureAggregator, RankBy, SensitivityRecord, SensitivityScorer};
pub use config::AnalysisConfig;
pub use data::{GazeTrajectory, Group, ParameterCombination, ParameterGrid, TaskId};
pub use error::{ErrorCategory, RqaError, RqaResult};
pub use pipeline::{PipelineOrchestrator, PipelineRequest, PipelineResponse};
pub use rqa::{RqaAnalyzer, RqaFeatureSet, RqaMetricSet};
pub use sweep::{ParameterSweepCoordinator, SweepReport, SweepRequest};
pub use utils::validation::{ValidationError, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Recurrence quantification analysis of gaze trajectories".to_string(),
        features: vec![
            "Delay embedding and recurrence matrices".to_string(),
            "Five-stage cached analysis pipeline".to_string(),
            "Parallel parameter sweeps".to_string(),
            "Sensitivity scoring and feature ranking".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
