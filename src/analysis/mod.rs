//! Cross-combination analysis: sensitivity scoring and feature ranking

pub mod aggregation;
pub mod sensitivity;

pub use aggregation::{FeatureAggregate, FeatureAggregator, ParameterSelection, RankBy};
pub use sensitivity::{read_records, significant_records, SensitivityRecord, SensitivityScorer};
