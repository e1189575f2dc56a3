//! Recurrence quantification analysis
//!
//! The three building blocks are kept separate so they can be tested and
//! benchmarked independently:
//!
//! - [`SignalEmbedder`] reconstructs delay-coordinate trajectories
//! - [`RecurrenceMatrixBuilder`] thresholds pairwise distances
//! - [`RqaMetricsExtractor`] turns a matrix into `{RR, DET, LAM, ENT, Lmax}`
//!
//! [`RqaAnalyzer`] chains them for the x, y and joint signals of one gaze
//! trajectory. Recurrence matrices are dropped as soon as their metrics are
//! extracted.

pub mod embedding;
pub mod metrics;
pub mod recurrence;

pub use embedding::{embedded_length, SignalEmbedder};
pub use metrics::{raw_feature_names, AxisMode, RqaMetricSet, RqaMetricsExtractor, METRIC_NAMES};
pub use recurrence::{DistanceMetric, RecurrenceMatrix, RecurrenceMatrixBuilder};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::data::params::ParameterCombination;
use crate::data::trajectory::GazeTrajectory;
use crate::error::RqaResult;

/// Metric sets for the three axis modes of one trajectory
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RqaFeatureSet {
    pub x: RqaMetricSet,
    pub y: RqaMetricSet,
    pub combined: RqaMetricSet,
}

impl RqaFeatureSet {
    pub fn get(&self, mode: AxisMode) -> &RqaMetricSet {
        match mode {
            AxisMode::X => &self.x,
            AxisMode::Y => &self.y,
            AxisMode::Combined => &self.combined,
        }
    }

    /// The 15 raw values in [`raw_feature_names`] order
    pub fn values(&self) -> Vec<f64> {
        AxisMode::ALL
            .iter()
            .flat_map(|&mode| self.get(mode).values())
            .collect()
    }
}

/// Runs embedding, recurrence and extraction for one parameter combination
#[derive(Debug, Clone, Copy)]
pub struct RqaAnalyzer {
    params: ParameterCombination,
    axis_metric: DistanceMetric,
    joint_metric: DistanceMetric,
}

impl RqaAnalyzer {
    /// Analyzer with `abs_diff` for single axes and `euclidean` for the joint signal
    pub fn new(params: ParameterCombination) -> Self {
        Self::with_metrics(params, DistanceMetric::AbsDiff, DistanceMetric::Euclidean)
    }

    pub fn with_metrics(
        params: ParameterCombination,
        axis_metric: DistanceMetric,
        joint_metric: DistanceMetric,
    ) -> Self {
        Self {
            params,
            axis_metric,
            joint_metric,
        }
    }

    pub fn params(&self) -> &ParameterCombination {
        &self.params
    }

    pub fn analyze(&self, trajectory: &GazeTrajectory) -> RqaResult<RqaFeatureSet> {
        self.analyze_signals(trajectory.x(), trajectory.y())
    }

    pub fn analyze_signals(&self, x: &[f64], y: &[f64]) -> RqaResult<RqaFeatureSet> {
        let embedder = SignalEmbedder::new(self.params.m, self.params.tau);
        let extractor = RqaMetricsExtractor::new(self.params.lmin);
        let axis = RecurrenceMatrixBuilder::new(self.params.eps, self.axis_metric);
        let joint = RecurrenceMatrixBuilder::new(self.params.eps, self.joint_metric);

        let x_set = extractor.extract(&axis.build(&embedder.embed_1d(x)?)?);
        let y_set = extractor.extract(&axis.build(&embedder.embed_1d(y)?)?);
        let combined = extractor.extract(&joint.build(&embedder.embed_2d(x, y)?)?);

        trace!(
            samples = x.len(),
            rr_x = x_set.rr,
            rr_y = y_set.rr,
            rr_xy = combined.rr,
            "rqa metrics extracted"
        );

        Ok(RqaFeatureSet {
            x: x_set,
            y: y_set,
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RqaError;

    fn params(eps: f64) -> ParameterCombination {
        ParameterCombination::new(2, 1, eps, 2).unwrap()
    }

    #[test]
    fn test_constant_signal_is_fully_recurrent() {
        let x = vec![0.5; 30];
        let y = vec![0.25; 30];
        let features = RqaAnalyzer::new(params(0.05)).analyze_signals(&x, &y).unwrap();

        for mode in AxisMode::ALL {
            let set = features.get(mode);
            assert_eq!(set.rr, 1.0);
            // only the two corner cells form isolated points
            assert!((set.det - 810.0 / 812.0).abs() < 1e-12);
            assert_eq!(set.lmax, 28);
        }
    }

    #[test]
    fn test_feature_values_order() {
        let x: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin() * 0.5 + 0.5).collect();
        let y: Vec<f64> = (0..40).map(|i| (i as f64 * 0.2).cos() * 0.5 + 0.5).collect();
        let features = RqaAnalyzer::new(params(0.1)).analyze_signals(&x, &y).unwrap();

        let values = features.values();
        assert_eq!(values.len(), raw_feature_names().len());
        assert_eq!(values[0], features.x.rr);
        assert_eq!(values[5], features.y.rr);
        assert_eq!(values[14], features.combined.lmax as f64);
    }

    #[test]
    fn test_short_trajectory_fails() {
        let result = RqaAnalyzer::new(params(0.1)).analyze_signals(&[0.1], &[0.2]);
        assert!(matches!(result, Err(RqaError::InsufficientLength { .. })));
    }
}
