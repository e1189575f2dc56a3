//! Descriptive statistics and one-way analysis of variance
//!
//! Shared by the pipeline's group comparison (step 4) and the cross-task
//! sensitivity scorer. NaN values are treated as missing and dropped.

use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::config::constants::statistics::MIN_NON_EMPTY_GROUPS;
use crate::error::{ErrorContext, ProcessingStage, RqaError, RqaResult};

/// Relative spread under which a sample is treated as constant
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); NaN below two values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation (n)
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Coefficient of variation (population std / mean); 0 when the mean is 0
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.is_empty() || m == 0.0 || !m.is_finite() {
        return 0.0;
    }
    population_std(values) / m.abs()
}

/// Drop NaN and infinite entries
pub fn finite_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// One-way ANOVA outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnovaResult {
    pub f_statistic: f64,
    pub p_value: f64,
    /// SS_between / SS_total
    pub eta_squared: f64,
    pub df_between: usize,
    pub df_within: usize,
    /// Number of groups that contributed at least one value
    pub groups: usize,
}

/// One-way analysis of variance across `groups`
///
/// Empty groups (after dropping non-finite values) are discarded. Fewer than
/// two remaining groups is reported as [`RqaError::TooFewGroups`]. A sample
/// whose values are all equal yields `F = 0`, `p = 1`, `eta² = 0`; perfectly
/// separated constant groups yield `F = inf`, `p = 0`.
pub fn one_way_anova(feature: &str, groups: &[&[f64]]) -> RqaResult<AnovaResult> {
    let samples: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| finite_values(g))
        .filter(|g| !g.is_empty())
        .collect();

    if samples.len() < MIN_NON_EMPTY_GROUPS {
        return Err(RqaError::TooFewGroups {
            feature: feature.to_string(),
            groups: samples.len(),
        });
    }

    let k = samples.len();
    let n: usize = samples.iter().map(Vec::len).sum();
    if n <= k {
        return Err(RqaError::NoData {
            stage: ProcessingStage::StatisticalTesting,
            reason: format!("feature '{}' has no within-group degrees of freedom ({} values, {} groups)", feature, n, k),
            context: ErrorContext::new("stats", "one_way_anova"),
        });
    }

    let all: Vec<f64> = samples.iter().flatten().copied().collect();
    let grand_mean = mean(&all);
    let df_between = k - 1;
    let df_within = n - k;

    let (lo, hi) = all
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scale = grand_mean.abs().max(1.0);
    if hi - lo <= CONSTANT_TOLERANCE * scale {
        return Ok(AnovaResult {
            f_statistic: 0.0,
            p_value: 1.0,
            eta_squared: 0.0,
            df_between,
            df_within,
            groups: k,
        });
    }

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for sample in &samples {
        let group_mean = mean(sample);
        ss_between += sample.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += sample.iter().map(|v| (v - group_mean).powi(2)).sum::<f64>();
    }
    let ss_total = ss_between + ss_within;
    let eta_squared = if ss_total > 0.0 { ss_between / ss_total } else { 0.0 };

    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    let (f_statistic, p_value) = if ms_within <= f64::MIN_POSITIVE {
        (f64::INFINITY, 0.0)
    } else {
        let f = ms_between / ms_within;
        (f, f_survival(f, df_between, df_within))
    };

    Ok(AnovaResult {
        f_statistic,
        p_value,
        eta_squared,
        df_between,
        df_within,
        groups: k,
    })
}

/// Upper tail probability of the F distribution
fn f_survival(f: f64, df1: usize, df2: usize) -> f64 {
    match FisherSnedecor::new(df1 as f64, df2 as f64) {
        Ok(dist) => (1.0 - dist.cdf(f)).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}
