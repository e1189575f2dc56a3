//! Bounded feature selection over sensitivity records
//!
//! Two strategies, both read-only over already scored records:
//! - cross-parameter: average each feature over every signature, keep the top K
//! - top-parameter: rank signatures by their mean score, then take the top N
//!   features inside each of the best K signatures

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::sensitivity::SensitivityRecord;
use crate::config::constants::paths::{AGGREGATION_DIR, CROSS_PARAMETER_FILE, TOP_PARAMETER_FILE};
use crate::error::RqaResult;
use crate::utils::io::{format_float, write_atomic};
use crate::utils::stats::mean;

/// Statistic used to order records and aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    OverallScore,
    FStatistic,
    EffectSize,
    TaskConsistency,
}

impl RankBy {
    pub fn of(&self, record: &SensitivityRecord) -> f64 {
        match self {
            RankBy::OverallScore => record.overall_score,
            RankBy::FStatistic => record.f_statistic,
            RankBy::EffectSize => record.effect_size,
            RankBy::TaskConsistency => record.task_consistency,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankBy::OverallScore => "overall_score",
            RankBy::FStatistic => "f_statistic",
            RankBy::EffectSize => "effect_size",
            RankBy::TaskConsistency => "task_consistency",
        }
    }
}

impl std::str::FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overall_score" | "score" => Ok(RankBy::OverallScore),
            "f_statistic" | "f" => Ok(RankBy::FStatistic),
            "effect_size" | "eta" => Ok(RankBy::EffectSize),
            "task_consistency" | "consistency" => Ok(RankBy::TaskConsistency),
            other => Err(format!("unknown ranking statistic '{}'", other)),
        }
    }
}

/// One feature averaged across parameter combinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAggregate {
    pub feature: String,
    pub mean_overall_score: f64,
    pub mean_f_statistic: f64,
    pub mean_p_value: f64,
    pub mean_effect_size: f64,
    pub mean_task_consistency: f64,
    /// Parameter combinations that scored this feature
    pub combinations: usize,
}

/// A signature's features ranked within it
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSelection {
    pub rank: usize,
    pub param_signature: String,
    /// Mean of the ranking statistic over all of the signature's features
    pub mean_score: f64,
    pub features: Vec<SensitivityRecord>,
}

pub struct FeatureAggregator {
    records: Vec<SensitivityRecord>,
    rank_by: RankBy,
    metric_prefix: Option<String>,
}

impl FeatureAggregator {
    pub fn new(records: Vec<SensitivityRecord>) -> Self {
        Self {
            records,
            rank_by: RankBy::default(),
            metric_prefix: None,
        }
    }

    pub fn rank_by(mut self, rank_by: RankBy) -> Self {
        self.rank_by = rank_by;
        self
    }

    /// Restrict to features whose name starts with `prefix` (e.g. `det`, `complexity`)
    pub fn with_metric(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = Some(prefix.into().to_ascii_lowercase());
        self
    }

    fn selected(&self) -> impl Iterator<Item = &SensitivityRecord> {
        self.records.iter().filter(move |r| match &self.metric_prefix {
            Some(prefix) => r.feature.to_ascii_lowercase().starts_with(prefix.as_str()),
            None => true,
        })
    }

    /// Top `top_k` features by their ranking statistic averaged across signatures
    pub fn cross_parameter(&self, top_k: usize) -> Vec<FeatureAggregate> {
        let mut by_feature: BTreeMap<String, Vec<&SensitivityRecord>> = BTreeMap::new();
        for record in self.selected() {
            by_feature
                .entry(record.feature.to_ascii_lowercase())
                .or_default()
                .push(record);
        }

        let mut ranked: Vec<(f64, FeatureAggregate)> = by_feature
            .into_iter()
            .map(|(feature, group)| {
                let avg = |f: fn(&SensitivityRecord) -> f64| mean(&group.iter().map(|r| f(r)).collect::<Vec<_>>());
                let key = mean(&group.iter().map(|r| self.rank_by.of(r)).collect::<Vec<_>>());
                let aggregate = FeatureAggregate {
                    feature,
                    mean_overall_score: avg(|r| r.overall_score),
                    mean_f_statistic: avg(|r| r.f_statistic),
                    mean_p_value: avg(|r| r.p_value),
                    mean_effect_size: avg(|r| r.effect_size),
                    mean_task_consistency: avg(|r| r.task_consistency),
                    combinations: group.len(),
                };
                (key, aggregate)
            })
            .collect();

        ranked.sort_by(|(a, fa), (b, fb)| descending(*a, *b).then_with(|| fa.feature.cmp(&fb.feature)));
        ranked.truncate(top_k);
        ranked.into_iter().map(|(_, aggregate)| aggregate).collect()
    }

    /// Best `top_k_params` signatures, each with its `top_n` best features
    pub fn top_parameter(&self, top_k_params: usize, top_n: usize) -> Vec<ParameterSelection> {
        let mut by_signature: BTreeMap<&str, Vec<&SensitivityRecord>> = BTreeMap::new();
        for record in self.selected() {
            by_signature.entry(record.param_signature.as_str()).or_default().push(record);
        }

        let mut ranked: Vec<(&str, f64, Vec<&SensitivityRecord>)> = by_signature
            .into_iter()
            .map(|(signature, group)| {
                let score = mean(&group.iter().map(|r| self.rank_by.of(r)).collect::<Vec<_>>());
                (signature, score, group)
            })
            .collect();
        ranked.sort_by(|a, b| descending(a.1, b.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(top_k_params);

        ranked
            .into_iter()
            .enumerate()
            .map(|(i, (signature, mean_score, mut group))| {
                group.sort_by(|a, b| {
                    descending(self.rank_by.of(a), self.rank_by.of(b)).then_with(|| a.feature.cmp(&b.feature))
                });
                ParameterSelection {
                    rank: i + 1,
                    param_signature: signature.to_string(),
                    mean_score,
                    features: group.into_iter().take(top_n).cloned().collect(),
                }
            })
            .collect()
    }

    /// Write both rankings under `{output_root}/feature_aggregation/`
    pub fn write(
        &self,
        output_root: &Path,
        top_k: usize,
        top_k_params: usize,
        top_n: usize,
    ) -> RqaResult<(PathBuf, PathBuf)> {
        let dir = output_root.join(AGGREGATION_DIR);

        let cross = self.cross_parameter(top_k);
        let cross_path = dir.join(CROSS_PARAMETER_FILE);
        write_atomic(&cross_path, cross_parameter_csv(&cross).as_bytes())?;

        let top = self.top_parameter(top_k_params, top_n);
        let top_path = dir.join(TOP_PARAMETER_FILE);
        write_atomic(&top_path, top_parameter_csv(&top, self.rank_by).as_bytes())?;

        info!(
            features = cross.len(),
            combinations = top.len(),
            rank_by = self.rank_by.name(),
            "feature rankings written"
        );
        Ok((cross_path, top_path))
    }
}

/// NaN sorts last
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

pub fn cross_parameter_csv(aggregates: &[FeatureAggregate]) -> String {
    let mut out = String::from(
        "rank,feature,mean_overall_score,mean_f_statistic,mean_p_value,mean_effect_size,mean_task_consistency,combinations\n",
    );
    for (i, a) in aggregates.iter().enumerate() {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            i + 1,
            a.feature,
            format_float(a.mean_overall_score),
            format_float(a.mean_f_statistic),
            format_float(a.mean_p_value),
            format_float(a.mean_effect_size),
            format_float(a.mean_task_consistency),
            a.combinations
        ));
    }
    out
}

pub fn top_parameter_csv(selections: &[ParameterSelection], rank_by: RankBy) -> String {
    let mut out = format!(
        "param_rank,param_signature,param_mean_{},feature_rank,feature,overall_score,f_statistic,p_value,effect_size,task_consistency\n",
        rank_by.name()
    );
    for selection in selections {
        for (j, r) in selection.features.iter().enumerate() {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                selection.rank,
                selection.param_signature,
                format_float(selection.mean_score),
                j + 1,
                r.feature,
                format_float(r.overall_score),
                format_float(r.f_statistic),
                format_float(r.p_value),
                format_float(r.effect_size),
                format_float(r.task_consistency)
            ));
        }
    }
    out
}
