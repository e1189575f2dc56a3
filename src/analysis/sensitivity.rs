//! Cross-task sensitivity scoring of (parameter signature, feature) pairs
//!
//! For every completed signature directory the enriched table is split by
//! task, each task gets its own one-way ANOVA across groups, and the per-task
//! results are folded into one [`SensitivityRecord`] per feature:
//!
//! ```text
//! task_consistency = 1 / (1 + CV(F per task))
//! overall_score    = 0.4 * min(mean F / 100, 1)
//!                  + 0.3 * mean eta²
//!                  + 0.2 * task_consistency
//!                  - 0.1 * mean p
//! ```
//!
//! Weights and the F normalizer come from [`ScoringConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::constants::paths::{ENRICHED_FILE, SENSITIVITY_DIR, SENSITIVITY_FILE, STEP3_DIR};
use crate::config::ScoringConfig;
use crate::data::params::ParameterCombination;
use crate::data::table::FeatureTable;
use crate::data::trajectory::TaskId;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::error_context;
use crate::utils::io::{format_float, parse_float, read_csv, write_atomic};
use crate::utils::stats::{coefficient_of_variation, mean, one_way_anova};

const RECORD_COLUMNS: [&str; 12] = [
    "param_signature",
    "m",
    "tau",
    "eps",
    "lmin",
    "feature",
    "f_statistic",
    "p_value",
    "effect_size",
    "task_consistency",
    "overall_score",
    "tasks_analyzed",
];

/// Aggregated sensitivity of one feature under one parameter combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRecord {
    pub param_signature: String,
    pub m: usize,
    pub tau: usize,
    pub eps: f64,
    pub lmin: usize,
    pub feature: String,
    /// Mean F across analyzed tasks
    pub f_statistic: f64,
    /// Mean p-value across analyzed tasks
    pub p_value: f64,
    /// Mean eta² across analyzed tasks
    pub effect_size: f64,
    pub task_consistency: f64,
    pub overall_score: f64,
    /// Tasks that produced a usable ANOVA
    pub tasks_analyzed: usize,
}

/// Per-task ANOVA summary
#[derive(Debug, Clone, Copy, PartialEq)]
struct TaskStatistic {
    f_statistic: f64,
    p_value: f64,
    eta_squared: f64,
}

pub struct SensitivityScorer {
    output_root: PathBuf,
    weights: ScoringConfig,
}

impl SensitivityScorer {
    pub fn new(output_root: impl Into<PathBuf>, weights: ScoringConfig) -> Self {
        Self {
            output_root: output_root.into(),
            weights,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn records_file(&self) -> PathBuf {
        self.output_root.join(SENSITIVITY_DIR).join(SENSITIVITY_FILE)
    }

    /// Composite score from the aggregated statistics
    pub fn composite_score(&self, f_mean: f64, effect_mean: f64, consistency: f64, p_mean: f64) -> f64 {
        let w = &self.weights;
        w.f_weight * (f_mean / w.f_normalizer).min(1.0) + w.effect_weight * effect_mean + w.consistency_weight * consistency
            - w.p_weight * p_mean
    }

    /// Score every feature of one enriched table
    pub fn score_table(&self, params: &ParameterCombination, table: &FeatureTable) -> Vec<SensitivityRecord> {
        let signature = params.signature();
        let mut records = Vec::with_capacity(table.features.len());

        for feature in &table.features {
            let per_task = task_statistics(table, feature, &signature);
            if per_task.is_empty() {
                debug!(signature = %signature, feature = %feature, "no task produced a usable comparison");
                continue;
            }

            let fs: Vec<f64> = per_task.iter().map(|t| t.f_statistic).collect();
            let ps: Vec<f64> = per_task.iter().map(|t| t.p_value).collect();
            let etas: Vec<f64> = per_task.iter().map(|t| t.eta_squared).collect();

            let f_mean = mean(&fs);
            let p_mean = mean(&ps);
            let effect_mean = mean(&etas);
            let consistency = 1.0 / (1.0 + coefficient_of_variation(&fs));

            records.push(SensitivityRecord {
                param_signature: signature.clone(),
                m: params.m,
                tau: params.tau,
                eps: params.eps,
                lmin: params.lmin,
                feature: feature.to_ascii_lowercase(),
                f_statistic: f_mean,
                p_value: p_mean,
                effect_size: effect_mean,
                task_consistency: consistency,
                overall_score: self.composite_score(f_mean, effect_mean, consistency, p_mean),
                tasks_analyzed: per_task.len(),
            });
        }

        records
    }

    /// Score the enriched table of one signature directory
    pub fn score_signature(&self, signature: &str) -> RqaResult<Vec<SensitivityRecord>> {
        let params = ParameterCombination::from_signature(signature)
            .map_err(|e| RqaError::validation(e, error_context!("sensitivity", "score_signature")))?;
        let path = self.output_root.join(signature).join(STEP3_DIR).join(ENRICHED_FILE);
        if !path.is_file() {
            return Err(RqaError::MissingArtifact {
                stage: ProcessingStage::SensitivityScoring,
                path,
                context: error_context!("sensitivity", "score_signature"),
            });
        }
        let table = FeatureTable::read_csv(&path)?;
        Ok(self.score_table(&params, &table))
    }

    /// Signature directories under the output root that hold an enriched table
    pub fn completed_signatures(&self) -> RqaResult<Vec<String>> {
        if !self.output_root.is_dir() {
            return Ok(Vec::new());
        }
        let root = &self.output_root;
        let mut signatures = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| RqaError::io("read_dir", root, e))? {
            let path = entry.map_err(|e| RqaError::io("read_dir", root, e))?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) if path.is_dir() => name.to_string(),
                _ => continue,
            };
            if ParameterCombination::from_signature(&name).is_err() {
                continue;
            }
            if path.join(STEP3_DIR).join(ENRICHED_FILE).is_file() {
                signatures.push(name);
            }
        }
        signatures.sort();
        Ok(signatures)
    }

    /// Recompute the full record table from every completed signature
    ///
    /// Signatures whose table cannot be read are logged and left out.
    pub fn score_all(&self) -> RqaResult<Vec<SensitivityRecord>> {
        let signatures = self.completed_signatures()?;
        info!(signatures = signatures.len(), "scoring completed parameter combinations");

        let mut records = Vec::new();
        for signature in &signatures {
            match self.score_signature(signature) {
                Ok(mut scored) => records.append(&mut scored),
                Err(e) => warn!(signature = %signature, error = %e, "skipping signature"),
            }
        }

        sort_records(&mut records);
        Ok(records)
    }

    /// Write `sensitivity_analysis/sensitivity_records.csv`
    pub fn write(&self, records: &[SensitivityRecord]) -> RqaResult<PathBuf> {
        let path = self.records_file();
        write_atomic(&path, records_to_csv(records).as_bytes())?;
        Ok(path)
    }
}

fn task_statistics(table: &FeatureTable, feature: &str, signature: &str) -> Vec<TaskStatistic> {
    let mut stats = Vec::with_capacity(TaskId::COUNT as usize);
    for task in TaskId::all() {
        let split = match table.column_by_group_filtered(feature, |row| row.task == task) {
            Some(split) => split,
            None => continue,
        };
        let refs: Vec<&[f64]> = split.iter().map(Vec::as_slice).collect();
        match one_way_anova(feature, &refs) {
            Ok(anova) if anova.f_statistic.is_finite() && anova.p_value.is_finite() => {
                stats.push(TaskStatistic {
                    f_statistic: anova.f_statistic,
                    p_value: anova.p_value,
                    eta_squared: anova.eta_squared,
                });
            }
            Ok(anova) => {
                warn!(signature, feature, task = %task, f = anova.f_statistic, "dropping non-finite task statistic");
            }
            Err(e) => {
                debug!(signature, feature, task = %task, reason = %e, "task not analyzed");
            }
        }
    }
    stats
}

/// Highest score first; ties by signature, then feature
pub fn sort_records(records: &mut [SensitivityRecord]) {
    records.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then_with(|| a.param_signature.cmp(&b.param_signature))
            .then_with(|| a.feature.cmp(&b.feature))
    });
}

/// Records with `p_value < alpha` and a positive F statistic
pub fn significant_records(records: &[SensitivityRecord], alpha: f64) -> Vec<SensitivityRecord> {
    records
        .iter()
        .filter(|r| r.p_value < alpha && r.f_statistic > 0.0)
        .cloned()
        .collect()
}

pub fn records_to_csv(records: &[SensitivityRecord]) -> String {
    let mut out = RECORD_COLUMNS.join(",");
    out.push('\n');
    for r in records {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}\n",
            r.param_signature,
            r.m,
            r.tau,
            format_float(r.eps),
            r.lmin,
            r.feature,
            format_float(r.f_statistic),
            format_float(r.p_value),
            format_float(r.effect_size),
            format_float(r.task_consistency),
            format_float(r.overall_score),
            r.tasks_analyzed
        ));
    }
    out
}

/// Read a record table written by [`SensitivityScorer::write`]
pub fn read_records(path: &Path) -> RqaResult<Vec<SensitivityRecord>> {
    let table = read_csv(path)?;
    let mut columns = [0usize; 12];
    for (slot, name) in columns.iter_mut().zip(RECORD_COLUMNS) {
        *slot = table.column(name).ok_or_else(|| RqaError::Parse {
            path: path.to_path_buf(),
            line: 1,
            reason: format!("missing column '{}'", name),
        })?;
    }

    table
        .rows
        .iter()
        .enumerate()
        .map(|(line, cells)| {
            let err = |col: usize| RqaError::Parse {
                path: path.to_path_buf(),
                line: line + 2,
                reason: format!("bad value '{}' in '{}'", cells[col], table.headers[col]),
            };
            let float = |col: usize| parse_float(&cells[col]).ok_or_else(|| err(col));
            let int = |col: usize| cells[col].parse::<usize>().map_err(|_| err(col));
            Ok(SensitivityRecord {
                param_signature: cells[columns[0]].clone(),
                m: int(columns[1])?,
                tau: int(columns[2])?,
                eps: float(columns[3])?,
                lmin: int(columns[4])?,
                feature: cells[columns[5]].to_ascii_lowercase(),
                f_statistic: float(columns[6])?,
                p_value: float(columns[7])?,
                effect_size: float(columns[8])?,
                task_consistency: float(columns[9])?,
                overall_score: float(columns[10])?,
                tasks_analyzed: int(columns[11])?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::FeatureRow;
    use crate::data::trajectory::Group;

    fn table_with(values: impl Fn(Group, u8, usize) -> f64) -> FeatureTable {
        let mut table = FeatureTable::new(vec!["feat".to_string()]);
        for task in TaskId::all() {
            for group in Group::ALL {
                for subject in 0..3 {
                    table.rows.push(FeatureRow {
                        subject_id: format!("{}{}", group.label(), subject),
                        group,
                        task,
                        values: vec![values(group, task.index(), subject)],
                    });
                }
            }
        }
        table
    }

    fn scorer() -> SensitivityScorer {
        SensitivityScorer::new("/tmp/unused", ScoringConfig::default())
    }

    #[test]
    fn test_identical_feature_scores_zero_f() {
        let params = ParameterCombination::default();
        let records = scorer().score_table(&params, &table_with(|_, _, _| 0.42));

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.f_statistic, 0.0);
        assert_eq!(r.p_value, 1.0);
        assert_eq!(r.task_consistency, 1.0);
        assert_eq!(r.tasks_analyzed, 5);
        assert!((r.overall_score - 0.1).abs() < 1e-12);
        assert!(significant_records(&records, 0.05).is_empty());
    }

    #[test]
    fn test_separating_feature_scores_high() {
        let params = ParameterCombination::default();
        let table = table_with(|g, _, s| g.index() as f64 + s as f64 * 0.1);
        let records = scorer().score_table(&params, &table);

        let r = &records[0];
        // identical per-task F values: consistency is exactly 1
        assert!((r.task_consistency - 1.0).abs() < 1e-12);
        assert!(r.f_statistic > 100.0);
        assert!(r.p_value < 1e-3);
        assert!(r.overall_score > 0.8);
        assert_eq!(significant_records(&records, 0.05).len(), 1);
    }

    #[test]
    fn test_composite_score_caps_f() {
        let s = scorer();
        assert!((s.composite_score(1000.0, 0.5, 1.0, 0.0) - (0.4 + 0.15 + 0.2)).abs() < 1e-12);
        assert!((s.composite_score(50.0, 0.0, 0.0, 0.5) - (0.2 - 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_sort_order() {
        let base = SensitivityRecord {
            param_signature: "m2_tau1_eps0.050_lmin2".to_string(),
            m: 2,
            tau: 1,
            eps: 0.05,
            lmin: 2,
            feature: "b".to_string(),
            f_statistic: 1.0,
            p_value: 0.5,
            effect_size: 0.1,
            task_consistency: 0.5,
            overall_score: 0.3,
            tasks_analyzed: 5,
        };
        let mut a = base.clone();
        a.feature = "a".to_string();
        let mut top = base.clone();
        top.overall_score = 0.9;

        let mut records = vec![base, a, top];
        sort_records(&mut records);
        let order: Vec<(&str, f64)> = records.iter().map(|r| (r.feature.as_str(), r.overall_score)).collect();
        assert_eq!(order, vec![("b", 0.9), ("a", 0.3), ("b", 0.3)]);
    }
}
