//! Step 4: per-feature one-way ANOVA across groups

use std::path::Path;

use tracing::{debug, warn};

use crate::data::table::FeatureTable;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::pipeline::layout::OutputLayout;
use crate::pipeline::read_required_artifact;
use crate::utils::io::{format_float, parse_float, read_csv, write_atomic};
use crate::utils::stats::{finite_values, mean, one_way_anova, sample_std};

const COMPARISON_COLUMNS: [&str; 14] = [
    "feature",
    "f_statistic",
    "p_value",
    "eta_squared",
    "significant",
    "n_control",
    "n_mci",
    "n_ad",
    "mean_control",
    "mean_mci",
    "mean_ad",
    "std_control",
    "std_mci",
    "std_ad",
];

/// One row of `group_comparison.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupComparison {
    pub feature: String,
    pub f_statistic: f64,
    pub p_value: f64,
    pub eta_squared: f64,
    pub significant: bool,
    /// Per group, indexed like [`Group::ALL`](crate::data::Group::ALL)
    pub counts: [usize; 3],
    pub means: [f64; 3],
    pub stds: [f64; 3],
}

/// Per-group count, mean and sample std of finite values
pub fn describe_groups(split: &[Vec<f64>; 3]) -> ([usize; 3], [f64; 3], [f64; 3]) {
    let mut counts = [0; 3];
    let mut means = [f64::NAN; 3];
    let mut stds = [f64::NAN; 3];
    for (i, values) in split.iter().enumerate() {
        let finite = finite_values(values);
        counts[i] = finite.len();
        means[i] = mean(&finite);
        stds[i] = sample_std(&finite);
    }
    (counts, means, stds)
}

/// Compare groups for every feature of `table`
///
/// Features without two non-empty groups are logged and left out.
pub fn compare_groups(table: &FeatureTable, alpha: f64) -> Vec<GroupComparison> {
    let mut results = Vec::with_capacity(table.features.len());

    for feature in &table.features {
        let split = match table.column_by_group(feature) {
            Some(split) => split,
            None => continue,
        };
        let refs: Vec<&[f64]> = split.iter().map(Vec::as_slice).collect();

        match one_way_anova(feature, &refs) {
            Ok(anova) => {
                let (counts, means, stds) = describe_groups(&split);
                results.push(GroupComparison {
                    feature: feature.clone(),
                    f_statistic: anova.f_statistic,
                    p_value: anova.p_value,
                    eta_squared: anova.eta_squared,
                    significant: anova.p_value < alpha,
                    counts,
                    means,
                    stds,
                });
            }
            Err(e) => {
                warn!(feature = %feature, error = %e, "skipping feature in group comparison");
            }
        }
    }

    results
}

pub fn comparisons_to_csv(comparisons: &[GroupComparison]) -> String {
    let mut out = COMPARISON_COLUMNS.join(",");
    out.push('\n');
    for c in comparisons {
        let mut cells = vec![
            c.feature.clone(),
            format_float(c.f_statistic),
            format_float(c.p_value),
            format_float(c.eta_squared),
            c.significant.to_string(),
        ];
        cells.extend(c.counts.iter().map(usize::to_string));
        cells.extend(c.means.iter().map(|v| format_float(*v)));
        cells.extend(c.stds.iter().map(|v| format_float(*v)));
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// Read a `group_comparison.csv` written by [`comparisons_to_csv`]
pub fn read_comparisons(path: &Path) -> RqaResult<Vec<GroupComparison>> {
    let table = read_csv(path)?;
    let mut columns = [0usize; 14];
    for (slot, name) in columns.iter_mut().zip(COMPARISON_COLUMNS) {
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
            let err = |reason: String| RqaError::Parse {
                path: path.to_path_buf(),
                line: line + 2,
                reason,
            };
            let float = |col: usize| {
                parse_float(&cells[col]).ok_or_else(|| err(format!("bad number '{}'", cells[col])))
            };
            let count = |col: usize| {
                cells[col]
                    .parse::<usize>()
                    .map_err(|_| err(format!("bad count '{}'", cells[col])))
            };
            Ok(GroupComparison {
                feature: cells[columns[0]].clone(),
                f_statistic: float(columns[1])?,
                p_value: float(columns[2])?,
                eta_squared: float(columns[3])?,
                significant: cells[columns[4]].eq_ignore_ascii_case("true"),
                counts: [count(columns[5])?, count(columns[6])?, count(columns[7])?],
                means: [float(columns[8])?, float(columns[9])?, float(columns[10])?],
                stds: [float(columns[11])?, float(columns[12])?, float(columns[13])?],
            })
        })
        .collect()
}

/// Read the enriched table, compare groups and write `group_comparison.csv`
pub fn run_group_comparison(layout: &OutputLayout, alpha: f64) -> RqaResult<Vec<GroupComparison>> {
    let enriched = read_required_artifact(
        ProcessingStage::StatisticalTesting,
        &layout.enriched_file(),
        FeatureTable::read_csv,
    )?;
    let comparisons = compare_groups(&enriched, alpha);
    write_atomic(&layout.comparison_file(), comparisons_to_csv(&comparisons).as_bytes())?;

    let significant = comparisons.iter().filter(|c| c.significant).count();
    debug!(features = comparisons.len(), significant, "group comparison written");
    Ok(comparisons)
}
