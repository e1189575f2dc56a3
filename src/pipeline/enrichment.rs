//! Step 3: derived cross-axis features

use std::path::Path;

use crate::config::constants::rqa::COMPLEXITY_EPSILON;
use crate::data::table::FeatureTable;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::pipeline::layout::OutputLayout;
use crate::pipeline::read_required_artifact;

/// Names of the derived columns, in the order they are appended
pub const DERIVED_FEATURES: [&str; 8] = [
    "rr_symmetry",
    "det_symmetry",
    "rr_axis_diff",
    "det_axis_diff",
    "ent_axis_diff",
    "complexity_x",
    "complexity_y",
    "complexity_xy",
];

/// Append the derived features to a copy of `merged`, read from `source`
///
/// - `*_symmetry = mean(metric_x, metric_y) - metric_xy`
/// - `*_axis_diff = |metric_x - metric_y|`
/// - `complexity_* = ent_* / (rr_* + 1e-10)`
pub fn enrich(merged: &FeatureTable, source: &Path) -> RqaResult<FeatureTable> {
    let column = |name: &str| {
        merged.column(name).ok_or_else(|| RqaError::Parse {
            path: source.to_path_buf(),
            line: 1,
            reason: format!("merged table has no '{}' column", name),
        })
    };

    let rr = [column("rr_x")?, column("rr_y")?, column("rr_xy")?];
    let det = [column("det_x")?, column("det_y")?, column("det_xy")?];
    let ent = [column("ent_x")?, column("ent_y")?, column("ent_xy")?];

    let symmetry = |metric: &[Vec<f64>; 3]| -> Vec<f64> {
        (0..merged.len())
            .map(|i| (metric[0][i] + metric[1][i]) / 2.0 - metric[2][i])
            .collect()
    };
    let axis_diff = |metric: &[Vec<f64>; 3]| -> Vec<f64> {
        (0..merged.len())
            .map(|i| (metric[0][i] - metric[1][i]).abs())
            .collect()
    };
    let complexity = |axis: usize| -> Vec<f64> {
        (0..merged.len())
            .map(|i| ent[axis][i] / (rr[axis][i] + COMPLEXITY_EPSILON))
            .collect()
    };

    let derived = [
        symmetry(&rr),
        symmetry(&det),
        axis_diff(&rr),
        axis_diff(&det),
        axis_diff(&ent),
        complexity(0),
        complexity(1),
        complexity(2),
    ];

    let mut enriched = merged.clone();
    for (name, values) in DERIVED_FEATURES.iter().zip(derived) {
        enriched.push_feature(name, values)?;
    }
    Ok(enriched)
}

/// Read the merged table, enrich it and write the enriched table
pub fn enrich_features(layout: &OutputLayout) -> RqaResult<FeatureTable> {
    let merged = read_required_artifact(
        ProcessingStage::Enrichment,
        &layout.merged_file(),
        FeatureTable::read_csv,
    )?;
    let enriched = enrich(&merged, &layout.merged_file())?;
    enriched.write_csv(&layout.enriched_file())?;
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::FeatureRow;
    use crate::error::ErrorCategory;
    use crate::data::trajectory::{Group, TaskId};
    use crate::rqa::raw_feature_names;

    fn merged_with(values: Vec<f64>) -> FeatureTable {
        let mut table = FeatureTable::new(raw_feature_names());
        table.rows.push(FeatureRow {
            subject_id: "c1".to_string(),
            group: Group::Control,
            task: TaskId::new(1).unwrap(),
            values,
        });
        table
    }

    #[test]
    fn test_derived_values() {
        // rr, det, lam, ent, lmax for x, y, xy
        let table = merged_with(vec![
            0.2, 0.6, 0.5, 1.0, 5.0, //
            0.4, 0.8, 0.5, 0.5, 4.0, //
            0.1, 0.5, 0.4, 0.0, 3.0,
        ]);
        let enriched = enrich(&table, Path::new("merged.csv")).unwrap();

        assert_eq!(enriched.features.len(), 23);
        let get = |name: &str| enriched.column(name).unwrap()[0];
        assert!((get("rr_symmetry") - 0.2).abs() < 1e-12);
        assert!((get("det_symmetry") - 0.2).abs() < 1e-12);
        assert!((get("rr_axis_diff") - 0.2).abs() < 1e-12);
        assert!((get("ent_axis_diff") - 0.5).abs() < 1e-12);
        assert!((get("complexity_x") - 5.0).abs() < 1e-6);
        assert_eq!(get("complexity_xy"), 0.0);
    }

    #[test]
    fn test_zero_rr_guarded() {
        let mut values = vec![0.0; 15];
        values[3] = 0.7;
        let enriched = enrich(&merged_with(values), Path::new("merged.csv")).unwrap();
        let complexity = enriched.column("complexity_x").unwrap()[0];
        assert!(complexity.is_finite());
        assert!(complexity > 1e9);
    }

    #[test]
    fn test_missing_column_rejected() {
        let table = FeatureTable::new(vec!["rr_x".to_string()]);
        let err = enrich(&table, Path::new("merged.csv")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Io);
        match err {
            RqaError::Parse { path, reason, .. } => {
                assert_eq!(path, Path::new("merged.csv"));
                assert!(reason.contains("rr_y"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
