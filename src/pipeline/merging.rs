//! Step 2: concatenate per-record rows into one table

use tracing::debug;

use crate::data::table::FeatureTable;
use crate::data::trajectory::Group;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::error_context;
use crate::pipeline::extraction::step1_files;
use crate::pipeline::layout::OutputLayout;

/// Merge all step-1 files of `groups` (group order, then file name order)
///
/// The merged row count always equals the number of step-1 files read.
pub fn merge_features(layout: &OutputLayout, groups: &[Group]) -> RqaResult<FeatureTable> {
    let step1_dir = layout.step1_dir();
    if !step1_dir.is_dir() {
        return Err(RqaError::MissingArtifact {
            stage: ProcessingStage::Merging,
            path: step1_dir,
            context: error_context!("merging", "merge_features"),
        });
    }

    let mut tables = Vec::new();
    for &group in groups {
        let files = step1_files(layout, group)?;
        debug!(group = %group, files = files.len(), "merging step 1 outputs");
        for path in files {
            tables.push(FeatureTable::read_csv(&path)?);
        }
    }

    if tables.is_empty() {
        return Err(RqaError::NoData {
            stage: ProcessingStage::Merging,
            reason: format!("no step 1 files for groups {:?}", groups),
            context: error_context!("merging", "merge_features"),
        });
    }

    let merged = FeatureTable::concat(tables)?;
    merged.write_csv(&layout.merged_file())?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::params::ParameterCombination;
    use crate::data::table::FeatureRow;
    use crate::data::trajectory::TaskId;
    use crate::error::ErrorCategory;
    use tempfile::TempDir;

    fn write_row(layout: &OutputLayout, group: Group, record: &str, value: f64) {
        let mut table = FeatureTable::new(vec!["rr_x".to_string()]);
        table.rows.push(FeatureRow {
            subject_id: record[..2].to_string(),
            group,
            task: TaskId::new(1).unwrap(),
            values: vec![value],
        });
        table.write_csv(&layout.step1_file(group, record)).unwrap();
    }

    #[test]
    fn test_missing_step1_is_artifact_error() {
        let out = TempDir::new().unwrap();
        let layout = OutputLayout::new(out.path(), &ParameterCombination::default());
        let err = merge_features(&layout, &Group::ALL).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MissingArtifact);
    }

    #[test]
    fn test_empty_step1_is_no_data() {
        let out = TempDir::new().unwrap();
        let layout = OutputLayout::new(out.path(), &ParameterCombination::default());
        std::fs::create_dir_all(layout.step1_dir()).unwrap();
        assert!(matches!(
            merge_features(&layout, &Group::ALL),
            Err(RqaError::NoData { .. })
        ));
    }

    #[test]
    fn test_merge_order_and_group_filter() {
        let out = TempDir::new().unwrap();
        let layout = OutputLayout::new(out.path(), &ParameterCombination::default());
        write_row(&layout, Group::Ad, "a1q1", 0.3);
        write_row(&layout, Group::Control, "c2q1", 0.2);
        write_row(&layout, Group::Control, "c1q1", 0.1);

        let merged = merge_features(&layout, &Group::ALL).unwrap();
        assert_eq!(merged.column("rr_x").unwrap(), vec![0.1, 0.2, 0.3]);
        assert!(layout.merged_file().is_file());

        let control_only = merge_features(&layout, &[Group::Control]).unwrap();
        assert_eq!(control_only.len(), 2);
    }
}
