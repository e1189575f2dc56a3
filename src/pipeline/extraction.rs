//! Step 1: per-record RQA feature extraction

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::constants::paths::STEP1_SUFFIX;
use crate::data::table::{FeatureRow, FeatureTable};
use crate::data::trajectory::{GazeTrajectory, Group, TrajectoryFile};
use crate::error::{RqaError, RqaResult};
use crate::pipeline::layout::OutputLayout;
use crate::rqa::{raw_feature_names, RqaAnalyzer};
use crate::utils::io::ensure_dir;

/// Outcome of extracting a batch of records
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    /// Step-1 files written in this run
    pub written: Vec<PathBuf>,
    /// Records that were skipped, with the reason
    pub failures: Vec<(String, String)>,
}

impl ExtractionSummary {
    pub fn processed(&self) -> usize {
        self.written.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Analyze one trajectory file and write its single-row feature table
pub fn extract_file(
    file: &TrajectoryFile,
    analyzer: &RqaAnalyzer,
    layout: &OutputLayout,
) -> RqaResult<PathBuf> {
    let trajectory = GazeTrajectory::load(file)?;
    let features = analyzer.analyze(&trajectory)?;

    let mut table = FeatureTable::new(raw_feature_names());
    table.rows.push(FeatureRow {
        subject_id: trajectory.subject_id().to_string(),
        group: trajectory.group(),
        task: trajectory.task(),
        values: features.values(),
    });

    let path = layout.step1_file(file.group, &file.record_id);
    table.write_csv(&path)?;
    debug!(record = %file.record_id, samples = trajectory.len(), path = %path.display(), "step 1 record written");
    Ok(path)
}

/// Run step 1 over `files`, skipping records that fail
///
/// Step-1 files of the requested groups that were not rewritten by this run
/// are removed afterwards so the directory reflects exactly this input set.
pub fn extract_all(
    files: &[TrajectoryFile],
    analyzer: &RqaAnalyzer,
    layout: &OutputLayout,
    groups: &[Group],
) -> RqaResult<ExtractionSummary> {
    let mut summary = ExtractionSummary::default();
    ensure_dir(&layout.step1_dir())?;

    for file in files {
        match extract_file(file, analyzer, layout) {
            Ok(path) => summary.written.push(path),
            Err(e) if e.is_skippable() => {
                warn!(record = %file.record_id, group = %file.group, error = %e, "skipping record");
                summary.failures.push((file.record_id.clone(), e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    remove_stale_outputs(layout, groups, &summary.written)?;
    Ok(summary)
}

/// Remove every step-1 file of `groups`, returning how many were removed
pub fn clear_outputs(layout: &OutputLayout, groups: &[Group]) -> RqaResult<usize> {
    remove_stale_outputs(layout, groups, &[])
}

fn remove_stale_outputs(layout: &OutputLayout, groups: &[Group], keep: &[PathBuf]) -> RqaResult<usize> {
    let keep: HashSet<&PathBuf> = keep.iter().collect();
    let mut removed = 0;
    for &group in groups {
        for path in step1_files(layout, group)? {
            if !keep.contains(&path) {
                debug!(path = %path.display(), "removing stale step 1 output");
                fs::remove_file(&path).map_err(|e| RqaError::io("remove_file", &path, e))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Existing step-1 files for `group`, sorted by file name
pub fn step1_files(layout: &OutputLayout, group: Group) -> RqaResult<Vec<PathBuf>> {
    let dir = layout.step1_group_dir(group);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| RqaError::io("read_dir", &dir, e))? {
        let path = entry.map_err(|e| RqaError::io("read_dir", &dir, e))?.path();
        let is_step1 = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(STEP1_SUFFIX))
            .unwrap_or(false);
        if path.is_file() && is_step1 {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
