//! Five-stage, file-persisted analysis pipeline
//!
//! One run covers one [`ParameterCombination`] and one set of groups:
//!
//! 1. extraction: RQA features per trajectory file
//! 2. merging: one table across groups
//! 3. enrichment: eight derived features
//! 4. statistical testing: one-way ANOVA per feature
//! 5. visualization: plots for up to `max_plots` significant features
//!
//! Stages are strictly sequential and each reads the previous stage's file.
//! All outputs live under the combination's signature directory, so runs for
//! different combinations never touch the same file.

pub mod enrichment;
pub mod extraction;
pub mod layout;
pub mod merging;
pub mod metadata;
pub mod statistics;
pub mod visualization;

pub use layout::OutputLayout;
pub use metadata::{PipelineMetadata, PipelineStep, StepStatus};
pub use statistics::GroupComparison;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::config::constants::paths::DEFAULT_DATA_VERSION;
use crate::config::AnalysisConfig;
use crate::data::params::ParameterCombination;
use crate::data::trajectory::{discover_trajectories, Group, TrajectoryFile};
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::error_context;
use crate::rqa::{DistanceMetric, RqaAnalyzer};
use crate::utils::validation::ValidationError;

/// Read a file a stage depends on, failing with `MissingArtifact` if absent
pub(crate) fn read_required_artifact<T, F>(stage: ProcessingStage, path: &Path, read: F) -> RqaResult<T>
where
    F: FnOnce(&Path) -> RqaResult<T>,
{
    if !path.is_file() {
        return Err(RqaError::MissingArtifact {
            stage,
            path: path.to_path_buf(),
            context: error_context!("pipeline", "read_required_artifact"),
        });
    }
    read(path)
}

/// Trigger for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub params: ParameterCombination,
    pub groups: Vec<Group>,
    pub data_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl PipelineRequest {
    pub fn new(params: ParameterCombination, groups: &[Group], data_version: &str) -> Self {
        Self {
            params,
            groups: groups.to_vec(),
            data_version: data_version.to_string(),
            batch_id: None,
            task_id: None,
        }
    }

    /// All three groups with the default data version
    pub fn all_groups(params: ParameterCombination) -> Self {
        Self::new(params, &Group::ALL, DEFAULT_DATA_VERSION)
    }

    /// Reject bad parameters or an empty group list before any work starts
    pub fn validate(&self) -> RqaResult<()> {
        self.params
            .validate()
            .map_err(|e| RqaError::validation(e, error_context!("pipeline", "validate_request")))?;
        if self.groups.is_empty() {
            return Err(RqaError::validation(
                ValidationError::ConstraintViolation {
                    fields: vec!["groups".to_string()],
                    message: "at least one group is required".to_string(),
                },
                error_context!("pipeline", "validate_request"),
            ));
        }
        Ok(())
    }

    /// Groups in canonical order without duplicates
    pub fn normalized_groups(&self) -> Vec<Group> {
        let mut groups = self.groups.clone();
        groups.sort();
        groups.dedup();
        groups
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub success: bool,
    pub signature: String,
    pub output_dir: PathBuf,
    /// Step-1 files written
    pub processed_files: usize,
    /// Trajectory files skipped in step 1
    pub failed_files: usize,
    /// Rows in the merged table
    pub total_records: usize,
    pub significant_features: usize,
    pub plots: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResponse {
    fn failure(signature: String, output_dir: PathBuf, error: &RqaError) -> Self {
        Self {
            success: false,
            signature,
            output_dir,
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Runs the five stages for one parameter combination at a time
///
/// Holds only immutable settings; one orchestrator can serve many requests,
/// including concurrently from different worker threads.
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    data_root: PathBuf,
    output_root: PathBuf,
    axis_metric: DistanceMetric,
    joint_metric: DistanceMetric,
    significance_level: f64,
    max_plots: usize,
}

impl PipelineOrchestrator {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            data_root: config.paths.data_root.clone(),
            output_root: config.paths.output_root.clone(),
            axis_metric: config.rqa.axis_metric,
            joint_metric: config.rqa.joint_metric,
            significance_level: config.statistics.significance_level,
            max_plots: config.statistics.max_plots,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn layout(&self, params: &ParameterCombination) -> OutputLayout {
        OutputLayout::new(&self.output_root, params)
    }

    pub fn analyzer(&self, params: ParameterCombination) -> RqaAnalyzer {
        RqaAnalyzer::with_metrics(params, self.axis_metric, self.joint_metric)
    }

    /// Trajectory files a request covers
    pub fn discover(&self, request: &PipelineRequest) -> RqaResult<Vec<TrajectoryFile>> {
        self.discover_files(&request.data_version, &request.normalized_groups())
    }

    pub fn discover_files(&self, data_version: &str, groups: &[Group]) -> RqaResult<Vec<TrajectoryFile>> {
        discover_trajectories(&self.data_root, data_version, groups)
    }

    /// Run all five stages; failures are reported in the response
    pub fn run(&self, request: &PipelineRequest) -> PipelineResponse {
        let layout = self.layout(&request.params);
        match self.try_run(request) {
            Ok(response) => response,
            Err(e) => {
                warn!(signature = %request.params.signature(), error = %e, "pipeline run failed");
                PipelineResponse::failure(request.params.signature(), layout.root().to_path_buf(), &e)
            }
        }
    }

    /// Run all five stages, propagating the first stage failure
    pub fn try_run(&self, request: &PipelineRequest) -> RqaResult<PipelineResponse> {
        request.validate()?;
        let signature = request.params.signature();
        let span = info_span!("pipeline", signature = %signature);
        let _guard = span.enter();

        let layout = self.layout(&request.params);
        let groups = request.normalized_groups();
        let mut metadata = self.load_metadata(request, &layout)?;

        info!(groups = ?groups, data_version = %request.data_version, "starting pipeline run");

        let files = self.discover(request)?;
        let analyzer = self.analyzer(request.params);
        metadata.invalidate_from(PipelineStep::Extraction);
        let extraction = extraction::extract_all(&files, &analyzer, &layout, &groups)?;
        info!(
            processed = extraction.processed(),
            failed = extraction.failed(),
            "step 1 complete"
        );
        metadata.mark_completed(PipelineStep::Extraction, extraction.processed());
        metadata.save(&layout.metadata_file())?;

        let mut response = self.run_from_merging(request, &layout, &mut metadata)?;
        response.processed_files = extraction.processed();
        response.failed_files = extraction.failed();
        Ok(response)
    }

    /// Step 1 for a single trajectory file
    ///
    /// Does not touch `metadata.json`, so many files of one combination can
    /// be extracted concurrently. Follow up with [`finalize`](Self::finalize).
    pub fn extract_file(&self, params: ParameterCombination, file: &TrajectoryFile) -> RqaResult<PathBuf> {
        params
            .validate()
            .map_err(|e| RqaError::validation(e, error_context!("pipeline", "extract_file")))?;
        extraction::extract_file(file, &self.analyzer(params), &self.layout(&params))
    }

    /// Remove step-1 outputs of `groups` ahead of a file-level extraction
    ///
    /// Must run before any [`extract_file`](Self::extract_file) of the same
    /// combination is dispatched.
    pub fn clear_extraction(&self, params: &ParameterCombination, groups: &[Group]) -> RqaResult<usize> {
        extraction::clear_outputs(&self.layout(params), groups)
    }

    /// Record step 1 from the files on disk, then run steps 2 to 5
    pub fn finalize(&self, request: &PipelineRequest) -> RqaResult<PipelineResponse> {
        request.validate()?;
        let signature = request.params.signature();
        let span = info_span!("pipeline_finalize", signature = %signature);
        let _guard = span.enter();

        let layout = self.layout(&request.params);
        let mut metadata = self.load_metadata(request, &layout)?;

        let mut step1_files = 0;
        for group in request.normalized_groups() {
            step1_files += extraction::step1_files(&layout, group)?.len();
        }
        metadata.invalidate_from(PipelineStep::Extraction);
        metadata.mark_completed(PipelineStep::Extraction, step1_files);
        metadata.save(&layout.metadata_file())?;

        let mut response = self.run_from_merging(request, &layout, &mut metadata)?;
        response.processed_files = step1_files;
        Ok(response)
    }

    /// Run one stage against whatever the previous stage left on disk
    ///
    /// Returns the stage's record count (files, rows, features or plots).
    pub fn run_step(&self, request: &PipelineRequest, step: PipelineStep) -> RqaResult<usize> {
        request.validate()?;
        let span = info_span!("pipeline_step", signature = %request.params.signature(), step = step.number());
        let _guard = span.enter();

        let layout = self.layout(&request.params);
        let groups = request.normalized_groups();
        let mut metadata = self.load_metadata(request, &layout)?;

        let records = match step {
            PipelineStep::Extraction => {
                let files = self.discover(request)?;
                extraction::extract_all(&files, &self.analyzer(request.params), &layout, &groups)?
                    .processed()
            }
            PipelineStep::Merging => merging::merge_features(&layout, &groups)?.len(),
            PipelineStep::Enrichment => enrichment::enrich_features(&layout)?.features.len(),
            PipelineStep::StatisticalTesting => {
                statistics::run_group_comparison(&layout, self.significance_level)?.len()
            }
            PipelineStep::Visualization => visualization::render_plots(&layout, self.max_plots)?.plots.len(),
        };

        metadata.invalidate_from(step);
        metadata.mark_completed(step, records);
        metadata.save(&layout.metadata_file())?;
        info!(step = %step, records, "step complete");
        Ok(records)
    }

    fn load_metadata(&self, request: &PipelineRequest, layout: &OutputLayout) -> RqaResult<PipelineMetadata> {
        let mut metadata = PipelineMetadata::load_or_new(
            &layout.metadata_file(),
            request.params,
            &request.normalized_groups(),
            &request.data_version,
        )?;
        if request.batch_id.is_some() {
            metadata.batch_id = request.batch_id.clone();
        }
        if request.task_id.is_some() {
            metadata.task_id = request.task_id.clone();
        }
        Ok(metadata)
    }

    fn run_from_merging(
        &self,
        request: &PipelineRequest,
        layout: &OutputLayout,
        metadata: &mut PipelineMetadata,
    ) -> RqaResult<PipelineResponse> {
        let groups = request.normalized_groups();
        let metadata_file = layout.metadata_file();

        let merged = merging::merge_features(layout, &groups)?;
        metadata.mark_completed(PipelineStep::Merging, merged.len());
        metadata.save(&metadata_file)?;
        info!(records = merged.len(), "step 2 complete");

        let enriched = enrichment::enrich_features(layout)?;
        metadata.mark_completed(PipelineStep::Enrichment, enriched.features.len());
        metadata.save(&metadata_file)?;
        info!(features = enriched.features.len(), "step 3 complete");

        let comparisons = statistics::run_group_comparison(layout, self.significance_level)?;
        let significant = comparisons.iter().filter(|c| c.significant).count();
        metadata.mark_completed(PipelineStep::StatisticalTesting, comparisons.len());
        metadata.save(&metadata_file)?;
        info!(features = comparisons.len(), significant, "step 4 complete");

        let plots = visualization::render_plots(layout, self.max_plots)?;
        metadata.mark_completed(PipelineStep::Visualization, plots.plots.len());
        metadata.save(&metadata_file)?;
        info!(plots = plots.plots.len(), "step 5 complete");

        Ok(PipelineResponse {
            success: true,
            signature: request.params.signature(),
            output_dir: layout.root().to_path_buf(),
            processed_files: 0,
            failed_files: 0,
            total_records: merged.len(),
            significant_features: significant,
            plots: plots.plots.len(),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{write_synthetic_dataset, SyntheticDatasetSpec};
    use crate::data::trajectory::TaskId;
    use tempfile::TempDir;

    fn orchestrator(data: &Path, out: &Path) -> PipelineOrchestrator {
        let mut config = AnalysisConfig::default();
        config.paths.data_root = data.to_path_buf();
        config.paths.output_root = out.to_path_buf();
        PipelineOrchestrator::new(&config)
    }

    fn dataset(root: &Path) {
        let spec = SyntheticDatasetSpec {
            subjects_per_group: 2,
            tasks: vec![TaskId::new(1).unwrap()],
            samples: 80,
            seed: 11,
        };
        write_synthetic_dataset(root, "v1", &spec).unwrap();
    }

    #[test]
    fn test_request_validation() {
        let params = ParameterCombination::default();
        let mut request = PipelineRequest::all_groups(params);
        assert!(request.validate().is_ok());

        request.groups.clear();
        assert!(request.validate().is_err());

        let bad = PipelineRequest::all_groups(ParameterCombination {
            m: 0,
            tau: 1,
            eps: 0.1,
            lmin: 2,
        });
        let response = orchestrator(Path::new("/nonexistent"), Path::new("/nonexistent")).run(&bad);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("VALIDATION"));
    }

    #[test]
    fn test_run_records_metadata() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        dataset(data.path());

        let orchestrator = orchestrator(data.path(), out.path());
        let params = ParameterCombination::new(2, 1, 0.1, 2).unwrap();
        let mut request = PipelineRequest::all_groups(params);
        request.batch_id = Some("b1".to_string());

        let response = orchestrator.run(&request);
        assert!(response.success, "{:?}", response.error);
        assert_eq!(response.processed_files, 6);
        assert_eq!(response.total_records, 6);

        let metadata = PipelineMetadata::load(&orchestrator.layout(&params).metadata_file())
            .unwrap()
            .unwrap();
        assert!(metadata.is_finished());
        assert_eq!(metadata.records(PipelineStep::Merging), Some(6));
        assert_eq!(metadata.records(PipelineStep::Enrichment), Some(23));
        assert_eq!(metadata.batch_id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_run_step_requires_previous_artifact() {
        let out = TempDir::new().unwrap();
        let orchestrator = orchestrator(Path::new("/nonexistent"), out.path());
        let request = PipelineRequest::all_groups(ParameterCombination::default());

        let err = orchestrator
            .run_step(&request, PipelineStep::Enrichment)
            .unwrap_err();
        assert!(matches!(err, RqaError::MissingArtifact { stage: ProcessingStage::Enrichment, .. }));
    }

    #[test]
    fn test_no_input_files_is_no_data() {
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let orchestrator = orchestrator(data.path(), out.path());
        let request = PipelineRequest::all_groups(ParameterCombination::default());

        let err = orchestrator.try_run(&request).unwrap_err();
        assert!(matches!(err, RqaError::NoData { stage: ProcessingStage::Merging, .. }));
    }
}
