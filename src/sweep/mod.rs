//! Parameter sweeps over a fixed-size worker pool
//!
//! The coordinator expands a [`ParameterGrid`], turns it into self-contained
//! [`SweepTask`]s and runs them on a dedicated rayon pool of exactly
//! `workers` threads. Outcomes stream back over a crossbeam channel as they
//! complete. Workers share nothing mutable: each combination owns its
//! signature directory, and file-level tasks only write their own step-1
//! file. A failed or panicking task becomes a failed [`TaskOutcome`]; it is
//! reported and never retried.

pub mod task;

pub use task::{SweepGranularity, SweepTask, TaskOutcome, TaskResult};

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use crate::config::constants::sweep::{MAX_REPORTED_ERRORS, MAX_WORKERS};
use crate::config::AnalysisConfig;
use crate::data::params::{ParameterCombination, ParameterGrid};
use crate::data::trajectory::Group;
use crate::error::{RqaError, RqaResult};
use crate::error_context;
use crate::pipeline::{PipelineMetadata, PipelineOrchestrator, PipelineRequest};
use crate::utils::validation::validate_range;

/// Everything a sweep needs besides the orchestrator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRequest {
    pub grid: ParameterGrid,
    pub groups: Vec<Group>,
    pub data_version: String,
    pub workers: usize,
    pub granularity: SweepGranularity,
    /// Leave combinations whose step 5 already completed untouched
    pub skip_completed: bool,
    pub batch_id: Option<String>,
}

impl SweepRequest {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            grid: config.sweep.grid(),
            groups: Group::ALL.to_vec(),
            data_version: config.paths.data_version.clone(),
            workers: config.sweep.workers,
            granularity: config.sweep.granularity,
            skip_completed: config.sweep.skip_completed,
            batch_id: None,
        }
    }
}

/// Aggregate outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Successful work items
    pub processed: usize,
    /// Failed work items
    pub failed: usize,
    /// Grid points rejected by validation or left alone by `skip_completed`
    pub skipped: usize,
    /// Signature directories with a complete pipeline output
    pub output_paths: Vec<PathBuf>,
    /// First few error messages
    pub errors: Vec<String>,
}

impl SweepReport {
    fn record_error(&mut self, message: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Tasks ready for dispatch plus what was skipped while planning
#[derive(Debug, Clone, Default)]
pub struct SweepPlan {
    pub combinations: Vec<ParameterCombination>,
    pub tasks: Vec<SweepTask>,
    pub skipped: usize,
    /// Output directories of combinations skipped as already complete
    pub completed: Vec<PathBuf>,
}

pub struct ParameterSweepCoordinator {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl ParameterSweepCoordinator {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }

    /// Expand the grid and build the task list without running anything
    pub fn plan(&self, request: &SweepRequest) -> RqaResult<SweepPlan> {
        let expansion = request
            .grid
            .expand()
            .map_err(|e| RqaError::validation(e, error_context!("sweep", "expand_grid")))?;

        let mut plan = SweepPlan {
            skipped: expansion.rejected.len(),
            ..SweepPlan::default()
        };
        for (signature, reason) in &expansion.rejected {
            warn!(signature = %signature, reason = %reason, "skipping invalid grid point");
        }

        for params in expansion.combinations {
            let layout = self.orchestrator.layout(&params);
            if request.skip_completed {
                let finished = PipelineMetadata::load(&layout.metadata_file())?
                    .map(|m| m.is_finished())
                    .unwrap_or(false);
                if finished {
                    debug!(signature = %params.signature(), "already complete, skipping");
                    plan.skipped += 1;
                    plan.completed.push(layout.root().to_path_buf());
                    continue;
                }
            }
            plan.combinations.push(params);
        }

        plan.tasks = match request.granularity {
            SweepGranularity::Combination => plan
                .combinations
                .iter()
                .map(|&params| SweepTask::Combination {
                    params,
                    groups: request.groups.clone(),
                    data_version: request.data_version.clone(),
                    batch_id: request.batch_id.clone(),
                })
                .collect(),
            SweepGranularity::File => {
                let mut groups = request.groups.clone();
                groups.sort();
                groups.dedup();
                let files = self.orchestrator.discover_files(&request.data_version, &groups)?;
                plan.combinations
                    .iter()
                    .flat_map(|&params| {
                        files.iter().map(move |file| SweepTask::File {
                            params,
                            file: file.clone(),
                        })
                    })
                    .collect()
            }
        };

        Ok(plan)
    }

    /// Run the whole sweep and block until every task has reported
    pub fn run(&self, request: &SweepRequest) -> RqaResult<SweepReport> {
        validate_range("workers", request.workers, 1, MAX_WORKERS)
            .map_err(|e| RqaError::validation(e, error_context!("sweep", "run")))?;

        let span = info_span!("sweep", workers = request.workers, granularity = ?request.granularity);
        let _guard = span.enter();

        let plan = self.plan(request)?;
        info!(
            combinations = plan.combinations.len(),
            tasks = plan.tasks.len(),
            skipped = plan.skipped,
            "sweep planned"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(request.workers)
            .thread_name(|i| format!("rqa-worker-{}", i))
            .build()
            .map_err(|e| RqaError::Worker {
                task: "pool".to_string(),
                reason: e.to_string(),
            })?;

        let mut report = SweepReport {
            skipped: plan.skipped,
            output_paths: plan.completed.clone(),
            ..SweepReport::default()
        };

        if request.granularity == SweepGranularity::File {
            // file tasks only add step-1 files, so earlier runs' files must go first
            for params in &plan.combinations {
                let removed = self.orchestrator.clear_extraction(params, &request.groups)?;
                if removed > 0 {
                    debug!(signature = %params.signature(), removed, "cleared previous step 1 outputs");
                }
            }
        }

        let outcomes = self.dispatch(&pool, plan.tasks);

        match request.granularity {
            SweepGranularity::Combination => {
                for outcome in outcomes {
                    match (outcome.success, outcome.result) {
                        (true, Some(result)) => {
                            report.processed += 1;
                            report.output_paths.push(result.output_path);
                        }
                        _ => {
                            report.failed += 1;
                            report.record_error(outcome.error.unwrap_or_default());
                        }
                    }
                }
            }
            SweepGranularity::File => {
                let mut files_per_signature: BTreeMap<String, usize> = BTreeMap::new();
                for outcome in outcomes {
                    if outcome.success {
                        report.processed += 1;
                        *files_per_signature.entry(outcome.signature).or_insert(0) += 1;
                    } else {
                        report.failed += 1;
                        report.record_error(outcome.error.unwrap_or_default());
                    }
                }
                self.finalize_combinations(&pool, request, &plan.combinations, &files_per_signature, &mut report);
            }
        }

        report.output_paths.sort();
        info!(
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "sweep finished"
        );
        Ok(report)
    }

    /// Send every task to the pool and collect outcomes in completion order
    fn dispatch(&self, pool: &rayon::ThreadPool, tasks: Vec<SweepTask>) -> Vec<TaskOutcome> {
        let total = tasks.len();
        let (tx, rx) = channel::unbounded::<TaskOutcome>();

        for task in tasks {
            let tx = tx.clone();
            let orchestrator = Arc::clone(&self.orchestrator);
            pool.spawn(move || {
                let outcome = run_isolated(&orchestrator, &task);
                // the receiver only disappears if the coordinator itself is gone
                let _ = tx.send(outcome);
            });
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(total);
        for outcome in rx.iter() {
            if outcome.success {
                debug!(task = %outcome.task_id, done = outcomes.len() + 1, total, "task finished");
            } else {
                error!(task = %outcome.task_id, error = ?outcome.error, "task failed");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Steps 2 to 5 for every combination with at least one extracted file
    fn finalize_combinations(
        &self,
        pool: &rayon::ThreadPool,
        request: &SweepRequest,
        combinations: &[ParameterCombination],
        files_per_signature: &BTreeMap<String, usize>,
        report: &mut SweepReport,
    ) {
        let ready: Vec<ParameterCombination> = combinations
            .iter()
            .copied()
            .filter(|p| files_per_signature.contains_key(&p.signature()))
            .collect();

        let orchestrator = &self.orchestrator;
        let results: Vec<(String, RqaResult<PathBuf>)> = pool.install(|| {
            ready
                .par_iter()
                .map(|&params| {
                    let mut pipeline_request = PipelineRequest::new(params, &request.groups, &request.data_version);
                    pipeline_request.batch_id = request.batch_id.clone();
                    let result = orchestrator
                        .finalize(&pipeline_request)
                        .map(|response| response.output_dir);
                    (params.signature(), result)
                })
                .collect()
        });

        for (signature, result) in results {
            match result {
                Ok(path) => report.output_paths.push(path),
                Err(e) => {
                    error!(signature = %signature, error = %e, "finalizing combination failed");
                    report.failed += 1;
                    report.record_error(format!("{}: {}", signature, e));
                }
            }
        }
    }
}

/// Execute one task, turning errors and panics into a failed outcome
pub fn run_isolated(orchestrator: &PipelineOrchestrator, task: &SweepTask) -> TaskOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| task.execute(orchestrator))) {
        Ok(Ok(result)) => TaskOutcome::succeeded(task, result),
        Ok(Err(e)) => TaskOutcome::failed(
            task,
            RqaError::Worker {
                task: task.id(),
                reason: e.to_string(),
            }
            .to_string(),
        ),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            TaskOutcome::failed(
                task,
                RqaError::Worker {
                    task: task.id(),
                    reason: format!("panic: {}", reason),
                }
                .to_string(),
            )
        }
    }
}
