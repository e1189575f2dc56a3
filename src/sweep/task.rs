//! Typed work items exchanged with sweep workers
//!
//! A task carries everything a worker needs (parameters, inputs, output
//! scope); an outcome carries everything the coordinator needs back. Neither
//! holds references into coordinator state, and both serialize to JSON.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::params::ParameterCombination;
use crate::data::trajectory::{Group, TrajectoryFile};
use crate::error::RqaResult;
use crate::pipeline::{PipelineOrchestrator, PipelineRequest};

/// Unit of work dispatched to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepGranularity {
    /// One task runs all five stages for a combination
    #[default]
    Combination,
    /// One task runs step 1 for one trajectory file
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepTask {
    Combination {
        params: ParameterCombination,
        groups: Vec<Group>,
        data_version: String,
        batch_id: Option<String>,
    },
    File {
        params: ParameterCombination,
        file: TrajectoryFile,
    },
}

impl SweepTask {
    pub fn params(&self) -> &ParameterCombination {
        match self {
            SweepTask::Combination { params, .. } | SweepTask::File { params, .. } => params,
        }
    }

    /// Stable identifier, e.g. `m2_tau1_eps0.050_lmin2` or `m2_tau1_eps0.050_lmin2/ad/a3q1`
    pub fn id(&self) -> String {
        match self {
            SweepTask::Combination { params, .. } => params.signature(),
            SweepTask::File { params, file } => {
                format!("{}/{}/{}", params.signature(), file.group, file.record_id)
            }
        }
    }

    /// Run the task on the calling thread
    pub fn execute(&self, orchestrator: &PipelineOrchestrator) -> RqaResult<TaskResult> {
        match self {
            SweepTask::Combination {
                params,
                groups,
                data_version,
                batch_id,
            } => {
                let mut request = PipelineRequest::new(*params, groups, data_version);
                request.batch_id = batch_id.clone();
                request.task_id = Some(self.id());

                let response = orchestrator.try_run(&request)?;
                Ok(TaskResult {
                    output_path: response.output_dir,
                    records: response.total_records,
                    significant_features: Some(response.significant_features),
                })
            }
            SweepTask::File { params, file } => {
                let output_path = orchestrator.extract_file(*params, file)?;
                Ok(TaskResult {
                    output_path,
                    records: 1,
                    significant_features: None,
                })
            }
        }
    }
}

/// Payload of a successful task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Signature directory for combination tasks, step-1 file for file tasks
    pub output_path: PathBuf,
    pub records: usize,
    pub significant_features: Option<usize>,
}

/// `(success, result, error)` reported by a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub signature: String,
    pub success: bool,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn succeeded(task: &SweepTask, result: TaskResult) -> Self {
        Self {
            task_id: task.id(),
            signature: task.params().signature(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(task: &SweepTask, error: String) -> Self {
        Self {
            task_id: task.id(),
            signature: task.params().signature(),
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::trajectory::TaskId;

    fn file_task() -> SweepTask {
        SweepTask::File {
            params: ParameterCombination::new(3, 2, 0.05, 2).unwrap(),
            file: TrajectoryFile {
                path: PathBuf::from("data/v1/ad/a3q1.csv"),
                group: Group::Ad,
                record_id: "a3q1".to_string(),
                subject_id: "a3".to_string(),
                task: TaskId::new(1).unwrap(),
            },
        }
    }

    #[test]
    fn test_task_ids() {
        assert_eq!(file_task().id(), "m3_tau2_eps0.050_lmin2/ad/a3q1");

        let combination = SweepTask::Combination {
            params: ParameterCombination::default(),
            groups: Group::ALL.to_vec(),
            data_version: "v1".to_string(),
            batch_id: None,
        };
        assert_eq!(combination.id(), "m2_tau1_eps0.050_lmin2");
    }

    #[test]
    fn test_messages_serialize() {
        let task = file_task();
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"kind\":\"file\""));
        let back: SweepTask = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);

        let outcome = TaskOutcome::failed(&task, "boom".to_string());
        let json = serde_json::to_string(&outcome).unwrap();
        let back: TaskOutcome = serde_json::from_str(&json).unwrap();
        assert!(!back.success);
        assert_eq!(back.result, None);
        assert_eq!(back.error.as_deref(), Some("boom"));
    }
}
