//! `metadata.json`: per-signature record of completed steps

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::data::params::ParameterCombination;
use crate::data::trajectory::Group;
use crate::error::{ProcessingStage, RqaError, RqaResult};
use crate::utils::io::write_atomic;

/// The five pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Extraction,
    Merging,
    Enrichment,
    StatisticalTesting,
    Visualization,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 5] = [
        PipelineStep::Extraction,
        PipelineStep::Merging,
        PipelineStep::Enrichment,
        PipelineStep::StatisticalTesting,
        PipelineStep::Visualization,
    ];

    /// 1-based step number
    pub fn number(&self) -> u8 {
        match self {
            PipelineStep::Extraction => 1,
            PipelineStep::Merging => 2,
            PipelineStep::Enrichment => 3,
            PipelineStep::StatisticalTesting => 4,
            PipelineStep::Visualization => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.number() == number)
    }

    pub fn stage(&self) -> ProcessingStage {
        match self {
            PipelineStep::Extraction => ProcessingStage::Extraction,
            PipelineStep::Merging => ProcessingStage::Merging,
            PipelineStep::Enrichment => ProcessingStage::Enrichment,
            PipelineStep::StatisticalTesting => ProcessingStage::StatisticalTesting,
            PipelineStep::Visualization => ProcessingStage::Visualization,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stage())
    }
}

/// Completion record of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatus {
    pub completed: bool,
    /// Files, rows or plots produced, depending on the step
    pub records: usize,
    /// Seconds since the Unix epoch
    pub completed_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub params: ParameterCombination,
    pub signature: String,
    pub groups: Vec<Group>,
    pub data_version: String,
    #[serde(default)]
    pub steps: BTreeMap<PipelineStep, StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl PipelineMetadata {
    pub fn new(params: ParameterCombination, groups: &[Group], data_version: &str) -> Self {
        Self {
            signature: params.signature(),
            params,
            groups: groups.to_vec(),
            data_version: data_version.to_string(),
            steps: BTreeMap::new(),
            batch_id: None,
            task_id: None,
        }
    }

    /// Read `path`; `Ok(None)` if it does not exist
    pub fn load(path: &Path) -> RqaResult<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(path).map_err(|e| RqaError::io("read", path, e))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Load existing metadata for the same signature or start fresh
    ///
    /// Step records are kept only when the run scope (groups, data version)
    /// matches, so stale completion flags never leak into a different run.
    pub fn load_or_new(
        path: &Path,
        params: ParameterCombination,
        groups: &[Group],
        data_version: &str,
    ) -> RqaResult<Self> {
        let fresh = Self::new(params, groups, data_version);
        match Self::load(path)? {
            Some(existing)
                if existing.signature == fresh.signature
                    && existing.groups == fresh.groups
                    && existing.data_version == fresh.data_version =>
            {
                Ok(existing)
            }
            _ => Ok(fresh),
        }
    }

    pub fn save(&self, path: &Path) -> RqaResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    pub fn mark_completed(&mut self, step: PipelineStep, records: usize) {
        self.steps.insert(
            step,
            StepStatus {
                completed: true,
                records,
                completed_at: unix_seconds(),
            },
        );
    }

    /// Forget `step` and every later step
    pub fn invalidate_from(&mut self, step: PipelineStep) {
        self.steps.retain(|s, _| *s < step);
    }

    pub fn is_completed(&self, step: PipelineStep) -> bool {
        self.steps.get(&step).map(|s| s.completed).unwrap_or(false)
    }

    pub fn records(&self, step: PipelineStep) -> Option<usize> {
        self.steps.get(&step).map(|s| s.records)
    }

    /// True once the final step has completed
    pub fn is_finished(&self) -> bool {
        self.is_completed(PipelineStep::Visualization)
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
