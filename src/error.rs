// src/error.rs
//! Unified error handling system for RQA Core
//!
//! Every component reports failures through [`RqaError`]. Variants follow the
//! failure taxonomy the batch layers act on: validation failures are rejected
//! before any computation, insufficient-data failures skip a single unit
//! (file, feature) while the surrounding stage continues, missing artifacts
//! fail a stage outright, and worker failures are captured as values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::utils::validation::ValidationError;

/// Unified error type for the entire RQA system
#[derive(Debug, Error)]
pub enum RqaError {
    /// Out-of-range parameters, unknown groups or tasks
    #[error("[VALIDATION] {source} ({context})")]
    Validation {
        source: ValidationError,
        context: ErrorContext,
    },

    /// Trajectory too short for the requested delay embedding
    #[error("[DATA] Trajectory of {samples} samples is too short for m={m}, tau={tau} ({context})")]
    InsufficientLength {
        samples: usize,
        m: usize,
        tau: usize,
        context: ErrorContext,
    },

    /// Embedded trajectory cannot form a recurrence matrix
    #[error("[DATA] Embedded trajectory has {rows} rows, at least 2 required ({context})")]
    EmptyEmbedding { rows: usize, context: ErrorContext },

    /// A stage found nothing to work on
    #[error("[DATA] No data available for {stage}: {reason} ({context})")]
    NoData {
        stage: ProcessingStage,
        reason: String,
        context: ErrorContext,
    },

    /// A statistical comparison had fewer than two non-empty groups
    #[error("[DATA] Feature '{feature}' has {groups} non-empty group(s), at least 2 required")]
    TooFewGroups { feature: String, groups: usize },

    /// A later stage could not find an earlier stage's output
    #[error("[ARTIFACT] {stage} requires missing file {} ({context})", path.display())]
    MissingArtifact {
        stage: ProcessingStage,
        path: PathBuf,
        context: ErrorContext,
    },

    /// A work item failed inside the worker pool
    #[error("[WORKER] Task '{task}' failed: {reason}")]
    Worker { task: String, reason: String },

    /// Filesystem errors with the offending path
    #[error("[IO] {operation} failed for {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed tabular input
    #[error("[PARSE] {}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// JSON (de)serialization of metadata and task messages
    #[error("[SERDE] {0}")]
    Serialization(#[from] serde_json::Error),

    /// Plot rendering failures
    #[error("[PLOT] Failed to render '{feature}': {reason}")]
    Plot { feature: String, reason: String },

    /// Configuration loading and consistency errors
    #[error("[CONFIG] Configuration error in {component}: {reason}")]
    Configuration { component: String, reason: String },
}

/// Coarse error classes used by batch code to decide skip vs. fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Validation,
    InsufficientData,
    MissingArtifact,
    Worker,
    Io,
    Configuration,
    Internal,
}

/// Pipeline stages for error tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    Embedding,
    RecurrenceMatrix,
    MetricExtraction,
    Extraction,
    Merging,
    Enrichment,
    StatisticalTesting,
    Visualization,
    SensitivityScoring,
    Aggregation,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProcessingStage::Embedding => "embedding",
            ProcessingStage::RecurrenceMatrix => "recurrence matrix",
            ProcessingStage::MetricExtraction => "metric extraction",
            ProcessingStage::Extraction => "step 1 (extraction)",
            ProcessingStage::Merging => "step 2 (merging)",
            ProcessingStage::Enrichment => "step 3 (enrichment)",
            ProcessingStage::StatisticalTesting => "step 4 (statistical testing)",
            ProcessingStage::Visualization => "step 5 (visualization)",
            ProcessingStage::SensitivityScoring => "sensitivity scoring",
            ProcessingStage::Aggregation => "feature aggregation",
        };
        f.write_str(name)
    }
}

/// Error context for debugging and analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            file: None,
            line: None,
        }
    }

    /// Create error context with file and line information
    pub fn with_location(component: &str, operation: &str, file: &'static str, line: u32) -> Self {
        let mut context = Self::new(component, operation);
        context.file = Some(file.to_string());
        context.line = Some(line);
        context
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                write!(f, "{}::{} at {}:{}", self.component, self.operation, file, line)
            }
            _ => write!(f, "{}::{}", self.component, self.operation),
        }
    }
}

/// Macro for creating error context with file and line info
#[macro_export]
macro_rules! error_context {
    ($component:expr, $operation:expr) => {
        $crate::error::ErrorContext::with_location($component, $operation, file!(), line!())
    };
}

impl RqaError {
    /// Classify the error for skip/fail decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            RqaError::Validation { .. } => ErrorCategory::Validation,
            RqaError::InsufficientLength { .. }
            | RqaError::EmptyEmbedding { .. }
            | RqaError::NoData { .. }
            | RqaError::TooFewGroups { .. } => ErrorCategory::InsufficientData,
            RqaError::MissingArtifact { .. } => ErrorCategory::MissingArtifact,
            RqaError::Worker { .. } => ErrorCategory::Worker,
            RqaError::Io { .. } | RqaError::Parse { .. } => ErrorCategory::Io,
            RqaError::Configuration { .. } => ErrorCategory::Configuration,
            RqaError::Serialization(_) | RqaError::Plot { .. } => ErrorCategory::Internal,
        }
    }

    /// True when only the current unit of work should be skipped
    pub fn is_skippable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::InsufficientData | ErrorCategory::Io
        )
    }

    /// Wrap a validation failure with its call site
    pub fn validation(source: ValidationError, context: ErrorContext) -> Self {
        RqaError::Validation { source, context }
    }

    /// Filesystem error helper
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RqaError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Missing artifact helper
    pub fn missing(stage: ProcessingStage, path: impl Into<PathBuf>) -> Self {
        RqaError::MissingArtifact {
            stage,
            path: path.into(),
            context: ErrorContext::new("pipeline", "load_artifact"),
        }
    }
}

impl From<ValidationError> for RqaError {
    fn from(source: ValidationError) -> Self {
        RqaError::Validation {
            source,
            context: ErrorContext::new("validation", "check"),
        }
    }
}

/// Result type alias for RQA operations
pub type RqaResult<T> = Result<T, RqaError>;

/// Convenience trait for error building
pub trait IntoRqaError<T> {
    fn rqa_err(self, component: &str, operation: &str) -> RqaResult<T>;
}

impl<T, E> IntoRqaError<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn rqa_err(self, component: &str, operation: &str) -> RqaResult<T> {
        self.map_err(|err| RqaError::Configuration {
            component: format!("{}::{}", component, operation),
            reason: err.to_string(),
        })
    }
}
