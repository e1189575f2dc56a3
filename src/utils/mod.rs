//! Common utility functions for RQA-Core
//!
//! - Parameter and label validation with typed errors
//! - Atomic file output and minimal CSV handling
//! - Descriptive statistics and one-way ANOVA
//!
//! Bounds and file names live in the config module.

pub mod io;
pub mod stats;
pub mod validation;

// Re-export commonly used functions for convenience
pub use io::{ensure_dir, read_csv, write_atomic, CsvTable};

pub use stats::{coefficient_of_variation, mean, one_way_anova, sample_std, AnovaResult};

pub use validation::{
    validate_one_of, validate_positive, validate_range, ValidationError, ValidationResult,
};
