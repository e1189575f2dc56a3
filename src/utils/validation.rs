//! Validation utilities for RQA-Core
//!
//! Provides validation functions for:
//! - Parameter ranges of embedding and recurrence settings
//! - Enumerated labels (groups, tasks, metrics)
//! - Cross-field constraints in configuration and range specs
//!
//! All bounds come from the config module to avoid magic numbers.

use std::fmt;

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Value out of valid range
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
    /// Invalid field format
    InvalidFormat {
        field: String,
        value: String,
        expected: String,
    },
    /// Invalid enum value
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// Cross-field validation failure
    ConstraintViolation {
        fields: Vec<String>,
        message: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange { field, value, min, max } => {
                write!(f, "Field '{}' value '{}' is out of range [{}, {}]", field, value, min, max)
            }
            ValidationError::InvalidFormat { field, value, expected } => {
                write!(f, "Field '{}' has invalid format '{}', expected {}", field, value, expected)
            }
            ValidationError::InvalidEnumValue { field, value, valid_values } => {
                write!(
                    f,
                    "Field '{}' value '{}' is invalid, valid values: [{}]",
                    field,
                    value,
                    valid_values.join(", ")
                )
            }
            ValidationError::ConstraintViolation { fields, message } => {
                write!(f, "Constraint violation for fields [{}]: {}", fields.join(", "), message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Name of the offending field (first field for constraint violations)
    pub fn field(&self) -> &str {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::InvalidEnumValue { field, .. } => field,
            ValidationError::ConstraintViolation { fields, .. } => {
                fields.first().map(String::as_str).unwrap_or("")
            }
        }
    }
}

/// Validate that `value` lies within `[min, max]`
pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> ValidationResult<T>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }
    Ok(value)
}

/// Validate that `value` lies within `(min, max]`; rejects NaN
pub fn validate_half_open_range(field: &str, value: f64, min: f64, max: f64) -> ValidationResult<f64> {
    if !value.is_finite() || value <= min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            min: format!("(exclusive) {}", min),
            max: max.to_string(),
        });
    }
    Ok(value)
}

/// Validate a strictly positive step for range expansion
pub fn validate_positive(field: &str, value: f64) -> ValidationResult<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            value: value.to_string(),
            expected: "a finite value > 0".to_string(),
        });
    }
    Ok(value)
}

/// Validate that a label belongs to an allowed set
pub fn validate_one_of(field: &str, value: &str, valid_values: &[&str]) -> ValidationResult<()> {
    if valid_values.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
            valid_values: valid_values.iter().map(|v| v.to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_range_bounds_inclusive() {
        assert!(validate_range("m", 1usize, 1, 20).is_ok());
        assert!(validate_range("m", 20usize, 1, 20).is_ok());
        assert!(validate_range("m", 0usize, 1, 20).is_err());
        assert!(validate_range("m", 21usize, 1, 20).is_err());
    }

    #[test]
    fn test_half_open_range() {
        assert!(validate_half_open_range("eps", 1.0, 0.0, 1.0).is_ok());
        assert!(validate_half_open_range("eps", 0.0, 0.0, 1.0).is_err());
        assert!(validate_half_open_range("eps", f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_error_display_and_field() {
        let err = validate_range("lmin", 1usize, 2, 10).unwrap_err();
        assert_eq!(err.field(), "lmin");
        assert!(err.to_string().contains("out of range [2, 10]"));

        let err = validate_one_of("group", "xyz", &["control", "mci", "ad"]).unwrap_err();
        assert!(err.to_string().contains("control, mci, ad"));
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive("step", 0.01).is_ok());
        assert!(validate_positive("step", 0.0).is_err());
        assert!(validate_positive("step", -1.0).is_err());
    }
}
