// src/config/schema_validator.rs
//! Configuration schema validation over dotted keys

use std::collections::HashMap;

use crate::config::constants::*;

/// A single schema violation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub field: String,
    pub message: String,
    pub value: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error for '{}': {} (value: {})", self.field, self.message, self.value)
    }
}

impl std::error::Error for SchemaViolation {}

/// Field validation constraints
#[derive(Debug, Clone)]
pub enum FieldConstraint {
    /// Inclusive float range; integers are accepted and widened
    Range { min: f64, max: f64 },
    /// Float range excluding `min`
    RangeExclusiveMin { min: f64, max: f64 },
    IntRange { min: i64, max: i64 },
    OneOf(Vec<String>),
    MinLength(usize),
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    constraints: HashMap<String, FieldConstraint>,
}

const RANGE_KEYS: [&str; 4] = ["m_range", "tau_range", "eps_range", "lmin_range"];

impl SchemaValidator {
    /// Validator loaded with the analysis configuration schema
    pub fn new() -> Self {
        let mut constraints = HashMap::new();
        let mut add = |key: &str, constraint: FieldConstraint| {
            constraints.insert(key.to_string(), constraint);
        };

        add("paths.data_version", FieldConstraint::MinLength(1));

        add(
            "rqa.m",
            FieldConstraint::IntRange {
                min: params::MIN_EMBEDDING_DIMENSION as i64,
                max: params::MAX_EMBEDDING_DIMENSION as i64,
            },
        );
        add(
            "rqa.tau",
            FieldConstraint::IntRange {
                min: params::MIN_TIME_DELAY as i64,
                max: params::MAX_TIME_DELAY as i64,
            },
        );
        add(
            "rqa.eps",
            FieldConstraint::RangeExclusiveMin {
                min: params::MIN_EPSILON_EXCLUSIVE,
                max: params::MAX_EPSILON,
            },
        );
        add(
            "rqa.lmin",
            FieldConstraint::IntRange {
                min: params::MIN_LINE_LENGTH as i64,
                max: params::MAX_LINE_LENGTH as i64,
            },
        );
        let metrics = FieldConstraint::OneOf(vec!["abs_diff".to_string(), "euclidean".to_string()]);
        add("rqa.axis_metric", metrics.clone());
        add("rqa.joint_metric", metrics);

        add(
            "sweep.workers",
            FieldConstraint::IntRange {
                min: 1,
                max: sweep::MAX_WORKERS as i64,
            },
        );
        add(
            "sweep.granularity",
            FieldConstraint::OneOf(vec!["combination".to_string(), "file".to_string()]),
        );
        for key in ["m_range", "tau_range", "lmin_range"] {
            add(&format!("sweep.{}.step", key), FieldConstraint::IntRange { min: 1, max: i64::MAX });
        }
        add(
            "sweep.eps_range.step",
            FieldConstraint::RangeExclusiveMin { min: 0.0, max: params::MAX_EPSILON },
        );

        add(
            "statistics.significance_level",
            FieldConstraint::RangeExclusiveMin { min: 0.0, max: 0.5 },
        );
        add("statistics.max_plots", FieldConstraint::IntRange { min: 0, max: 1000 });

        for key in ["f_weight", "effect_weight", "consistency_weight", "p_weight"] {
            add(&format!("scoring.{}", key), FieldConstraint::Range { min: 0.0, max: 1.0 });
        }
        add(
            "scoring.f_normalizer",
            FieldConstraint::RangeExclusiveMin { min: 0.0, max: 1e9 },
        );

        for key in ["top_k", "top_k_params", "top_n_features"] {
            add(&format!("aggregation.{}", key), FieldConstraint::IntRange { min: 1, max: 100_000 });
        }
        add(
            "aggregation.rank_by",
            FieldConstraint::OneOf(vec![
                "overall_score".to_string(),
                "f_statistic".to_string(),
                "effect_size".to_string(),
                "task_consistency".to_string(),
            ]),
        );

        Self { constraints }
    }

    /// Validate one value against its constraint, if any
    pub fn validate_field(&self, field_path: &str, value: &toml::Value) -> Result<(), SchemaViolation> {
        match self.constraints.get(field_path) {
            Some(constraint) => check_constraint(field_path, value, constraint),
            None => Ok(()),
        }
    }

    /// Validate every constrained key present in `config`
    pub fn validate_config(&self, config: &toml::Value) -> Result<(), Vec<SchemaViolation>> {
        let mut errors = Vec::new();
        self.validate_recursive("", config, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Cross-field dependencies
    pub fn validate_dependencies(&self, config: &toml::Value) -> Result<(), Vec<SchemaViolation>> {
        let mut errors = Vec::new();

        for key in RANGE_KEYS {
            let start = numeric(get_nested_value(config, &format!("sweep.{}.start", key)));
            let end = numeric(get_nested_value(config, &format!("sweep.{}.end", key)));
            if let (Some(start), Some(end)) = (start, end) {
                if start > end {
                    errors.push(SchemaViolation {
                        field: format!("sweep.{}", key),
                        message: "Range start must not exceed end".to_string(),
                        value: format!("start: {}, end: {}", start, end),
                    });
                }
            }
        }

        if let (Some(data), Some(output)) = (
            get_nested_value(config, "paths.data_root").and_then(toml::Value::as_str),
            get_nested_value(config, "paths.output_root").and_then(toml::Value::as_str),
        ) {
            if data == output {
                errors.push(SchemaViolation {
                    field: "paths.output_root".to_string(),
                    message: "Output root must differ from data root".to_string(),
                    value: output.to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_recursive(&self, prefix: &str, value: &toml::Value, errors: &mut Vec<SchemaViolation>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    self.validate_recursive(&path, val, errors);
                }
            }
            _ => {
                if let Err(err) = self.validate_field(prefix, value) {
                    errors.push(err);
                }
            }
        }
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn numeric(value: Option<&toml::Value>) -> Option<f64> {
    match value? {
        toml::Value::Float(v) => Some(*v),
        toml::Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}

fn violation(field: &str, message: String, value: impl ToString) -> SchemaViolation {
    SchemaViolation {
        field: field.to_string(),
        message,
        value: value.to_string(),
    }
}

fn check_constraint(field: &str, value: &toml::Value, constraint: &FieldConstraint) -> Result<(), SchemaViolation> {
    match constraint {
        FieldConstraint::Range { min, max } => {
            if let Some(val) = numeric(Some(value)) {
                if val < *min || val > *max {
                    return Err(violation(field, format!("Value must be between {} and {}", min, max), val));
                }
            }
        }
        FieldConstraint::RangeExclusiveMin { min, max } => {
            if let Some(val) = numeric(Some(value)) {
                if val <= *min || val > *max {
                    return Err(violation(field, format!("Value must be in ({}, {}]", min, max), val));
                }
            }
        }
        FieldConstraint::IntRange { min, max } => {
            if let Some(val) = value.as_integer() {
                if val < *min || val > *max {
                    return Err(violation(field, format!("Value must be between {} and {}", min, max), val));
                }
            }
        }
        FieldConstraint::OneOf(options) => {
            if let Some(val) = value.as_str() {
                let val_lower = val.to_lowercase();
                if !options.iter().any(|opt| opt.to_lowercase() == val_lower) {
                    return Err(violation(field, format!("Value must be one of: {}", options.join(", ")), val));
                }
            }
        }
        FieldConstraint::MinLength(min_len) => {
            if let Some(val) = value.as_str() {
                if val.trim().len() < *min_len {
                    return Err(violation(field, format!("Minimum length is {}", min_len), val));
                }
            }
        }
    }
    Ok(())
}

fn get_nested_value<'a>(config: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.')
        .try_fold(config, |current, part| current.as_table()?.get(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_bounds() {
        let validator = SchemaValidator::new();
        assert!(validator.validate_field("rqa.m", &toml::Value::Integer(20)).is_ok());
        assert!(validator.validate_field("rqa.m", &toml::Value::Integer(21)).is_err());
        assert!(validator.validate_field("rqa.eps", &toml::Value::Float(1.0)).is_ok());
        assert!(validator.validate_field("rqa.eps", &toml::Value::Float(0.0)).is_err());
        assert!(validator.validate_field("rqa.lmin", &toml::Value::Integer(1)).is_err());
    }

    #[test]
    fn test_enum_validation() {
        let validator = SchemaValidator::new();
        let valid = toml::Value::String("File".to_string());
        assert!(validator.validate_field("sweep.granularity", &valid).is_ok());

        let invalid = toml::Value::String("chebyshev".to_string());
        assert!(validator.validate_field("rqa.axis_metric", &invalid).is_err());
    }

    #[test]
    fn test_nested_range_step() {
        let validator = SchemaValidator::new();
        let config: toml::Value = toml::from_str("[sweep.m_range]\nstart = 2\nend = 4\nstep = 0").unwrap();
        let errors = validator.validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "sweep.m_range.step");
    }

    #[test]
    fn test_range_order_dependency() {
        let validator = SchemaValidator::new();
        let config: toml::Value =
            toml::from_str("[sweep.eps_range]\nstart = 0.08\nend = 0.02\nstep = 0.02").unwrap();
        let errors = validator.validate_dependencies(&config).unwrap_err();
        assert_eq!(errors[0].field, "sweep.eps_range");
    }
}
