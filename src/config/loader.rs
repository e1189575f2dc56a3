// src/config/loader.rs
//! Layered configuration loader
//!
//! Layers, lowest precedence first: built-in defaults, each existing TOML file
//! in the path list, then `RQA_<SECTION>_<KEY>` environment variables. The
//! merged document is schema checked before it is deserialized.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::schema_validator::{SchemaValidator, SchemaViolation};
use crate::config::{constants::paths, AnalysisConfig};
use crate::error::RqaError;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration validation errors:{}", format_violations(.0))]
    ValidationError(Vec<SchemaViolation>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations.iter().map(|v| format!("\n  {}", v)).collect()
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for RqaError {
    fn from(err: ConfigError) -> Self {
        RqaError::Configuration {
            component: "config_loader".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Top-level sections recognized in environment overrides
const SECTIONS: [&str; 6] = ["paths", "rqa", "sweep", "statistics", "scoring", "aggregation"];

pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    schema_validator: SchemaValidator,
    use_environment: bool,
    current_config: AnalysisConfig,
}

impl ConfigLoader {
    /// Loader over `rqa.toml` and `rqa.local.toml` in the working directory
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths: paths,
            schema_validator: SchemaValidator::new(),
            use_environment: true,
            current_config: AnalysisConfig::default(),
        }
    }

    /// Disable the environment layer
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate every layer
    pub fn load(&mut self) -> Result<AnalysisConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        self.current_config = config.clone();
        Ok(config)
    }

    /// Last successfully loaded configuration (defaults before the first load)
    pub fn current_config(&self) -> &AnalysisConfig {
        &self.current_config
    }

    /// Validate a single file without loading it
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let value = self.load_config_file(path.as_ref())?;
        self.validate_value(&value)
    }

    /// Write the current configuration as TOML
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml_content =
            toml::to_string_pretty(&self.current_config).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    fn load_and_merge_configs(&self) -> Result<AnalysisConfig, ConfigError> {
        let mut merged = toml::Value::try_from(AnalysisConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                continue;
            }
            debug!(path = %config_path.display(), "merging configuration file");
            let file_config = self.load_config_file(config_path)?;
            merge_toml_values(&mut merged, file_config);
        }

        if self.use_environment {
            apply_overrides(&mut merged, std::env::vars());
        }

        self.validate_value(&merged)?;

        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))
    }

    fn validate_value(&self, value: &toml::Value) -> Result<(), ConfigError> {
        self.schema_validator
            .validate_config(value)
            .map_err(ConfigError::ValidationError)?;
        self.schema_validator
            .validate_dependencies(value)
            .map_err(ConfigError::ValidationError)
    }

    fn load_config_file(&self, path: &Path) -> Result<toml::Value, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(base_value) => merge_toml_values(base_value, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_value, overlay_value) => *base_value = overlay_value,
    }
}

/// Apply `RQA_<SECTION>_<KEY>` variables onto `config`
///
/// The key is matched against the existing section table, so
/// `RQA_SWEEP_EPS_RANGE_END` lands on `sweep.eps_range.end`. Unknown sections
/// are ignored.
fn apply_overrides(config: &mut toml::Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        let rest = rest.to_ascii_lowercase();
        let Some((section, field)) = rest.split_once('_') else {
            continue;
        };
        if !SECTIONS.contains(&section) {
            continue;
        }
        let Some(table) = config.get_mut(section).and_then(toml::Value::as_table_mut) else {
            continue;
        };

        let parsed = parse_env_value(&value);
        if table.contains_key(field) {
            debug!(key = %key, "environment override");
            table.insert(field.to_string(), parsed);
            continue;
        }
        let nested = table.iter_mut().find_map(|(name, sub)| {
            let leaf = field.strip_prefix(name.as_str())?.strip_prefix('_')?;
            sub.as_table_mut().map(|t| (t, leaf.to_string()))
        });
        if let Some((sub, leaf)) = nested {
            debug!(key = %key, "environment override");
            sub.insert(leaf, parsed);
        }
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}
