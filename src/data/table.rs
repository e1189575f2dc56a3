//! Feature rows and tables persisted between pipeline stages

use std::collections::HashSet;
use std::path::Path;

use crate::data::trajectory::{Group, TaskId};
use crate::error::{RqaError, RqaResult};
use crate::utils::io::{format_float, parse_float, read_csv, write_atomic};

/// Identity columns, always first and in this order
pub const ID_COLUMNS: [&str; 3] = ["subject_id", "group", "task_id"];

const SUBJECT_ALIASES: &[&str] = &["subject_id", "subject", "participant", "id"];
const GROUP_ALIASES: &[&str] = &["group", "group_type", "diagnosis", "label"];
const TASK_ALIASES: &[&str] = &["task_id", "task", "question", "q"];

/// One subject/task row of named numeric features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub subject_id: String,
    pub group: Group,
    pub task: TaskId,
    /// Aligned with [`FeatureTable::features`]
    pub values: Vec<f64>,
}

/// Column-named table of feature rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub features: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(features: Vec<String>) -> Self {
        Self {
            features,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a feature column
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// All values of one feature, in row order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.feature_index(name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Values of one feature split by group (indexed like [`Group::ALL`])
    pub fn column_by_group(&self, name: &str) -> Option<[Vec<f64>; 3]> {
        self.column_by_group_filtered(name, |_| true)
    }

    /// Values of one feature split by group, restricted to rows matching `keep`
    pub fn column_by_group_filtered<F>(&self, name: &str, keep: F) -> Option<[Vec<f64>; 3]>
    where
        F: Fn(&FeatureRow) -> bool,
    {
        let idx = self.feature_index(name)?;
        let mut split: [Vec<f64>; 3] = Default::default();
        for row in self.rows.iter().filter(|r| keep(r)) {
            split[row.group.index()].push(row.values[idx]);
        }
        Some(split)
    }

    /// Append a feature column; `values` must match the row count
    pub fn push_feature(&mut self, name: &str, values: Vec<f64>) -> RqaResult<()> {
        if values.len() != self.rows.len() {
            return Err(RqaError::Configuration {
                component: "feature_table".to_string(),
                reason: format!(
                    "column '{}' has {} values for {} rows",
                    name,
                    values.len(),
                    self.rows.len()
                ),
            });
        }
        self.features.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }
        Ok(())
    }

    /// Render as CSV text
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<&str> = ID_COLUMNS
            .iter()
            .copied()
            .chain(self.features.iter().map(String::as_str))
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');

        for row in &self.rows {
            out.push_str(&row.subject_id);
            out.push(',');
            out.push_str(row.group.label());
            out.push(',');
            out.push_str(&row.task.to_string());
            for value in &row.values {
                out.push(',');
                out.push_str(&format_float(*value));
            }
            out.push('\n');
        }
        out
    }

    /// Atomically write the table to `path`
    pub fn write_csv(&self, path: &Path) -> RqaResult<()> {
        write_atomic(path, self.to_csv().as_bytes())
    }

    /// Read a feature table, normalizing identity columns and group labels
    ///
    /// Every non-identity column becomes a feature; headers are lowercase.
    pub fn read_csv(path: &Path) -> RqaResult<Self> {
        let table = read_csv(path)?;
        let missing = |what: &str| RqaError::Parse {
            path: path.to_path_buf(),
            line: 1,
            reason: format!("missing {} column", what),
        };

        let subject_col = table.column_any(SUBJECT_ALIASES).ok_or_else(|| missing("subject_id"))?;
        let group_col = table.column_any(GROUP_ALIASES).ok_or_else(|| missing("group"))?;
        let task_col = table.column_any(TASK_ALIASES).ok_or_else(|| missing("task_id"))?;

        let id_cols: HashSet<usize> = [subject_col, group_col, task_col].into_iter().collect();
        let feature_cols: Vec<usize> = (0..table.headers.len()).filter(|i| !id_cols.contains(i)).collect();
        let features = feature_cols.iter().map(|&i| table.headers[i].clone()).collect();

        let mut rows = Vec::with_capacity(table.rows.len());
        for (line, cells) in table.rows.iter().enumerate() {
            let parse_err = |reason: String| RqaError::Parse {
                path: path.to_path_buf(),
                line: line + 2,
                reason,
            };
            let group = cells[group_col].parse::<Group>().map_err(|e| parse_err(e.to_string()))?;
            let task = cells[task_col].parse::<TaskId>().map_err(|e| parse_err(e.to_string()))?;
            let values = feature_cols
                .iter()
                .map(|&i| {
                    parse_float(&cells[i])
                        .ok_or_else(|| parse_err(format!("non-numeric value '{}' in '{}'", cells[i], table.headers[i])))
                })
                .collect::<RqaResult<Vec<f64>>>()?;

            rows.push(FeatureRow {
                subject_id: cells[subject_col].clone(),
                group,
                task,
                values,
            });
        }

        Ok(Self { features, rows })
    }

    /// Concatenate tables sharing the same feature columns
    pub fn concat(tables: Vec<FeatureTable>) -> RqaResult<Self> {
        let mut iter = tables.into_iter();
        let mut merged = match iter.next() {
            Some(first) => first,
            None => return Ok(Self::default()),
        };
        for table in iter {
            if table.features != merged.features {
                return Err(RqaError::Configuration {
                    component: "feature_table".to_string(),
                    reason: "cannot concatenate tables with different feature columns".to_string(),
                });
            }
            merged.rows.extend(table.rows);
        }
        Ok(merged)
    }
}
