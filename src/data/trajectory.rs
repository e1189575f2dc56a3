//! Gaze trajectories and the ingestion schema boundary
//!
//! Group labels, task ids and coordinate column names arrive in many
//! spellings. They are mapped to fixed enumerations here, once, and the rest
//! of the crate only ever sees [`Group`] and [`TaskId`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RqaError, RqaResult};
use crate::utils::io::{parse_float, read_csv};
use crate::utils::validation::ValidationError;

/// Accepted spellings for the x coordinate column (lowercase)
pub const X_COLUMN_ALIASES: &[&str] = &[
    "x",
    "gaze_x",
    "gazex",
    "gazepointx",
    "gaze_point_x",
    "gaze_position_x",
    "x_norm",
    "norm_x",
];

/// Accepted spellings for the y coordinate column (lowercase)
pub const Y_COLUMN_ALIASES: &[&str] = &[
    "y",
    "gaze_y",
    "gazey",
    "gazepointy",
    "gaze_point_y",
    "gaze_position_y",
    "y_norm",
    "norm_y",
];

/// Diagnostic group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Control,
    Mci,
    Ad,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Control, Group::Mci, Group::Ad];

    /// Canonical lowercase label used in tables and directory names
    pub fn label(&self) -> &'static str {
        match self {
            Group::Control => "control",
            Group::Mci => "mci",
            Group::Ad => "ad",
        }
    }

    /// Position in [`Group::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Group::Control => 0,
            Group::Mci => 1,
            Group::Ad => 2,
        }
    }
}

impl FromStr for Group {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "control" | "controls" | "ctrl" | "hc" | "nc" | "healthy" => Ok(Group::Control),
            "mci" => Ok(Group::Mci),
            "ad" | "alzheimer" | "alzheimers" => Ok(Group::Ad),
            _ => Err(ValidationError::InvalidEnumValue {
                field: "group".to_string(),
                value: s.to_string(),
                valid_values: Group::ALL.iter().map(|g| g.label().to_string()).collect(),
            }),
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cognitive-assessment sub-task `q1..q5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u8);

impl TaskId {
    pub const COUNT: u8 = 5;

    pub fn new(index: u8) -> Result<Self, ValidationError> {
        if (1..=Self::COUNT).contains(&index) {
            Ok(Self(index))
        } else {
            Err(ValidationError::OutOfRange {
                field: "task_id".to_string(),
                value: format!("q{}", index),
                min: "q1".to_string(),
                max: format!("q{}", Self::COUNT),
            })
        }
    }

    /// All tasks in order
    pub fn all() -> impl Iterator<Item = TaskId> {
        (1..=Self::COUNT).map(TaskId)
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

impl FromStr for TaskId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let digits = lower.strip_prefix('q').unwrap_or(&lower);
        digits
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidFormat {
                field: "task_id".to_string(),
                value: s.to_string(),
                expected: "q1..q5".to_string(),
            })
            .and_then(TaskId::new)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Split a record id such as `n12q3` into subject `n12` and task `q3`
pub fn split_record_id(record_id: &str) -> Result<(String, TaskId), ValidationError> {
    let lower = record_id.to_ascii_lowercase();
    let invalid = || ValidationError::InvalidFormat {
        field: "record_id".to_string(),
        value: record_id.to_string(),
        expected: "{subject}q{1..5}".to_string(),
    };

    let q_pos = lower.rfind('q').ok_or_else(invalid)?;
    if q_pos == 0 {
        return Err(invalid());
    }
    let task: TaskId = lower[q_pos..].parse().map_err(|_| invalid())?;
    let subject = record_id[..q_pos].trim_end_matches(['_', '-']).to_string();
    if subject.is_empty() {
        return Err(invalid());
    }
    Ok((subject, task))
}

/// One recorded gaze trajectory
///
/// Immutable once loaded; owned by the pipeline run that reads it.
#[derive(Debug, Clone)]
pub struct GazeTrajectory {
    subject_id: String,
    group: Group,
    task: TaskId,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl GazeTrajectory {
    /// Build from already aligned coordinate vectors
    pub fn new(
        subject_id: impl Into<String>,
        group: Group,
        task: TaskId,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> RqaResult<Self> {
        if x.len() != y.len() {
            return Err(ValidationError::ConstraintViolation {
                fields: vec!["x".to_string(), "y".to_string()],
                message: format!("coordinate lengths differ ({} vs {})", x.len(), y.len()),
            }
            .into());
        }
        Ok(Self {
            subject_id: subject_id.into(),
            group,
            task,
            x,
            y,
        })
    }

    /// Load one trajectory file described by `file`
    pub fn load(file: &TrajectoryFile) -> RqaResult<Self> {
        let table = read_csv(&file.path)?;
        let parse_err = |line: usize, reason: String| RqaError::Parse {
            path: file.path.clone(),
            line,
            reason,
        };

        let x_col = table
            .column_any(X_COLUMN_ALIASES)
            .ok_or_else(|| parse_err(1, format!("no x coordinate column in {:?}", table.headers)))?;
        let y_col = table
            .column_any(Y_COLUMN_ALIASES)
            .ok_or_else(|| parse_err(1, format!("no y coordinate column in {:?}", table.headers)))?;

        let mut x = Vec::with_capacity(table.rows.len());
        let mut y = Vec::with_capacity(table.rows.len());
        let mut dropped = 0usize;

        for (i, row) in table.rows.iter().enumerate() {
            let xv = parse_float(&row[x_col]);
            let yv = parse_float(&row[y_col]);
            match (xv, yv) {
                (Some(a), Some(b)) if a.is_finite() && b.is_finite() => {
                    x.push(a);
                    y.push(b);
                }
                (Some(_), Some(_)) => dropped += 1,
                _ => {
                    return Err(parse_err(
                        i + 2,
                        format!("non-numeric coordinate '{}', '{}'", row[x_col], row[y_col]),
                    ))
                }
            }
        }

        if dropped > 0 {
            debug!(record = %file.record_id, dropped, "dropped non-finite samples");
        }

        Self::new(file.subject_id.clone(), file.group, file.task, x, y)
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// A discovered trajectory file with identifiers parsed from its location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryFile {
    pub path: PathBuf,
    pub group: Group,
    /// File stem, e.g. `n12q3`
    pub record_id: String,
    pub subject_id: String,
    pub task: TaskId,
}

impl TrajectoryFile {
    /// Describe `path` as a trajectory of `group`, parsing its record id
    pub fn from_path(path: &Path, group: Group) -> RqaResult<Self> {
        let record_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "path".to_string(),
                value: path.display().to_string(),
                expected: "a UTF-8 file name".to_string(),
            })?
            .to_string();
        let (subject_id, task) = split_record_id(&record_id)?;
        Ok(Self {
            path: path.to_path_buf(),
            group,
            record_id,
            subject_id,
            task,
        })
    }
}

/// Directory holding one group's trajectories
pub fn group_dir(data_root: &Path, data_version: &str, group: Group) -> PathBuf {
    data_root.join(data_version).join(group.label())
}

/// Discover trajectory files for `groups`, sorted by group then record id
///
/// Files whose names do not carry a task suffix are logged and skipped. A
/// missing group directory contributes no files.
pub fn discover_trajectories(
    data_root: &Path,
    data_version: &str,
    groups: &[Group],
) -> RqaResult<Vec<TrajectoryFile>> {
    let mut files = Vec::new();

    for &group in groups {
        let dir = group_dir(data_root, data_version, group);
        if !dir.is_dir() {
            warn!(group = %group, dir = %dir.display(), "group directory not found");
            continue;
        }

        let mut group_files = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| RqaError::io("read_dir", &dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| RqaError::io("read_dir", &dir, e))?.path();
            let is_table = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv") || e.eq_ignore_ascii_case("tsv"))
                .unwrap_or(false);
            if !path.is_file() || !is_table {
                continue;
            }
            match TrajectoryFile::from_path(&path, group) {
                Ok(file) => group_files.push(file),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unrecognized trajectory file"),
            }
        }
        group_files.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        files.extend(group_files);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_group_spellings() {
        assert_eq!("Control".parse::<Group>().unwrap(), Group::Control);
        assert_eq!("HC".parse::<Group>().unwrap(), Group::Control);
        assert_eq!(" MCI ".parse::<Group>().unwrap(), Group::Mci);
        assert_eq!("AD".parse::<Group>().unwrap(), Group::Ad);
        assert!("patient".parse::<Group>().is_err());
    }

    #[test]
    fn test_task_ids() {
        assert_eq!("q3".parse::<TaskId>().unwrap().index(), 3);
        assert_eq!("Q5".parse::<TaskId>().unwrap().to_string(), "q5");
        assert!("q6".parse::<TaskId>().is_err());
        assert!("q0".parse::<TaskId>().is_err());
        assert_eq!(TaskId::all().count(), 5);
    }

    #[test]
    fn test_split_record_id() {
        let (subject, task) = split_record_id("n12q3").unwrap();
        assert_eq!(subject, "n12");
        assert_eq!(task.to_string(), "q3");

        let (subject, _) = split_record_id("ad_04_q1").unwrap();
        assert_eq!(subject, "ad_04");

        assert!(split_record_id("q1").is_err());
        assert!(split_record_id("n12").is_err());
        assert!(split_record_id("n12q9").is_err());
    }

    #[test]
    fn test_load_with_aliased_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m1q2.csv");
        fs::write(&path, "timestamp,GazePointX,GazePointY\n0,0.1,0.2\n1,nan,0.3\n2,0.4,0.5\n").unwrap();

        let file = TrajectoryFile::from_path(&path, Group::Mci).unwrap();
        let trajectory = GazeTrajectory::load(&file).unwrap();

        assert_eq!(trajectory.subject_id(), "m1");
        assert_eq!(trajectory.task().to_string(), "q2");
        assert_eq!(trajectory.x(), &[0.1, 0.4]);
        assert_eq!(trajectory.y(), &[0.2, 0.5]);
    }

    #[test]
    fn test_load_without_coordinates_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c1q1.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let file = TrajectoryFile::from_path(&path, Group::Control).unwrap();
        assert!(matches!(GazeTrajectory::load(&file), Err(RqaError::Parse { .. })));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        let control = group_dir(dir.path(), "v1", Group::Control);
        fs::create_dir_all(&control).unwrap();
        for name in ["c2q1.csv", "c1q1.csv", "notes.txt", "readme.csv"] {
            fs::write(control.join(name), "x,y\n0,0\n").unwrap();
        }

        let files = discover_trajectories(dir.path(), "v1", &[Group::Control, Group::Ad]).unwrap();
        let ids: Vec<_> = files.iter().map(|f| f.record_id.as_str()).collect();
        assert_eq!(ids, vec!["c1q1", "c2q1"]);
    }
}
