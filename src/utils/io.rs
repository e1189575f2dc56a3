//! File helpers: atomic table writes and a small CSV reader
//!
//! Tables produced by the pipeline are plain comma-separated text with a
//! header row and no quoting (identifiers and feature names never contain
//! commas). Writes go through a temporary file in the destination directory
//! and are renamed into place, so readers never observe a half-written table.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{RqaError, RqaResult};

/// Create `dir` and all parents
pub fn ensure_dir(dir: &Path) -> RqaResult<()> {
    fs::create_dir_all(dir).map_err(|e| RqaError::io("create_dir", dir, e))
}

/// Write `contents` to `path` atomically, creating the parent directory
pub fn write_atomic(path: &Path, contents: &[u8]) -> RqaResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_dir(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| RqaError::io("create_temp", &parent, e))?;
    tmp.write_all(contents)
        .and_then(|_| tmp.flush())
        .map_err(|e| RqaError::io("write", path, e))?;
    tmp.persist(path)
        .map_err(|e| RqaError::io("rename", path, e.error))?;
    Ok(())
}

/// Format a float for table output; NaN becomes an empty cell
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value)
    }
}

/// Parse a table cell; empty cells and `nan` become NaN
pub fn parse_float(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

/// In-memory CSV table with lowercase, trimmed headers
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Index of a header (headers are stored lowercase)
    pub fn column(&self, name: &str) -> Option<usize> {
        let name = name.to_ascii_lowercase();
        self.headers.iter().position(|h| *h == name)
    }

    /// Index of the first header matching any alias
    pub fn column_any(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column(alias))
    }
}

/// Read a comma- or tab-separated file into a [`CsvTable`]
///
/// The delimiter is picked from the header line. Blank lines are skipped.
/// Rows shorter than the header are padded with empty cells.
pub fn read_csv(path: &Path) -> RqaResult<CsvTable> {
    let content = fs::read_to_string(path).map_err(|e| RqaError::io("read", path, e))?;
    let mut lines = content.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let (_, header_line) = lines.next().ok_or_else(|| RqaError::Parse {
        path: path.to_path_buf(),
        line: 1,
        reason: "file is empty".to_string(),
    })?;
    let delimiter = if header_line.contains('\t') && !header_line.contains(',') { '\t' } else { ',' };

    let headers: Vec<String> = split_line(header_line, delimiter)
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();

    let rows = lines
        .map(|(_, line)| {
            let mut cells = split_line(line, delimiter);
            cells.resize(headers.len().max(cells.len()), String::new());
            cells
        })
        .collect();

    Ok(CsvTable { headers, rows })
}

fn split_line(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}
