//! Line-length census and scalar RQA descriptors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rqa::recurrence::RecurrenceMatrix;

/// Which signal a metric set was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    X,
    Y,
    Combined,
}

impl AxisMode {
    pub const ALL: [AxisMode; 3] = [AxisMode::X, AxisMode::Y, AxisMode::Combined];

    /// Column suffix used in feature names
    pub fn suffix(&self) -> &'static str {
        match self {
            AxisMode::X => "x",
            AxisMode::Y => "y",
            AxisMode::Combined => "xy",
        }
    }
}

/// Names of the five descriptors, in column order
pub const METRIC_NAMES: [&str; 5] = ["rr", "det", "lam", "ent", "lmax"];

/// The 15 raw feature columns: every metric for x, then y, then combined
pub fn raw_feature_names() -> Vec<String> {
    AxisMode::ALL
        .iter()
        .flat_map(|mode| {
            METRIC_NAMES
                .iter()
                .map(move |metric| format!("{}_{}", metric, mode.suffix()))
        })
        .collect()
}

/// `{RR, DET, LAM, ENT, Lmax}` for one recurrence matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RqaMetricSet {
    pub rr: f64,
    pub det: f64,
    pub lam: f64,
    pub ent: f64,
    pub lmax: usize,
}

impl RqaMetricSet {
    /// Values in [`METRIC_NAMES`] order
    pub fn values(&self) -> [f64; 5] {
        [self.rr, self.det, self.lam, self.ent, self.lmax as f64]
    }
}

/// Histogram of maximal run lengths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineHistogram {
    counts: BTreeMap<usize, usize>,
}

impl LineHistogram {
    fn record(&mut self, length: usize) {
        if length > 0 {
            *self.counts.entry(length).or_insert(0) += 1;
        }
    }

    /// Number of lines of exactly `length`
    pub fn count(&self, length: usize) -> usize {
        self.counts.get(&length).copied().unwrap_or(0)
    }

    /// Recurrent points covered by lines of length `>= min_length`
    pub fn points_from(&self, min_length: usize) -> usize {
        self.counts
            .range(min_length..)
            .map(|(length, count)| length * count)
            .sum()
    }

    pub fn longest(&self) -> usize {
        self.counts.keys().next_back().copied().unwrap_or(0)
    }

    /// Shannon entropy (natural log) of the length distribution for `l >= min_length`
    pub fn entropy_from(&self, min_length: usize) -> f64 {
        let qualifying: Vec<usize> = self.counts.range(min_length..).map(|(_, &c)| c).collect();
        if qualifying.len() < 2 {
            return 0.0;
        }
        let total: usize = qualifying.iter().sum();
        qualifying
            .iter()
            .map(|&c| {
                let p = c as f64 / total as f64;
                -p * p.ln()
            })
            .sum()
    }
}

/// Diagonal lines on every off-main diagonal, both triangles
pub fn diagonal_lines(matrix: &RecurrenceMatrix) -> LineHistogram {
    let n = matrix.size();
    let mut histogram = LineHistogram::default();

    for offset in 1..n {
        let mut upper = 0;
        let mut lower = 0;
        for i in 0..(n - offset) {
            if matrix.get(i, i + offset) {
                upper += 1;
            } else {
                histogram.record(upper);
                upper = 0;
            }
            if matrix.get(i + offset, i) {
                lower += 1;
            } else {
                histogram.record(lower);
                lower = 0;
            }
        }
        histogram.record(upper);
        histogram.record(lower);
    }

    histogram
}

/// Vertical lines per column; the main-diagonal cell terminates a run
pub fn vertical_lines(matrix: &RecurrenceMatrix) -> LineHistogram {
    let n = matrix.size();
    let mut histogram = LineHistogram::default();

    for j in 0..n {
        let mut run = 0;
        for i in 0..n {
            if i != j && matrix.get(i, j) {
                run += 1;
            } else {
                histogram.record(run);
                run = 0;
            }
        }
        histogram.record(run);
    }

    histogram
}

/// Derives RQA descriptors from a recurrence matrix
#[derive(Debug, Clone, Copy)]
pub struct RqaMetricsExtractor {
    lmin: usize,
}

impl RqaMetricsExtractor {
    pub fn new(lmin: usize) -> Self {
        Self { lmin }
    }

    pub fn min_line_length(&self) -> usize {
        self.lmin
    }

    pub fn extract(&self, matrix: &RecurrenceMatrix) -> RqaMetricSet {
        let n = matrix.size();
        if n == 0 {
            return RqaMetricSet::default();
        }

        let rr = matrix.recurrent_points() as f64 / (n * n) as f64;

        let diagonal = diagonal_lines(matrix);
        let vertical = vertical_lines(matrix);

        RqaMetricSet {
            rr,
            det: ratio(diagonal.points_from(self.lmin), diagonal.points_from(1)),
            lam: ratio(vertical.points_from(self.lmin), vertical.points_from(1)),
            ent: diagonal.entropy_from(self.lmin),
            lmax: diagonal.longest(),
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn matrix_from(rows: &[&[u8]]) -> RecurrenceMatrix {
        let n = rows.len();
        let cells = Array2::from_shape_fn((n, n), |(i, j)| rows[i][j] == 1);
        RecurrenceMatrix::from_array(cells).unwrap()
    }

    #[test]
    fn test_raw_feature_names() {
        let names = raw_feature_names();
        assert_eq!(names.len(), 15);
        assert_eq!(names[0], "rr_x");
        assert_eq!(names[9], "lmax_y");
        assert_eq!(names[14], "lmax_xy");
    }

    #[test]
    fn test_all_zero_matrix() {
        let matrix = RecurrenceMatrix::from_array(Array2::from_elem((6, 6), false)).unwrap();
        let metrics = RqaMetricsExtractor::new(2).extract(&matrix);
        assert_eq!(metrics, RqaMetricSet::default());
    }

    #[test]
    fn test_identity_matrix_has_no_lines() {
        let matrix = matrix_from(&[&[1, 0, 0], &[0, 1, 0], &[0, 0, 1]]);
        let metrics = RqaMetricsExtractor::new(2).extract(&matrix);

        assert!((metrics.rr - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.det, 0.0);
        assert_eq!(metrics.lam, 0.0);
        assert_eq!(metrics.lmax, 0);
    }

    #[test]
    fn test_full_matrix() {
        let matrix = RecurrenceMatrix::from_array(Array2::from_elem((4, 4), true)).unwrap();
        let metrics = RqaMetricsExtractor::new(2).extract(&matrix);

        assert_eq!(metrics.rr, 1.0);
        assert_eq!(metrics.lmax, 3);
        // diagonals: lengths 3, 2, 1 on each side; the two isolated points fall below lmin
        assert!((metrics.det - 10.0 / 12.0).abs() < 1e-12);
        // each column splits around the diagonal cell into runs of 3, 2+1, 1+2, 3
        assert!((metrics.lam - 10.0 / 12.0).abs() < 1e-12);
        // lines >= 2: two of length 3, two of length 2
        assert!((metrics.ent - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_single_length_entropy_is_zero() {
        let matrix = matrix_from(&[
            &[1, 1, 0, 0],
            &[1, 1, 1, 0],
            &[0, 1, 1, 0],
            &[0, 0, 0, 1],
        ]);
        let metrics = RqaMetricsExtractor::new(2).extract(&matrix);

        assert_eq!(metrics.lmax, 2);
        assert_eq!(metrics.det, 1.0);
        assert_eq!(metrics.ent, 0.0);
    }

    #[test]
    fn test_histogram_counts() {
        let matrix = RecurrenceMatrix::from_array(Array2::from_elem((4, 4), true)).unwrap();
        let diagonal = diagonal_lines(&matrix);
        assert_eq!(diagonal.count(3), 2);
        assert_eq!(diagonal.count(1), 2);
        assert_eq!(diagonal.points_from(1), 12);
    }
}
