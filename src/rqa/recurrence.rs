//! Thresholded recurrence matrices over embedded trajectories

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{RqaError, RqaResult};
use crate::error_context;

/// Distance between two embedded states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Largest absolute coordinate difference; reduces to `|a - b|` for m = 1
    AbsDiff,
    /// Euclidean norm of the difference vector
    Euclidean,
}

impl DistanceMetric {
    #[inline]
    pub fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::AbsDiff => a
                .iter()
                .zip(b.iter())
                .fold(0.0_f64, |acc, (p, q)| acc.max((p - q).abs())),
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(p, q)| (p - q).powi(2))
                .sum::<f64>()
                .sqrt(),
        }
    }
}

/// Square, symmetric boolean recurrence matrix
///
/// The main diagonal is always recurrent (distance 0) and is kept so that RR
/// counts it, but line-length statistics skip it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceMatrix {
    cells: Array2<bool>,
}

impl RecurrenceMatrix {
    /// Wrap a precomputed square matrix
    pub fn from_array(cells: Array2<bool>) -> RqaResult<Self> {
        let (rows, cols) = cells.dim();
        if rows != cols {
            return Err(RqaError::EmptyEmbedding {
                rows: rows.min(cols),
                context: error_context!("recurrence", "from_array"),
            });
        }
        Ok(Self { cells })
    }

    /// Side length N
    pub fn size(&self) -> usize {
        self.cells.nrows()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.cells[[i, j]]
    }

    /// Number of recurrent cells, diagonal included
    pub fn recurrent_points(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.size();
        (0..n).all(|i| (i + 1..n).all(|j| self.cells[[i, j]] == self.cells[[j, i]]))
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.cells
    }
}

/// Builds recurrence matrices with a fixed threshold and metric
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceMatrixBuilder {
    eps: f64,
    metric: DistanceMetric,
}

impl RecurrenceMatrixBuilder {
    pub fn new(eps: f64, metric: DistanceMetric) -> Self {
        Self { eps, metric }
    }

    pub fn threshold(&self) -> f64 {
        self.eps
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// `R[i, j] = distance(i, j) <= eps`; O(N²) time and memory
    pub fn build(&self, embedded: &Array2<f64>) -> RqaResult<RecurrenceMatrix> {
        let n = embedded.nrows();
        if n < 2 {
            return Err(RqaError::EmptyEmbedding {
                rows: n,
                context: error_context!("recurrence", "build"),
            });
        }

        let mut cells = Array2::from_elem((n, n), false);
        for i in 0..n {
            cells[[i, i]] = true;
            let row_i = embedded.row(i);
            for j in (i + 1)..n {
                let recurrent = self.metric.distance(row_i, embedded.row(j)) <= self.eps;
                cells[[i, j]] = recurrent;
                cells[[j, i]] = recurrent;
            }
        }

        Ok(RecurrenceMatrix { cells })
    }
}
