//! Delay-coordinate embedding of 1D and 2D signals

use ndarray::{s, Array2};

use crate::error::{RqaError, RqaResult};
use crate::error_context;

/// Number of delay vectors produced for `samples` inputs, if any
pub fn embedded_length(samples: usize, m: usize, tau: usize) -> Option<usize> {
    let span = m.saturating_sub(1).checked_mul(tau)?;
    samples.checked_sub(span).filter(|&n| n > 0)
}

fn check_length(samples: usize, m: usize, tau: usize, operation: &str) -> RqaResult<usize> {
    if m == 0 || tau == 0 {
        return Err(RqaError::InsufficientLength {
            samples,
            m,
            tau,
            context: error_context!("embedding", operation),
        });
    }
    embedded_length(samples, m, tau).ok_or_else(|| RqaError::InsufficientLength {
        samples,
        m,
        tau,
        context: error_context!("embedding", operation),
    })
}

/// Reconstructs delay-coordinate trajectories
///
/// Row `i` of a 1D embedding is `[s[i], s[i+tau], ..., s[i+(m-1)tau]]`.
/// The joint 2D embedding concatenates, per sample, the x delay vector
/// followed by the y delay vector, so column `k < m` is x at delay `k` and
/// column `m + k` is y at delay `k`.
#[derive(Debug, Clone, Copy)]
pub struct SignalEmbedder {
    m: usize,
    tau: usize,
}

impl SignalEmbedder {
    pub fn new(m: usize, tau: usize) -> Self {
        Self { m, tau }
    }

    pub fn dimension(&self) -> usize {
        self.m
    }

    pub fn delay(&self) -> usize {
        self.tau
    }

    /// Embed a scalar signal into `[N - (m-1)tau, m]`
    pub fn embed_1d(&self, signal: &[f64]) -> RqaResult<Array2<f64>> {
        let rows = check_length(signal.len(), self.m, self.tau, "embed_1d")?;
        Ok(Array2::from_shape_fn((rows, self.m), |(i, k)| signal[i + k * self.tau]))
    }

    /// Embed two aligned signals into `[N - (m-1)tau, 2m]`
    pub fn embed_2d(&self, x: &[f64], y: &[f64]) -> RqaResult<Array2<f64>> {
        let samples = x.len().min(y.len());
        let rows = check_length(samples, self.m, self.tau, "embed_2d")?;

        let mut embedded = Array2::zeros((rows, 2 * self.m));
        embedded
            .slice_mut(s![.., ..self.m])
            .assign(&self.embed_1d(&x[..samples])?);
        embedded
            .slice_mut(s![.., self.m..])
            .assign(&self.embed_1d(&y[..samples])?);
        Ok(embedded)
    }
}
