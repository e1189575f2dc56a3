//! Parameter combinations, signatures and grid expansion

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::constants::params::*;
use crate::utils::validation::{
    validate_half_open_range, validate_positive, validate_range, ValidationError, ValidationResult,
};

/// One `(m, tau, eps, lmin)` point of the analysis grid
///
/// Two combinations with the same [`signature`](Self::signature) are treated
/// as identical; equality and hashing go through the signature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParameterCombination {
    /// Embedding dimension
    pub m: usize,
    /// Time delay in samples
    pub tau: usize,
    /// Recurrence threshold
    pub eps: f64,
    /// Minimum line length for DET/LAM/ENT
    pub lmin: usize,
}

impl ParameterCombination {
    /// Build a validated combination
    pub fn new(m: usize, tau: usize, eps: f64, lmin: usize) -> ValidationResult<Self> {
        let params = Self { m, tau, eps, lmin };
        params.validate()?;
        Ok(params)
    }

    /// Check all range invariants
    pub fn validate(&self) -> ValidationResult<()> {
        validate_range("m", self.m, MIN_EMBEDDING_DIMENSION, MAX_EMBEDDING_DIMENSION)?;
        validate_range("tau", self.tau, MIN_TIME_DELAY, MAX_TIME_DELAY)?;
        validate_half_open_range("eps", self.eps, MIN_EPSILON_EXCLUSIVE, MAX_EPSILON)?;
        // the signature has to parse back, so eps may not round to zero in it
        let rendered = format!("{:.prec$}", self.eps, prec = SIGNATURE_EPS_PRECISION);
        if rendered.parse::<f64>().map_or(true, |v| v <= MIN_EPSILON_EXCLUSIVE) {
            return Err(ValidationError::InvalidFormat {
                field: "eps".to_string(),
                value: self.eps.to_string(),
                expected: format!("a value that is non-zero at {} decimals", SIGNATURE_EPS_PRECISION),
            });
        }
        validate_range("lmin", self.lmin, MIN_LINE_LENGTH, MAX_LINE_LENGTH)?;
        Ok(())
    }

    /// Canonical key, e.g. `m2_tau1_eps0.050_lmin2`
    pub fn signature(&self) -> String {
        format!(
            "m{}_tau{}_eps{:.prec$}_lmin{}",
            self.m,
            self.tau,
            self.eps,
            self.lmin,
            prec = SIGNATURE_EPS_PRECISION
        )
    }

    /// Parse a signature back into a validated combination
    pub fn from_signature(signature: &str) -> ValidationResult<Self> {
        let invalid = || ValidationError::InvalidFormat {
            field: "signature".to_string(),
            value: signature.to_string(),
            expected: "m{m}_tau{tau}_eps{eps}_lmin{lmin}".to_string(),
        };

        let parts: Vec<&str> = signature.split('_').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        let field = |part: &str, prefix: &str| part.strip_prefix(prefix).map(str::to_string);

        let m = field(parts[0], "m").and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let tau = field(parts[1], "tau").and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let eps = field(parts[2], "eps").and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let lmin = field(parts[3], "lmin").and_then(|v| v.parse().ok()).ok_or_else(invalid)?;

        Self::new(m, tau, eps, lmin)
    }
}

impl Default for ParameterCombination {
    fn default() -> Self {
        Self {
            m: DEFAULT_EMBEDDING_DIMENSION,
            tau: DEFAULT_TIME_DELAY,
            eps: DEFAULT_EPSILON,
            lmin: DEFAULT_LINE_LENGTH,
        }
    }
}

impl PartialEq for ParameterCombination {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature()
    }
}

impl Eq for ParameterCombination {}

impl Hash for ParameterCombination {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature().hash(state);
    }
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// Inclusive `start..=end` range with a positive step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec<T> {
    pub start: T,
    pub end: T,
    pub step: T,
}

impl<T: Copy> RangeSpec<T> {
    pub fn new(start: T, end: T, step: T) -> Self {
        Self { start, end, step }
    }

    /// Range holding one value
    pub fn single(value: T, step: T) -> Self {
        Self { start: value, end: value, step }
    }
}

impl RangeSpec<usize> {
    /// Expand into concrete values
    pub fn values(&self, field: &str) -> ValidationResult<Vec<usize>> {
        if self.step == 0 {
            return Err(ValidationError::InvalidFormat {
                field: format!("{}.step", field),
                value: "0".to_string(),
                expected: "a step > 0".to_string(),
            });
        }
        check_order(field, self.start as f64, self.end as f64)?;
        Ok((self.start..=self.end).step_by(self.step).collect())
    }
}

impl RangeSpec<f64> {
    /// Expand into concrete values, generated by index to avoid drift
    pub fn values(&self, field: &str) -> ValidationResult<Vec<f64>> {
        validate_positive(&format!("{}.step", field), self.step)?;
        check_order(field, self.start, self.end)?;

        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        Ok((0..count)
            .map(|i| {
                let value = self.start + i as f64 * self.step;
                (value * 1e9).round() / 1e9
            })
            .collect())
    }
}

fn check_order(field: &str, start: f64, end: f64) -> ValidationResult<()> {
    if !start.is_finite() || !end.is_finite() || start > end {
        return Err(ValidationError::ConstraintViolation {
            fields: vec![format!("{}.start", field), format!("{}.end", field)],
            message: format!("start ({}) must not exceed end ({})", start, end),
        });
    }
    Ok(())
}

/// Range specification for all four parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub m_range: RangeSpec<usize>,
    pub tau_range: RangeSpec<usize>,
    pub eps_range: RangeSpec<f64>,
    pub lmin_range: RangeSpec<usize>,
}

/// Outcome of grid expansion
#[derive(Debug, Clone, Default)]
pub struct GridExpansion {
    /// Valid, de-duplicated combinations in expansion order
    pub combinations: Vec<ParameterCombination>,
    /// Points that failed validation, with the reason
    pub rejected: Vec<(String, ValidationError)>,
}

impl ParameterGrid {
    /// Cartesian product of the four ranges, validated point by point
    ///
    /// Malformed range specs fail the whole expansion; individual points that
    /// violate the parameter invariants are returned in `rejected`.
    pub fn expand(&self) -> ValidationResult<GridExpansion> {
        let ms = self.m_range.values("m_range")?;
        let taus = self.tau_range.values("tau_range")?;
        let epss = self.eps_range.values("eps_range")?;
        let lmins = self.lmin_range.values("lmin_range")?;

        let mut expansion = GridExpansion::default();
        let mut seen = HashSet::new();

        for &m in &ms {
            for &tau in &taus {
                for &eps in &epss {
                    for &lmin in &lmins {
                        let candidate = ParameterCombination { m, tau, eps, lmin };
                        match candidate.validate() {
                            Ok(()) => {
                                if seen.insert(candidate.signature()) {
                                    expansion.combinations.push(candidate);
                                }
                            }
                            Err(e) => expansion.rejected.push((candidate.signature(), e)),
                        }
                    }
                }
            }
        }

        Ok(expansion)
    }
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            m_range: RangeSpec::new(2, 4, 1),
            tau_range: RangeSpec::new(1, 3, 1),
            eps_range: RangeSpec::new(0.02, 0.08, 0.02),
            lmin_range: RangeSpec::single(DEFAULT_LINE_LENGTH, 1),
        }
    }
}
