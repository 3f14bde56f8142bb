//! Input-domain handling ahead of the basis expansion.
//!
//! The Chebyshev recurrence is accurate on `[-1, 1]`. A [`DomainPolicy`]
//! decides what happens to raw features before expansion, and returns the
//! derivative of that mapping so the gradient engine can chain through it.
//! Out-of-range inputs never fail a call; they are counted and reported.

use crate::error::{NumericalError, NumericalErrorKind, TanError, TanResult};
use crate::precision::Scalar;
use serde::{Deserialize, Serialize};

/// Mapping applied to every raw feature before expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DomainPolicy {
    /// Clamp into `[-1, 1]`; clamped elements receive zero gradient
    #[default]
    Clamp,
    /// Squash every element with `tanh`
    Tanh,
    /// Expand raw values unmodified
    Passthrough,
}

impl DomainPolicy {
    /// Map `x` into the expansion domain.
    ///
    /// Returns the mapped value and `d(mapped)/dx`.
    #[inline]
    pub fn apply<T: Scalar>(&self, x: T) -> (T, T) {
        match self {
            DomainPolicy::Clamp => {
                if is_out_of_domain(x) {
                    (x.clamp_to(-T::one(), T::one()), T::zero())
                } else {
                    (x, T::one())
                }
            }
            DomainPolicy::Tanh => {
                let t = x.tanh();
                (t, T::one() - t * t)
            }
            DomainPolicy::Passthrough => (x, T::one()),
        }
    }

    /// Whether this policy rewrites out-of-range values.
    pub fn rewrites_out_of_range(&self) -> bool {
        !matches!(self, DomainPolicy::Passthrough)
    }
}

/// True when `|x| > 1`.
#[inline]
pub fn is_out_of_domain<T: Scalar>(x: T) -> bool {
    x.abs() > T::one()
}

/// Per-call summary of how many raw inputs fell outside `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    /// Elements seen
    pub total: usize,
    /// Raw inputs with `|x| > 1`
    pub out_of_range: usize,
}

impl DomainReport {
    /// True when at least one input was outside `[-1, 1]`.
    pub fn has_warnings(&self) -> bool {
        self.out_of_range > 0
    }

    /// Fraction of inputs outside the domain.
    pub fn out_of_range_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.out_of_range as f64 / self.total as f64
        }
    }
}

/// Count out-of-range values.
pub fn scan_domain<'a, T: Scalar>(values: impl IntoIterator<Item = &'a T>) -> DomainReport {
    let mut report = DomainReport::default();
    for &value in values {
        report.total += 1;
        if is_out_of_domain(value) {
            report.out_of_range += 1;
        }
    }
    report
}

/// Reject NaN and infinite values.
pub fn validate_finite<'a, T: Scalar>(
    values: impl IntoIterator<Item = &'a T>,
    location: &str,
) -> TanResult<()> {
    for (idx, &value) in values.into_iter().enumerate() {
        if value.is_nan() {
            return Err(TanError::NumericalError(
                NumericalError::new(NumericalErrorKind::NaN, location).at_index(idx),
            ));
        }
        if !value.is_finite() {
            return Err(TanError::NumericalError(
                NumericalError::new(NumericalErrorKind::Infinity, location).at_index(idx),
            ));
        }
    }
    Ok(())
}
