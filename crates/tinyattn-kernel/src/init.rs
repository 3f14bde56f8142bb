//! Coefficient tensor initialisation.

use crate::error::{TanError, TanResult};
use crate::precision::Scalar;
use scirs2_core::ndarray::Array3;
use scirs2_core::random::{Rng, SeedableRng, StdRng};
use serde::{Deserialize, Serialize};

/// How the coefficient tensor is filled at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoefficientInit {
    /// All zeros
    Zeros,
    /// Every coefficient set to `value`
    Constant { value: f64 },
    /// Independent draws from `U(low, high)`
    Uniform { low: f64, high: f64, seed: u64 },
    /// `U(-b, b)` with `b = 1 / sqrt(fan_in)`, `fan_in = (N + 1) * P`
    Scaled { seed: u64 },
}

impl Default for CoefficientInit {
    fn default() -> Self {
        CoefficientInit::Scaled { seed: 0 }
    }
}

impl CoefficientInit {
    /// Validate the initialiser parameters.
    pub fn validate(&self) -> TanResult<()> {
        match self {
            CoefficientInit::Constant { value } if !value.is_finite() => Err(
                TanError::invalid_config(format!("constant init must be finite, got {}", value)),
            ),
            CoefficientInit::Uniform { low, high, .. } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(TanError::invalid_config(format!(
                        "uniform init bounds must be finite, got [{}, {})",
                        low, high
                    )));
                }
                if low >= high {
                    return Err(TanError::invalid_config(format!(
                        "uniform init requires low < high, got [{}, {})",
                        low, high
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Build a coefficient tensor of shape `(P, N + 1, D_out)`.
    pub fn build<T: Scalar>(&self, shape: (usize, usize, usize)) -> Array3<T> {
        match self {
            CoefficientInit::Zeros => Array3::from_elem(shape, T::zero()),
            CoefficientInit::Constant { value } => Array3::from_elem(shape, T::from_f64(*value)),
            CoefficientInit::Uniform { low, high, seed } => sample_uniform(shape, *low, *high, *seed),
            CoefficientInit::Scaled { seed } => {
                let fan_in = (shape.0 * shape.1).max(1) as f64;
                let bound = 1.0 / fan_in.sqrt();
                sample_uniform(shape, -bound, bound, *seed)
            }
        }
    }
}

fn sample_uniform<T: Scalar>(
    shape: (usize, usize, usize),
    low: f64,
    high: f64,
    seed: u64,
) -> Array3<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn(shape, |_| T::from_f64(rng.random_range(low..high)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_and_constant() {
        let zeros: Array3<f64> = CoefficientInit::Zeros.build((1, 3, 2));
        assert!(zeros.iter().all(|&v| v == 0.0));

        let ones: Array3<f32> = CoefficientInit::Constant { value: 1.0 }.build((2, 2, 2));
        assert_eq!(ones.shape(), &[2, 2, 2]);
        assert!(ones.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let init = CoefficientInit::Uniform {
            low: -0.5,
            high: 0.5,
            seed: 7,
        };
        let a: Array3<f64> = init.build((1, 5, 4));
        let b: Array3<f64> = init.build((1, 5, 4));
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| (-0.5..0.5).contains(&v)));
    }

    #[test]
    fn test_scaled_bound() {
        let coeffs: Array3<f64> = CoefficientInit::Scaled { seed: 3 }.build((2, 8, 3));
        let bound = 1.0 / 16f64.sqrt();
        assert!(coeffs.iter().all(|&v| v.abs() <= bound));
    }

    #[test]
    fn test_validate() {
        assert!(CoefficientInit::default().validate().is_ok());
        assert!(CoefficientInit::Uniform {
            low: 1.0,
            high: 1.0,
            seed: 0
        }
        .validate()
        .is_err());
        assert!(CoefficientInit::Constant { value: f64::NAN }
            .validate()
            .is_err());
    }
}
