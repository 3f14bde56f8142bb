//! Coefficient contraction: the polynomial analogue of attention value mixing.
//!
//! Each token's expanded features `(D, N + 1)` are contracted against the
//! learned coefficient tensor into `D_out` output channels. The reduction over
//! the hidden axis is fixed by [`ContractionMode`] at construction time:
//!
//! ```text
//! Pooled:        out[b,s,o] = (1/D) * sum_d sum_k E[b,s,d,k] * C[0,k,o]
//! PerDimension:  out[b,s,o] =         sum_d sum_k E[b,s,d,k] * C[d,k,o]
//! ```
//!
//! Coefficients are stored as `(P, N + 1, D_out)` with `P = 1` for pooled and
//! `P = D` for per-dimension mixing.

use crate::error::{TanError, TanResult};
use crate::parallel::{for_each_row, ParallelConfig};
use crate::precision::Scalar;
use scirs2_core::ndarray::{Array3, ArrayView3, ArrayView4};
use serde::{Deserialize, Serialize};

/// Reduction convention over the hidden dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContractionMode {
    /// One shared `(N + 1, D_out)` block, averaged over the hidden dimension
    #[default]
    Pooled,
    /// One `(N + 1, D_out)` block per hidden dimension, summed
    PerDimension,
}

impl ContractionMode {
    /// Number of coefficient blocks `P`.
    pub fn coefficient_blocks(&self, input_dim: usize) -> usize {
        match self {
            ContractionMode::Pooled => 1,
            ContractionMode::PerDimension => input_dim,
        }
    }

    /// Coefficient tensor shape `(P, N + 1, D_out)`.
    pub fn coefficient_shape(
        &self,
        degree: usize,
        input_dim: usize,
        output_dim: usize,
    ) -> (usize, usize, usize) {
        (self.coefficient_blocks(input_dim), degree + 1, output_dim)
    }

    /// Factor applied after the hidden-axis reduction.
    pub fn scale<T: Scalar>(&self, input_dim: usize) -> T {
        match self {
            ContractionMode::Pooled if input_dim > 0 => T::one() / T::from_f64(input_dim as f64),
            _ => T::one(),
        }
    }

    /// Coefficient block used by hidden dimension `d`.
    #[inline]
    pub fn block_of(&self, d: usize) -> usize {
        match self {
            ContractionMode::Pooled => 0,
            ContractionMode::PerDimension => d,
        }
    }
}

/// Check that `coefficients` fits `(D, N + 1)` expansions under `mode`.
pub(crate) fn check_coefficients<T>(
    operation: &str,
    coefficients: &ArrayView3<T>,
    mode: ContractionMode,
    input_dim: usize,
    width: usize,
) -> TanResult<()> {
    let (p, k, _) = coefficients.dim();
    let expected_p = mode.coefficient_blocks(input_dim);
    if p != expected_p || k != width {
        return Err(TanError::shape_mismatch_with_context(
            operation,
            vec![expected_p, width, coefficients.dim().2],
            coefficients.shape().to_vec(),
            "coefficient tensor",
        ));
    }
    Ok(())
}

/// Contract an expanded tensor `(B, S, D, N + 1)` into `(B, S, D_out)`.
pub fn contract<T: Scalar>(
    expanded: ArrayView4<T>,
    coefficients: ArrayView3<T>,
    mode: ContractionMode,
    parallel: &ParallelConfig,
) -> TanResult<Array3<T>> {
    let (b, s, d, width) = expanded.dim();
    check_coefficients("contract", &coefficients, mode, d, width)?;
    let out_dim = coefficients.dim().2;

    let e_std = expanded.as_standard_layout();
    let c_std = coefficients.as_standard_layout();
    let e = e_std
        .as_slice()
        .ok_or_else(|| TanError::internal("expanded tensor is not contiguous"))?;
    let c = c_std
        .as_slice()
        .ok_or_else(|| TanError::internal("coefficient tensor is not contiguous"))?;

    let token_len = d * width;
    let scale: T = mode.scale(d);
    let mut out = vec![T::zero(); b * s * out_dim];

    for_each_row(parallel, &mut out, out_dim, |token, row| {
        let tok = &e[token * token_len..(token + 1) * token_len];
        for dim in 0..d {
            let block = mode.block_of(dim) * width * out_dim;
            for k in 0..width {
                let v = tok[dim * width + k];
                let c_row = &c[block + k * out_dim..block + (k + 1) * out_dim];
                for (acc, &coef) in row.iter_mut().zip(c_row) {
                    *acc += v * coef;
                }
            }
        }
        if scale != T::one() {
            for acc in row.iter_mut() {
                *acc = *acc * scale;
            }
        }
    });

    Array3::from_shape_vec((b, s, out_dim), out).map_err(|e| TanError::internal(e.to_string()))
}
