//! Closed-form gradients of the contraction.
//!
//! With `g = dL/d out` of shape `(B, S, D_out)`, scale `a` and block map `p(d)`
//! from the [`ContractionMode`]:
//!
//! ```text
//! dL/dC[p,k,o] = a * sum_{b,s} sum_{d: p(d)=p} T_k(x[b,s,d]) * g[b,s,o]
//! dL/dx[b,s,d] = a * sum_k T_k'(x[b,s,d]) * sum_o C[p(d),k,o] * g[b,s,o]
//! ```
//!
//! `T_k'` comes from the fused expansion pass and already carries the
//! derivative of the domain mapping. Every output element is accumulated by a
//! single loop in a fixed order, so results do not depend on scheduling.

use crate::contraction::{check_coefficients, ContractionMode};
use crate::error::{TanError, TanResult};
use crate::parallel::{for_each_row, ParallelConfig};
use crate::precision::Scalar;
use scirs2_core::ndarray::{Array3, ArrayView3, ArrayView4};

fn check_upstream<T>(
    operation: &str,
    upstream: &ArrayView3<T>,
    batch: usize,
    seq: usize,
    out_dim: usize,
) -> TanResult<()> {
    if upstream.dim() != (batch, seq, out_dim) {
        return Err(TanError::shape_mismatch_with_context(
            operation,
            vec![batch, seq, out_dim],
            upstream.shape().to_vec(),
            "upstream gradient",
        ));
    }
    Ok(())
}

/// Gradient with respect to the coefficient tensor, shape `(P, N + 1, D_out)`.
pub fn coefficient_gradient<T: Scalar>(
    expanded: ArrayView4<T>,
    upstream: ArrayView3<T>,
    mode: ContractionMode,
    parallel: &ParallelConfig,
) -> TanResult<Array3<T>> {
    let (b, s, d, width) = expanded.dim();
    let out_dim = upstream.dim().2;
    check_upstream("coefficient_gradient", &upstream, b, s, out_dim)?;

    let e_std = expanded.as_standard_layout();
    let g_std = upstream.as_standard_layout();
    let e = e_std
        .as_slice()
        .ok_or_else(|| TanError::internal("expanded tensor is not contiguous"))?;
    let g = g_std
        .as_slice()
        .ok_or_else(|| TanError::internal("upstream gradient is not contiguous"))?;

    let blocks = mode.coefficient_blocks(d);
    let tokens = b * s;
    let token_len = d * width;
    let scale: T = mode.scale(d);
    let mut grad = vec![T::zero(); blocks * width * out_dim];

    // One row per (block, k); tokens are reduced sequentially inside the row.
    for_each_row(parallel, &mut grad, out_dim, |row_idx, row| {
        let block = row_idx / width;
        let k = row_idx % width;
        let dims = match mode {
            ContractionMode::Pooled => 0..d,
            ContractionMode::PerDimension => block..block + 1,
        };
        for token in 0..tokens {
            let tok = &e[token * token_len..(token + 1) * token_len];
            let mut basis_sum = T::zero();
            for dim in dims.clone() {
                basis_sum += tok[dim * width + k];
            }
            let g_row = &g[token * out_dim..(token + 1) * out_dim];
            for (acc, &g_o) in row.iter_mut().zip(g_row) {
                *acc += basis_sum * g_o;
            }
        }
        if scale != T::one() {
            for acc in row.iter_mut() {
                *acc = *acc * scale;
            }
        }
    });

    Array3::from_shape_vec((blocks, width, out_dim), grad)
        .map_err(|e| TanError::internal(e.to_string()))
}

/// Gradient with respect to the raw features, shape `(B, S, D)`.
pub fn feature_gradient<T: Scalar>(
    derivatives: ArrayView4<T>,
    coefficients: ArrayView3<T>,
    upstream: ArrayView3<T>,
    mode: ContractionMode,
    parallel: &ParallelConfig,
) -> TanResult<Array3<T>> {
    let (b, s, d, width) = derivatives.dim();
    check_coefficients("feature_gradient", &coefficients, mode, d, width)?;
    let out_dim = coefficients.dim().2;
    check_upstream("feature_gradient", &upstream, b, s, out_dim)?;

    let der_std = derivatives.as_standard_layout();
    let c_std = coefficients.as_standard_layout();
    let g_std = upstream.as_standard_layout();
    let der = der_std
        .as_slice()
        .ok_or_else(|| TanError::internal("derivative tensor is not contiguous"))?;
    let c = c_std
        .as_slice()
        .ok_or_else(|| TanError::internal("coefficient tensor is not contiguous"))?;
    let g = g_std
        .as_slice()
        .ok_or_else(|| TanError::internal("upstream gradient is not contiguous"))?;

    let token_len = d * width;
    let scale: T = mode.scale(d);
    let mut grad = vec![T::zero(); b * s * d];

    for_each_row(parallel, &mut grad, d, |token, row| {
        let tok = &der[token * token_len..(token + 1) * token_len];
        let g_row = &g[token * out_dim..(token + 1) * out_dim];
        for (dim, acc) in row.iter_mut().enumerate() {
            let block = mode.block_of(dim) * width * out_dim;
            let mut total = T::zero();
            for k in 0..width {
                let dt = tok[dim * width + k];
                if dt == T::zero() {
                    continue;
                }
                let c_row = &c[block + k * out_dim..block + (k + 1) * out_dim];
                let mut mixed = T::zero();
                for (&coef, &g_o) in c_row.iter().zip(g_row) {
                    mixed += coef * g_o;
                }
                total += dt * mixed;
            }
            *acc = total * scale;
        }
    });

    Array3::from_shape_vec((b, s, d), grad).map_err(|e| TanError::internal(e.to_string()))
}
