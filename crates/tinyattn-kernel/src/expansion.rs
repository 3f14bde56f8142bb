//! Batched Chebyshev expansion kernel.
//!
//! Maps a feature tensor of shape `(B, S, D)` to an expanded tensor of shape
//! `(B, S, D, N + 1)` whose last axis holds `T_0 .. T_N` of the corresponding
//! scalar. The output is allocated once, sized exactly, and filled row by row:
//! one row per scalar, no reduction across scalars.

use crate::basis::{chebyshev_basis_into, chebyshev_basis_with_derivative_into};
use crate::domain::DomainPolicy;
use crate::error::{TanError, TanResult};
use crate::parallel::{for_each_row, for_each_row_pair, ParallelConfig};
use crate::precision::Scalar;
use scirs2_core::ndarray::{Array4, ArrayView3};

/// Basis values together with the derivatives needed by the backward pass.
#[derive(Debug, Clone)]
pub struct FusedExpansion<T> {
    /// `T_k(u)` where `u` is the domain-mapped feature, shape `(B, S, D, N + 1)`
    pub values: Array4<T>,
    /// `dT_k(u)/dx` with the domain mapping chained in, same shape as `values`
    pub derivatives: Array4<T>,
}

impl<T> FusedExpansion<T> {
    /// Number of scalars held by both buffers together.
    pub fn retained_len(&self) -> usize {
        self.values.len() + self.derivatives.len()
    }
}

/// Expand features into the Chebyshev basis after applying `policy`.
///
/// Pass [`DomainPolicy::Passthrough`] to expand raw values unmodified.
pub fn expand<T: Scalar>(
    features: ArrayView3<T>,
    degree: usize,
    policy: DomainPolicy,
    parallel: &ParallelConfig,
) -> TanResult<Array4<T>> {
    let (b, s, d) = features.dim();
    let width = degree + 1;
    let standard = features.as_standard_layout();
    let input = standard
        .as_slice()
        .ok_or_else(|| TanError::internal("feature tensor is not contiguous"))?;

    let mut values = vec![T::zero(); input.len() * width];
    for_each_row(parallel, &mut values, width, |idx, row| {
        chebyshev_basis_into(policy.apply(input[idx]).0, row);
    });

    Array4::from_shape_vec((b, s, d, width), values).map_err(|e| TanError::internal(e.to_string()))
}

/// Expand features after applying `policy`, producing values and derivatives in one pass.
///
/// The derivative buffer already includes `d(policy)/dx`, so it is the exact
/// derivative of each basis value with respect to the raw input.
pub fn expand_fused<T: Scalar>(
    features: ArrayView3<T>,
    degree: usize,
    policy: DomainPolicy,
    parallel: &ParallelConfig,
) -> TanResult<FusedExpansion<T>> {
    let (b, s, d) = features.dim();
    let width = degree + 1;
    let standard = features.as_standard_layout();
    let input = standard
        .as_slice()
        .ok_or_else(|| TanError::internal("feature tensor is not contiguous"))?;

    let len = input.len() * width;
    let mut values = vec![T::zero(); len];
    let mut derivatives = vec![T::zero(); len];

    for_each_row_pair(
        parallel,
        &mut values,
        &mut derivatives,
        width,
        |idx, vals, ders| {
            let (u, du_dx) = policy.apply(input[idx]);
            chebyshev_basis_with_derivative_into(u, vals, ders);
            if du_dx != T::one() {
                for der in ders.iter_mut() {
                    *der = *der * du_dx;
                }
            }
        },
    );

    let shape = (b, s, d, width);
    Ok(FusedExpansion {
        values: Array4::from_shape_vec(shape, values)
            .map_err(|e| TanError::internal(e.to_string()))?,
        derivatives: Array4::from_shape_vec(shape, derivatives)
            .map_err(|e| TanError::internal(e.to_string()))?,
    })
}
