//! Sentence-embedding helpers over operator outputs.
//!
//! `mean_pool` turns a `(B, S, D_out)` output into one vector per sequence,
//! `cosine_similarity` compares two sets of such vectors pairwise.

use crate::error::{TanError, TanResult};
use crate::precision::Scalar;
use scirs2_core::ndarray::{Array2, ArrayView2, ArrayView3, Axis};

/// Masked mean over the sequence axis: `(B, S, D)` to `(B, D)`.
///
/// `mask` holds per-token weights of shape `(B, S)`, typically 0/1 attention
/// masks. A sequence whose weights sum to zero pools to the zero vector.
pub fn mean_pool<T: Scalar>(
    output: ArrayView3<T>,
    mask: Option<ArrayView2<T>>,
) -> TanResult<Array2<T>> {
    let (b, s, d) = output.dim();
    if let Some(mask) = &mask {
        if mask.dim() != (b, s) {
            return Err(TanError::shape_mismatch_with_context(
                "mean_pool",
                vec![b, s],
                mask.shape().to_vec(),
                "attention mask",
            ));
        }
    }

    let mut pooled = Array2::from_elem((b, d), T::zero());
    for (batch, (sequence, mut row)) in output
        .axis_iter(Axis(0))
        .zip(pooled.axis_iter_mut(Axis(0)))
        .enumerate()
    {
        let mut total = T::zero();
        for (pos, token) in sequence.axis_iter(Axis(0)).enumerate() {
            let weight = mask.as_ref().map_or(T::one(), |m| m[[batch, pos]]);
            if weight == T::zero() {
                continue;
            }
            total += weight;
            for (acc, &v) in row.iter_mut().zip(token.iter()) {
                *acc += weight * v;
            }
        }
        if total != T::zero() {
            row.mapv_inplace(|v| v / total);
        }
    }
    Ok(pooled)
}

/// Pairwise cosine similarity between rows of `a` `(N, D)` and `b` `(M, D)`.
///
/// Pairs involving a zero-norm row score 0.
pub fn cosine_similarity<T: Scalar>(a: ArrayView2<T>, b: ArrayView2<T>) -> TanResult<Array2<T>> {
    if a.ncols() != b.ncols() {
        return Err(TanError::shape_mismatch_with_context(
            "cosine_similarity",
            vec![b.nrows(), a.ncols()],
            b.shape().to_vec(),
            "embedding width",
        ));
    }

    let norm = |row: ArrayView2<T>, i: usize| {
        let mut sq = T::zero();
        for &v in row.row(i) {
            sq += v * v;
        }
        sq.sqrt()
    };
    let norms_a: Vec<T> = (0..a.nrows()).map(|i| norm(a, i)).collect();
    let norms_b: Vec<T> = (0..b.nrows()).map(|j| norm(b, j)).collect();

    Ok(Array2::from_shape_fn((a.nrows(), b.nrows()), |(i, j)| {
        let denom = norms_a[i] * norms_b[j];
        if denom == T::zero() {
            return T::zero();
        }
        let mut dot = T::zero();
        for (&x, &y) in a.row(i).iter().zip(b.row(j).iter()) {
            dot += x * y;
        }
        dot / denom
    }))
}
