//! Chebyshev polynomial basis generator.
//!
//! Values come from the three-term recurrence
//!
//! ```text
//! T_0(x) = 1
//! T_1(x) = x
//! T_k(x) = 2x * T_{k-1}(x) - T_{k-2}(x)
//! ```
//!
//! and derivatives from its differentiated form
//!
//! ```text
//! T_0'(x) = 0
//! T_1'(x) = 1
//! T_k'(x) = 2 * T_{k-1}(x) + 2x * T_{k-1}'(x) - T_{k-2}'(x)
//! ```
//!
//! The recurrence is only well conditioned on `[-1, 1]`. Nothing here clamps;
//! out-of-range inputs are evaluated as-is and callers apply a
//! [`DomainPolicy`](crate::domain::DomainPolicy) upstream.

use crate::precision::Scalar;

/// Evaluate `[T_0(x), ..., T_degree(x)]`.
///
/// `degree = 0` yields `[1]`, `degree = 1` yields `[1, x]`.
pub fn chebyshev_basis<T: Scalar>(x: T, degree: usize) -> Vec<T> {
    let mut values = vec![T::zero(); degree + 1];
    chebyshev_basis_into(x, &mut values);
    values
}

/// Fill `values` with `T_0(x) .. T_{len-1}(x)`.
#[inline]
pub fn chebyshev_basis_into<T: Scalar>(x: T, values: &mut [T]) {
    let n = values.len();
    if n == 0 {
        return;
    }
    values[0] = T::one();
    if n == 1 {
        return;
    }
    values[1] = x;

    let two_x = x + x;
    for k in 2..n {
        values[k] = two_x * values[k - 1] - values[k - 2];
    }
}

/// Fill `values` with `T_k(x)` and `derivs` with `T_k'(x)` in one fused pass.
///
/// Both slices must have the same length.
#[inline]
pub fn chebyshev_basis_with_derivative_into<T: Scalar>(x: T, values: &mut [T], derivs: &mut [T]) {
    debug_assert_eq!(values.len(), derivs.len());
    let n = values.len().min(derivs.len());
    if n == 0 {
        return;
    }
    values[0] = T::one();
    derivs[0] = T::zero();
    if n == 1 {
        return;
    }
    values[1] = x;
    derivs[1] = T::one();

    let two_x = x + x;
    for k in 2..n {
        values[k] = two_x * values[k - 1] - values[k - 2];
        derivs[k] = values[k - 1] + values[k - 1] + two_x * derivs[k - 1] - derivs[k - 2];
    }
}

/// Evaluate `sum(c_k * T_k(x))` with the Clenshaw recurrence.
pub fn evaluate_series<T: Scalar>(coeffs: &[T], x: T) -> T {
    let n = coeffs.len();
    if n == 0 {
        return T::zero();
    }
    if n == 1 {
        return coeffs[0];
    }

    let mut b_k1 = T::zero(); // b_{k+1}
    let mut b_k2 = T::zero(); // b_{k+2}
    let two_x = x + x;

    for k in (1..n).rev() {
        let b_k = two_x * b_k1 - b_k2 + coeffs[k];
        b_k2 = b_k1;
        b_k1 = b_k;
    }

    x * b_k1 - b_k2 + coeffs[0]
}

/// Evaluate `sum(c_k * T_k'(x))` with the forward derivative recurrence.
pub fn evaluate_series_derivative<T: Scalar>(coeffs: &[T], x: T) -> T {
    let n = coeffs.len();
    if n <= 1 {
        return T::zero();
    }

    let two_x = x + x;
    let mut t_prev2 = T::one();
    let mut dt_prev2 = T::zero();
    let mut t_prev1 = x;
    let mut dt_prev1 = T::one();

    let mut result = coeffs[1];

    for &c_k in &coeffs[2..n] {
        let t_k = two_x * t_prev1 - t_prev2;
        let dt_k = t_prev1 + t_prev1 + two_x * dt_prev1 - dt_prev2;

        result += c_k * dt_k;

        t_prev2 = t_prev1;
        t_prev1 = t_k;
        dt_prev2 = dt_prev1;
        dt_prev1 = dt_k;
    }

    result
}
