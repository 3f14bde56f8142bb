//! Numeric gradient checking utilities for verifying analytical gradients.
//!
//! The scalar loss is `L = sum(out * upstream)`, accumulated in `f64`, so the
//! analytical gradients from backward can be compared against central finite
//! differences of `L` with respect to every feature and every coefficient.

use crate::error::TanResult;
use crate::op::DifferentiableOp;
use crate::operator::TanOperator;
use crate::precision::{Precision, Scalar};
use scirs2_core::ndarray::{Array3, ArrayView3};

/// Configuration for gradient checking
#[derive(Clone, Copy, Debug)]
pub struct GradientCheckConfig {
    /// Step for finite difference computation
    pub epsilon: f64,
    /// Relative tolerance for gradient comparison
    pub rtol: f64,
    /// Absolute tolerance for gradient comparison
    pub atol: f64,
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        Self::for_precision(Precision::F64)
    }
}

impl GradientCheckConfig {
    /// Step and tolerances suited to `precision`.
    pub fn for_precision(precision: Precision) -> Self {
        let rtol = precision.gradient_tolerance();
        match precision {
            Precision::F32 => GradientCheckConfig {
                epsilon: 1e-3,
                rtol,
                atol: 1e-3,
            },
            Precision::F64 => GradientCheckConfig {
                epsilon: 1e-6,
                rtol,
                atol: 1e-7,
            },
        }
    }

    /// Element-wise pass criterion `|a - n| <= atol + rtol * |n|`.
    pub fn accepts(&self, analytical: f64, numeric: f64) -> bool {
        (analytical - numeric).abs() <= self.atol + self.rtol * numeric.abs()
    }
}

/// Result of gradient checking for a single tensor
#[derive(Debug, Clone)]
pub struct GradientCheckResult {
    /// Name of the tensor being checked
    pub tensor_name: String,
    /// Maximum absolute difference between analytical and numeric gradients
    pub max_abs_diff: f64,
    /// Maximum relative difference
    pub max_rel_diff: f64,
    /// Whether every element passed
    pub passed: bool,
    /// Number of elements checked
    pub num_elements: usize,
}

/// Compare analytical and numeric gradients element-wise.
pub fn compare_gradients<T: Scalar>(
    analytical: ArrayView3<T>,
    numeric: &Array3<f64>,
    tensor_name: &str,
    config: &GradientCheckConfig,
) -> GradientCheckResult {
    let mut max_abs_diff: f64 = 0.0;
    let mut max_rel_diff: f64 = 0.0;
    let mut passed = analytical.shape() == numeric.shape();

    for (a, &n) in analytical.iter().zip(numeric.iter()) {
        let a = a.to_f64();
        let abs_diff = (a - n).abs();
        let rel_diff = if n.abs() > 1e-10 {
            abs_diff / n.abs()
        } else {
            abs_diff
        };

        max_abs_diff = max_abs_diff.max(abs_diff);
        max_rel_diff = max_rel_diff.max(rel_diff);
        passed &= config.accepts(a, n);
    }

    GradientCheckResult {
        tensor_name: tensor_name.to_string(),
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements: analytical.len(),
    }
}

fn weighted_loss<T: Scalar>(output: &Array3<T>, upstream: &ArrayView3<T>) -> f64 {
    output
        .iter()
        .zip(upstream.iter())
        .map(|(o, g)| o.to_f64() * g.to_f64())
        .sum()
}

/// Central differences of `L` over every element of `base`.
fn numeric_gradient<T, F>(base: &Array3<T>, epsilon: f64, mut loss: F) -> TanResult<Array3<f64>>
where
    T: Scalar,
    F: FnMut(&Array3<T>) -> TanResult<f64>,
{
    let step = T::from_f64(epsilon);
    let mut numeric = Array3::from_elem(base.raw_dim(), 0.0);
    let mut probe = base.clone();

    for (idx, &value) in base.indexed_iter() {
        let (plus, minus) = (value + step, value - step);
        probe[idx] = plus;
        let loss_plus = loss(&probe)?;
        probe[idx] = minus;
        let loss_minus = loss(&probe)?;
        probe[idx] = value;

        // Divide by the step actually representable in T.
        numeric[idx] = (loss_plus - loss_minus) / (plus.to_f64() - minus.to_f64());
    }
    Ok(numeric)
}

/// Check feature and coefficient gradients of `op` at `features`.
///
/// Returns one result per tensor, features first. The operator's pending
/// forward slot is left untouched.
pub fn check_operator_gradients<T: Scalar>(
    op: &TanOperator<T>,
    features: ArrayView3<T>,
    upstream: ArrayView3<T>,
    config: &GradientCheckConfig,
) -> TanResult<Vec<GradientCheckResult>> {
    let (_, context) = op.forward_with_context(features)?;
    let analytical = op.backward_with_context(context, upstream)?;

    let x = features.to_owned();
    let coefficients = op.coefficients().to_owned();

    let numeric_features = numeric_gradient(&x, config.epsilon, |probe| {
        let out = op.evaluate_with_coefficients(probe.view(), coefficients.view())?;
        Ok(weighted_loss(&out, &upstream))
    })?;
    let numeric_coefficients = numeric_gradient(&coefficients, config.epsilon, |probe| {
        let out = op.evaluate_with_coefficients(x.view(), probe.view())?;
        Ok(weighted_loss(&out, &upstream))
    })?;

    let results = vec![
        compare_gradients(
            analytical.features.view(),
            &numeric_features,
            "features",
            config,
        ),
        compare_gradients(
            analytical.coefficients.view(),
            &numeric_coefficients,
            "coefficients",
            config,
        ),
    ];

    for result in &results {
        tracing::debug!(
            tensor = %result.tensor_name,
            max_abs_diff = result.max_abs_diff,
            max_rel_diff = result.max_rel_diff,
            passed = result.passed,
            "gradient check"
        );
    }
    Ok(results)
}
