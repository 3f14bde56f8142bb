//! The Chebyshev attention operator.
//!
//! [`TanOperator`] owns the coefficient tensor and wires the expansion,
//! contraction and gradient kernels into a differentiable layer. Two calling
//! conventions are offered:
//!
//! - explicit: [`DifferentiableOp::forward_with_context`] hands back a
//!   [`ForwardContext`] that the caller moves into
//!   [`DifferentiableOp::backward_with_context`];
//! - implicit: [`TanOperator::forward`] keeps a single pending context that the
//!   next [`TanOperator::backward`] consumes. A new forward replaces a pending
//!   context that was never differentiated.
//!
//! The context retains the fused basis values and derivatives, so a backward
//! never re-expands the input.

use crate::config::TanConfig;
use crate::contraction::contract;
use crate::domain::{scan_domain, validate_finite, DomainReport};
use crate::error::{TanError, TanResult};
use crate::expansion::{expand, expand_fused, FusedExpansion};
use crate::gradient::{coefficient_gradient, feature_gradient};
use crate::op::DifferentiableOp;
use crate::precision::Scalar;
use crate::telemetry::{OperatorTelemetry, TelemetrySnapshot};
use scirs2_core::ndarray::{Array2, Array3, ArrayView3, ArrayViewMut3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Parameter-map key of the coefficient tensor.
pub const COEFFICIENTS_KEY: &str = "coefficients";

static NEXT_OPERATOR_ID: AtomicU64 = AtomicU64::new(1);

/// State retained by a forward call for its backward.
///
/// Not `Clone`: a context is moved into backward and cannot be replayed.
#[derive(Debug)]
pub struct ForwardContext<T> {
    operator_id: u64,
    degree: usize,
    coefficient_version: u64,
    output_shape: (usize, usize, usize),
    expansion: FusedExpansion<T>,
    domain: DomainReport,
}

impl<T> ForwardContext<T> {
    /// Id of the operator that produced this context
    pub fn operator_id(&self) -> u64 {
        self.operator_id
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Shape of the output, and of the upstream gradient backward expects
    pub fn output_shape(&self) -> (usize, usize, usize) {
        self.output_shape
    }

    /// Out-of-range summary of the forward input
    pub fn domain_report(&self) -> DomainReport {
        self.domain
    }

    /// Scalars held for backward
    pub fn retained_len(&self) -> usize {
        self.expansion.retained_len()
    }
}

/// Gradients produced by a backward call.
#[derive(Debug, Clone)]
pub struct TanGradients<T> {
    /// `dL/dx`, same shape as the forward input
    pub features: Array3<T>,
    /// `dL/dC`, same shape as the coefficient tensor
    pub coefficients: Array3<T>,
}

impl<T: Scalar> TanGradients<T> {
    /// Coefficient gradient keyed like [`TanOperator::parameters`].
    pub fn to_parameter_map(&self) -> HashMap<String, Array2<f64>> {
        let mut map = HashMap::new();
        map.insert(
            COEFFICIENTS_KEY.to_string(),
            flatten_coefficients(&self.coefficients.view()),
        );
        map
    }
}

fn flatten_coefficients<T: Scalar>(coefficients: &ArrayView3<T>) -> Array2<f64> {
    let (p, k, o) = coefficients.dim();
    Array2::from_shape_fn((p * k, o), |(row, col)| {
        coefficients[[row / k, row % k, col]].to_f64()
    })
}

/// Chebyshev polynomial attention operator over `(B, S, D)` features.
#[derive(Debug)]
pub struct TanOperator<T: Scalar> {
    id: u64,
    config: TanConfig,
    coefficients: Array3<T>,
    coefficient_version: u64,
    pending: Option<ForwardContext<T>>,
    telemetry: OperatorTelemetry,
}

impl<T: Scalar> TanOperator<T> {
    /// Build an operator from a validated configuration.
    ///
    /// Fails with `PrecisionMismatch` when `T` does not match `config.precision`.
    pub fn new(config: TanConfig) -> TanResult<Self> {
        config.validate()?;
        if config.precision != T::precision() {
            return Err(TanError::PrecisionMismatch {
                expected: config.precision,
                actual: T::precision(),
            });
        }

        let coefficients = config.init.build::<T>(config.coefficient_shape());
        let id = NEXT_OPERATOR_ID.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            operator = id,
            degree = config.degree,
            input_dim = config.input_dim,
            output_dim = config.output_dim,
            precision = %config.precision,
            "Chebyshev operator created"
        );

        Ok(Self {
            id,
            config,
            coefficients,
            coefficient_version: 0,
            pending: None,
            telemetry: OperatorTelemetry::new(),
        })
    }

    /// Build an operator with default policies at the precision of `T`.
    pub fn with_dims(degree: usize, input_dim: usize, output_dim: usize) -> TanResult<Self> {
        Self::new(TanConfig::new(degree, input_dim, output_dim).with_precision(T::precision()))
    }

    /// Unique id of this operator instance
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &TanConfig {
        &self.config
    }

    pub fn degree(&self) -> usize {
        self.config.degree
    }

    /// The coefficient tensor, shape `(P, N + 1, D_out)`
    pub fn coefficients(&self) -> ArrayView3<'_, T> {
        self.coefficients.view()
    }

    /// Mutable access to the coefficients, e.g. for an optimizer step.
    ///
    /// Invalidates any forward context produced before the call.
    pub fn coefficients_mut(&mut self) -> ArrayViewMut3<'_, T> {
        self.coefficient_version += 1;
        self.coefficients.view_mut()
    }

    /// Replace the coefficient tensor.
    pub fn set_coefficients(&mut self, coefficients: Array3<T>) -> TanResult<()> {
        let expected = self.config.coefficient_shape();
        if coefficients.dim() != expected {
            return Err(TanError::shape_mismatch_with_context(
                "set_coefficients",
                vec![expected.0, expected.1, expected.2],
                coefficients.shape().to_vec(),
                "coefficient tensor",
            ));
        }
        validate_finite(coefficients.iter(), "coefficients")?;
        self.coefficients = coefficients;
        self.coefficient_version += 1;
        Ok(())
    }

    /// Coefficients as an `f64` parameter map, reshaped to `(P * (N + 1), D_out)`.
    pub fn parameters(&self) -> HashMap<String, Array2<f64>> {
        let mut map = HashMap::new();
        map.insert(
            COEFFICIENTS_KEY.to_string(),
            flatten_coefficients(&self.coefficients.view()),
        );
        map
    }

    /// Load coefficients from a map produced by [`Self::parameters`].
    pub fn load_parameters(&mut self, parameters: &HashMap<String, Array2<f64>>) -> TanResult<()> {
        let flat = parameters.get(COEFFICIENTS_KEY).ok_or_else(|| {
            TanError::invalid_config(format!("missing parameter '{}'", COEFFICIENTS_KEY))
        })?;
        let (p, k, o) = self.config.coefficient_shape();
        if flat.dim() != (p * k, o) {
            return Err(TanError::shape_mismatch_with_context(
                "load_parameters",
                vec![p * k, o],
                flat.shape().to_vec(),
                COEFFICIENTS_KEY,
            ));
        }
        validate_finite(flat.iter(), COEFFICIENTS_KEY)?;
        self.coefficients = Array3::from_shape_fn((p, k, o), |(block, deg, col)| {
            T::from_f64(flat[[block * k + deg, col]])
        });
        self.coefficient_version += 1;
        Ok(())
    }

    /// Forward pass; the context is kept for the next [`Self::backward`].
    pub fn forward(&mut self, features: ArrayView3<T>) -> TanResult<Array3<T>> {
        let (output, context) = self.forward_with_context(features)?;
        if self.pending.replace(context).is_some() {
            self.telemetry.record_stale_context();
            tracing::debug!(operator = self.id, "discarded pending forward context");
        }
        Ok(output)
    }

    /// Backward pass for the pending forward.
    ///
    /// Fails with `InvalidState` when no forward is pending, including a second
    /// backward after the same forward. An upstream gradient with the wrong
    /// shape or a non-finite value leaves the pending context in place.
    pub fn backward(&mut self, grad_output: ArrayView3<T>) -> TanResult<TanGradients<T>> {
        let expected = match &self.pending {
            Some(context) => context.output_shape,
            None => {
                return Err(TanError::invalid_state(
                    "backward called without a pending forward",
                ))
            }
        };
        check_upstream_shape(&grad_output, expected)?;
        validate_finite(grad_output.iter(), "upstream gradient")?;
        let context = self
            .pending
            .take()
            .ok_or_else(|| TanError::internal("pending context vanished"))?;
        self.backward_with_context(context, grad_output)
    }

    /// True when a forward is waiting for its backward.
    pub fn has_pending_backward(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending context, if any.
    pub fn discard_pending(&mut self) -> Option<ForwardContext<T>> {
        self.pending.take()
    }

    /// Inference-only forward that retains nothing for backward.
    pub fn evaluate(&self, features: ArrayView3<T>) -> TanResult<Array3<T>> {
        let report = self.check_features(&features)?;
        let output = self.evaluate_with_coefficients(features, self.coefficients.view())?;
        self.telemetry
            .record_forward(&report, self.config.domain.rewrites_out_of_range());
        Ok(output)
    }

    /// Evaluate with caller-supplied coefficients; inputs must already be checked.
    pub(crate) fn evaluate_with_coefficients(
        &self,
        features: ArrayView3<T>,
        coefficients: ArrayView3<T>,
    ) -> TanResult<Array3<T>> {
        let expanded = expand(
            features,
            self.config.degree,
            self.config.domain,
            &self.config.parallel,
        )?;
        contract(
            expanded.view(),
            coefficients,
            self.config.contraction,
            &self.config.parallel,
        )
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    pub fn reset_telemetry(&self) {
        self.telemetry.reset();
    }

    fn check_features(&self, features: &ArrayView3<T>) -> TanResult<DomainReport> {
        let (b, s, d) = features.dim();
        if d != self.config.input_dim {
            return Err(TanError::shape_mismatch_with_context(
                "forward",
                vec![b, s, self.config.input_dim],
                features.shape().to_vec(),
                "feature tensor (batch, seq, hidden)",
            ));
        }
        validate_finite(features.iter(), "forward features")?;

        let report = scan_domain(features.iter());
        if report.has_warnings() {
            tracing::warn!(
                operator = self.id,
                out_of_range = report.out_of_range,
                total = report.total,
                policy = ?self.config.domain,
                "inputs outside [-1, 1]"
            );
        }
        Ok(report)
    }
}

fn check_upstream_shape<T>(
    grad_output: &ArrayView3<T>,
    expected: (usize, usize, usize),
) -> TanResult<()> {
    if grad_output.dim() != expected {
        return Err(TanError::shape_mismatch_with_context(
            "backward",
            vec![expected.0, expected.1, expected.2],
            grad_output.shape().to_vec(),
            "upstream gradient",
        ));
    }
    Ok(())
}

impl<T: Scalar> DifferentiableOp for TanOperator<T> {
    type Input<'a>
        = ArrayView3<'a, T>
    where
        Self: 'a;
    type Output = Array3<T>;
    type Context = ForwardContext<T>;
    type Gradients = TanGradients<T>;

    fn name(&self) -> &str {
        "chebyshev_attention"
    }

    fn num_parameters(&self) -> usize {
        self.coefficients.len()
    }

    fn forward_with_context(
        &self,
        features: ArrayView3<'_, T>,
    ) -> TanResult<(Array3<T>, ForwardContext<T>)> {
        let report = self.check_features(&features)?;
        let input_shape = features.dim();

        let expansion = expand_fused(
            features,
            self.config.degree,
            self.config.domain,
            &self.config.parallel,
        )?;
        let output = contract(
            expansion.values.view(),
            self.coefficients.view(),
            self.config.contraction,
            &self.config.parallel,
        )?;

        self.telemetry
            .record_forward(&report, self.config.domain.rewrites_out_of_range());
        tracing::trace!(
            operator = self.id,
            batch = input_shape.0,
            seq = input_shape.1,
            retained_bytes = expansion.retained_len() * T::precision().size_bytes(),
            "forward"
        );

        let context = ForwardContext {
            operator_id: self.id,
            degree: self.config.degree,
            coefficient_version: self.coefficient_version,
            output_shape: output.dim(),
            expansion,
            domain: report,
        };
        Ok((output, context))
    }

    /// Backward pass for a context from [`Self::forward_with_context`].
    ///
    /// The context is consumed, so one forward is differentiated at most once:
    ///
    /// ```compile_fail
    /// use scirs2_core::ndarray::Array3;
    /// use tinyattn_kernel::{DifferentiableOp, TanOperator};
    ///
    /// let op = TanOperator::<f64>::with_dims(2, 1, 1).unwrap();
    /// let x = Array3::from_elem((1, 1, 1), 0.5);
    /// let g = Array3::from_elem((1, 1, 1), 1.0);
    /// let (_, ctx) = op.forward_with_context(x.view()).unwrap();
    /// op.backward_with_context(ctx, g.view()).unwrap();
    /// op.backward_with_context(ctx, g.view()).unwrap();
    /// ```
    ///
    /// Nor can it be duplicated first:
    ///
    /// ```compile_fail
    /// use scirs2_core::ndarray::Array3;
    /// use tinyattn_kernel::{DifferentiableOp, TanOperator};
    ///
    /// let op = TanOperator::<f64>::with_dims(2, 1, 1).unwrap();
    /// let x = Array3::from_elem((1, 1, 1), 0.5);
    /// let g = Array3::from_elem((1, 1, 1), 1.0);
    /// let (_, ctx) = op.forward_with_context(x.view()).unwrap();
    /// op.backward_with_context(ctx.clone(), g.view()).unwrap();
    /// op.backward_with_context(ctx, g.view()).unwrap();
    /// ```
    fn backward_with_context(
        &self,
        context: ForwardContext<T>,
        grad_output: ArrayView3<'_, T>,
    ) -> TanResult<TanGradients<T>> {
        if context.operator_id != self.id {
            return Err(TanError::invalid_state(format!(
                "context produced by operator {} passed to operator {}",
                context.operator_id, self.id
            )));
        }
        if context.degree != self.config.degree {
            return Err(TanError::invalid_state(format!(
                "context degree {} does not match operator degree {}",
                context.degree, self.config.degree
            )));
        }
        if context.coefficient_version != self.coefficient_version {
            return Err(TanError::invalid_state(
                "coefficients were modified between forward and backward",
            ));
        }
        check_upstream_shape(&grad_output, context.output_shape)?;
        validate_finite(grad_output.iter(), "upstream gradient")?;

        let coefficients = coefficient_gradient(
            context.expansion.values.view(),
            grad_output.view(),
            self.config.contraction,
            &self.config.parallel,
        )?;
        let features = feature_gradient(
            context.expansion.derivatives.view(),
            self.coefficients.view(),
            grad_output,
            self.config.contraction,
            &self.config.parallel,
        )?;

        self.telemetry.record_backward();
        tracing::trace!(operator = self.id, "backward");

        Ok(TanGradients {
            features,
            coefficients,
        })
    }
}
