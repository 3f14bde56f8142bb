//! Generic differentiable-operator interface.
//!
//! Forward returns its output together with an opaque context holding
//! everything the backward pass needs. The context is consumed by backward,
//! so one forward can be differentiated at most once.

use crate::error::TanResult;

/// An operator with an analytic backward pass.
pub trait DifferentiableOp: Send + Sync {
    /// Forward input
    type Input<'a>
    where
        Self: 'a;
    /// Forward output
    type Output;
    /// State retained from forward for backward
    type Context;
    /// Gradients returned by backward
    type Gradients;

    /// Operation name
    fn name(&self) -> &str;

    /// Number of learned scalars
    fn num_parameters(&self) -> usize;

    /// Forward pass returning the output and its backward context
    fn forward_with_context(
        &self,
        input: Self::Input<'_>,
    ) -> TanResult<(Self::Output, Self::Context)>;

    /// Backward pass for a context produced by this operator's forward
    fn backward_with_context(
        &self,
        context: Self::Context,
        grad_output: Self::Input<'_>,
    ) -> TanResult<Self::Gradients>;
}
