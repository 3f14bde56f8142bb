//! Runtime-precision construction and dynamic-rank tensors.
//!
//! Callers that only learn the precision at runtime go through
//! [`new_operator`], which returns an [`OperatorHandle`] wrapping a
//! `TanOperator<f32>` or `TanOperator<f64>`. The handle takes
//! [`HostTensor`]s of any rank and reports rank, dimension and element-type
//! errors instead of panicking.

use crate::config::TanConfig;
use crate::error::{TanError, TanResult};
use crate::operator::TanOperator;
use crate::precision::{Precision, Scalar};
use crate::telemetry::TelemetrySnapshot;
use scirs2_core::ndarray::{Array2, Array3, ArrayD, ArrayView3, Ix3};
use std::collections::HashMap;

/// A dynamic-rank tensor tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum HostTensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl HostTensor {
    pub fn precision(&self) -> Precision {
        match self {
            HostTensor::F32(_) => Precision::F32,
            HostTensor::F64(_) => Precision::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            HostTensor::F32(a) => a.shape(),
            HostTensor::F64(a) => a.shape(),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            HostTensor::F32(a) => Some(a),
            HostTensor::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            HostTensor::F64(a) => Some(a),
            HostTensor::F32(_) => None,
        }
    }
}

impl From<ArrayD<f32>> for HostTensor {
    fn from(array: ArrayD<f32>) -> Self {
        HostTensor::F32(array)
    }
}

impl From<ArrayD<f64>> for HostTensor {
    fn from(array: ArrayD<f64>) -> Self {
        HostTensor::F64(array)
    }
}

impl From<Array3<f32>> for HostTensor {
    fn from(array: Array3<f32>) -> Self {
        HostTensor::F32(array.into_dyn())
    }
}

impl From<Array3<f64>> for HostTensor {
    fn from(array: Array3<f64>) -> Self {
        HostTensor::F64(array.into_dyn())
    }
}

/// Gradients returned through an [`OperatorHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct HostGradients {
    /// `dL/dx`, shape `(B, S, D)`
    pub features: HostTensor,
    /// `dL/dC`, shape `(P, N + 1, D_out)`
    pub coefficients: HostTensor,
}

/// Operator whose precision is chosen at runtime.
#[derive(Debug)]
pub enum OperatorHandle {
    F32(TanOperator<f32>),
    F64(TanOperator<f64>),
}

/// Construct an operator with default policies.
pub fn new_operator(
    degree: usize,
    input_dim: usize,
    output_dim: usize,
    precision: Precision,
) -> TanResult<OperatorHandle> {
    OperatorHandle::from_config(
        TanConfig::new(degree, input_dim, output_dim).with_precision(precision),
    )
}

fn rank3_view<'a, T>(
    tensor: &'a ArrayD<T>,
    operation: &str,
    last_dim: usize,
) -> TanResult<ArrayView3<'a, T>> {
    tensor.view().into_dimensionality::<Ix3>().map_err(|_| {
        let shape = tensor.shape();
        let mut expected: Vec<usize> = shape
            .iter()
            .copied()
            .chain(std::iter::repeat(1))
            .take(2)
            .collect();
        expected.push(last_dim);
        TanError::shape_mismatch_with_context(
            operation,
            expected,
            shape.to_vec(),
            format!("expected rank 3, got rank {}", shape.len()),
        )
    })
}

fn typed<'a, T: Scalar>(
    tensor: &'a HostTensor,
    select: impl Fn(&'a HostTensor) -> Option<&'a ArrayD<T>>,
) -> TanResult<&'a ArrayD<T>> {
    select(tensor).ok_or(TanError::PrecisionMismatch {
        expected: T::precision(),
        actual: tensor.precision(),
    })
}

impl OperatorHandle {
    /// Build the operator variant matching `config.precision`.
    pub fn from_config(config: TanConfig) -> TanResult<Self> {
        match config.precision {
            Precision::F32 => Ok(OperatorHandle::F32(TanOperator::new(config)?)),
            Precision::F64 => Ok(OperatorHandle::F64(TanOperator::new(config)?)),
        }
    }

    pub fn precision(&self) -> Precision {
        self.config().precision
    }

    pub fn config(&self) -> &TanConfig {
        match self {
            OperatorHandle::F32(op) => op.config(),
            OperatorHandle::F64(op) => op.config(),
        }
    }

    /// Forward pass; the context is kept for the next [`Self::backward`].
    pub fn forward(&mut self, features: &HostTensor) -> TanResult<HostTensor> {
        let input_dim = self.config().input_dim;
        match self {
            OperatorHandle::F32(op) => {
                let x = rank3_view(typed(features, HostTensor::as_f32)?, "forward", input_dim)?;
                Ok(op.forward(x)?.into())
            }
            OperatorHandle::F64(op) => {
                let x = rank3_view(typed(features, HostTensor::as_f64)?, "forward", input_dim)?;
                Ok(op.forward(x)?.into())
            }
        }
    }

    /// Backward pass for the pending forward.
    pub fn backward(&mut self, grad_output: &HostTensor) -> TanResult<HostGradients> {
        let output_dim = self.config().output_dim;
        match self {
            OperatorHandle::F32(op) => {
                let g = rank3_view(
                    typed(grad_output, HostTensor::as_f32)?,
                    "backward",
                    output_dim,
                )?;
                let grads = op.backward(g)?;
                Ok(HostGradients {
                    features: grads.features.into(),
                    coefficients: grads.coefficients.into(),
                })
            }
            OperatorHandle::F64(op) => {
                let g = rank3_view(
                    typed(grad_output, HostTensor::as_f64)?,
                    "backward",
                    output_dim,
                )?;
                let grads = op.backward(g)?;
                Ok(HostGradients {
                    features: grads.features.into(),
                    coefficients: grads.coefficients.into(),
                })
            }
        }
    }

    /// Inference-only forward.
    pub fn evaluate(&self, features: &HostTensor) -> TanResult<HostTensor> {
        let input_dim = self.config().input_dim;
        match self {
            OperatorHandle::F32(op) => {
                let x = rank3_view(typed(features, HostTensor::as_f32)?, "evaluate", input_dim)?;
                Ok(op.evaluate(x)?.into())
            }
            OperatorHandle::F64(op) => {
                let x = rank3_view(typed(features, HostTensor::as_f64)?, "evaluate", input_dim)?;
                Ok(op.evaluate(x)?.into())
            }
        }
    }

    /// The coefficient tensor at the operator's precision.
    pub fn coefficients(&self) -> HostTensor {
        match self {
            OperatorHandle::F32(op) => op.coefficients().to_owned().into(),
            OperatorHandle::F64(op) => op.coefficients().to_owned().into(),
        }
    }

    pub fn parameters(&self) -> HashMap<String, Array2<f64>> {
        match self {
            OperatorHandle::F32(op) => op.parameters(),
            OperatorHandle::F64(op) => op.parameters(),
        }
    }

    pub fn load_parameters(
        &mut self,
        parameters: &HashMap<String, Array2<f64>>,
    ) -> TanResult<()> {
        match self {
            OperatorHandle::F32(op) => op.load_parameters(parameters),
            OperatorHandle::F64(op) => op.load_parameters(parameters),
        }
    }

    pub fn has_pending_backward(&self) -> bool {
        match self {
            OperatorHandle::F32(op) => op.has_pending_backward(),
            OperatorHandle::F64(op) => op.has_pending_backward(),
        }
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        match self {
            OperatorHandle::F32(op) => op.telemetry(),
            OperatorHandle::F64(op) => op.telemetry(),
        }
    }
}
