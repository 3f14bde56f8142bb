//! Error types for the Chebyshev attention operator.
//!
//! Every failure surfaced by the kernel is a deterministic function of the
//! caller's inputs: shape errors, pairing errors between `forward` and
//! `backward`, invalid configuration and non-finite inputs. None of them is
//! retried internally.

use crate::precision::Precision;
use std::fmt;
use thiserror::Error;

/// Main error type for operator construction, forward and backward calls.
#[derive(Error, Debug)]
pub enum TanError {
    /// Tensor rank or dimensions inconsistent with the operator configuration
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(ShapeMismatchError),

    /// Backward without a matching forward, or a context from another operator
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Rejected configuration values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Element type of a dynamic tensor differs from the operator precision
    #[error("Precision mismatch: operator is {expected}, tensor is {actual}")]
    PrecisionMismatch {
        /// Precision the operator was built with
        expected: Precision,
        /// Precision of the tensor that was supplied
        actual: Precision,
    },

    /// NaN or infinite values where finite inputs are required
    #[error("Numerical error: {0}")]
    NumericalError(NumericalError),

    /// Configuration (de)serialization failures
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal errors (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Detailed shape mismatch error with context
#[derive(Debug, Clone)]
pub struct ShapeMismatchError {
    /// Description of the operation that failed
    pub operation: String,
    /// Expected shape
    pub expected: Vec<usize>,
    /// Actual shape that was provided
    pub actual: Vec<usize>,
    /// Additional context
    pub context: Option<String>,
}

impl fmt::Display for ShapeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Shape mismatch in {}: expected {:?}, got {:?}",
            self.operation, self.expected, self.actual
        )?;
        if let Some(ctx) = &self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

impl ShapeMismatchError {
    /// Create a new shape mismatch error
    pub fn new(operation: impl Into<String>, expected: Vec<usize>, actual: Vec<usize>) -> Self {
        Self {
            operation: operation.into(),
            expected,
            actual,
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Numerical correctness errors
#[derive(Debug, Clone)]
pub struct NumericalError {
    /// Type of numerical issue
    pub kind: NumericalErrorKind,
    /// Location where the error occurred
    pub location: String,
    /// Flat index of the first offending element, if known
    pub index: Option<usize>,
}

/// Types of numerical errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericalErrorKind {
    /// Not-a-Number detected
    NaN,
    /// Infinity detected
    Infinity,
}

impl fmt::Display for NumericalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} detected in {}", self.kind, self.location)?;
        if let Some(idx) = self.index {
            write!(f, " at flat index {}", idx)?;
        }
        Ok(())
    }
}

impl NumericalError {
    /// Create a new numerical error
    pub fn new(kind: NumericalErrorKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            index: None,
        }
    }

    /// Record the flat index of the offending element
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// Result type using TanError
pub type TanResult<T> = Result<T, TanError>;

/// Helper functions for creating common errors
impl TanError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
    ) -> Self {
        TanError::ShapeMismatch(ShapeMismatchError::new(operation, expected, actual))
    }

    /// Create a shape mismatch error with extra context
    pub fn shape_mismatch_with_context(
        operation: impl Into<String>,
        expected: Vec<usize>,
        actual: Vec<usize>,
        context: impl Into<String>,
    ) -> Self {
        TanError::ShapeMismatch(
            ShapeMismatchError::new(operation, expected, actual).with_context(context),
        )
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        TanError::InvalidState(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        TanError::InvalidConfig(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        TanError::Internal(msg.into())
    }

    /// True for the pairing errors of the forward/backward contract
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TanError::InvalidState(_))
    }

    /// True for rank or dimension errors
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, TanError::ShapeMismatch(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_error() {
        let err = TanError::shape_mismatch("forward", vec![2, 3, 4], vec![2, 3, 5]);
        assert!(err.is_shape_mismatch());
        assert!(err.to_string().contains("forward"));
        assert!(err.to_string().contains("[2, 3, 5]"));
    }

    #[test]
    fn test_shape_mismatch_with_context() {
        let err = ShapeMismatchError::new("backward", vec![1, 1, 4], vec![1, 1, 3])
            .with_context("upstream gradient");
        let err_str = err.to_string();
        assert!(err_str.contains("backward"));
        assert!(err_str.contains("upstream gradient"));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = TanError::invalid_state("no pending forward");
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "Invalid state: no pending forward");
    }

    #[test]
    fn test_numerical_error_index() {
        let err = TanError::NumericalError(
            NumericalError::new(NumericalErrorKind::NaN, "features").at_index(7),
        );
        let msg = err.to_string();
        assert!(msg.contains("NaN"));
        assert!(msg.contains("flat index 7"));
    }

    #[test]
    fn test_precision_mismatch_display() {
        let err = TanError::PrecisionMismatch {
            expected: Precision::F32,
            actual: Precision::F64,
        };
        assert_eq!(
            err.to_string(),
            "Precision mismatch: operator is FP32, tensor is FP64"
        );
    }
}
