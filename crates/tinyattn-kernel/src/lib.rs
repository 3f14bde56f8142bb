//! Chebyshev polynomial attention operator for Tiny Attention Networks.
//!
//! Replaces softmax attention's value mixing with a learned polynomial map:
//! every scalar of a `(batch, seq, hidden)` feature tensor is expanded into the
//! Chebyshev basis `T_0 .. T_N`, and the expansions are contracted against a
//! learned coefficient tensor into `D_out` output channels. Backward passes use
//! closed-form derivatives of the basis, so no autodiff tape is involved.
//!
//! ## Core Features
//!
//! ### Operator
//! - **Basis generation**: three-term recurrence with fused derivatives
//! - **Batched expansion**: `(B, S, D)` to `(B, S, D, N + 1)`, row-parallel
//! - **Contraction**: pooled or per-dimension coefficient blocks
//! - **Gradients**: analytic `dL/dx` and `dL/dC` from the retained expansion
//! - **Binding**: forward/backward pairing with explicit or implicit contexts
//!
//! ### Reliability
//! - **Error handling**: typed errors for shape, pairing, precision and NaN/Inf
//! - **Domain policy**: clamp, tanh or passthrough for inputs outside `[-1, 1]`
//! - **Gradient checking**: finite-difference verification of both gradients
//! - **Determinism**: parallel and sequential execution are bit-identical
//!
//! ## Module Organization
//!
//! - `basis`: scalar Chebyshev values, derivatives and Clenshaw evaluation
//! - `expansion`: batched expansion kernel
//! - `contraction`: coefficient contraction layer
//! - `gradient`: closed-form gradient engine
//! - `operator`: the differentiable operator binding
//! - `handle`: runtime-precision construction over dynamic-rank tensors
//! - `config` / `init`: configuration and coefficient initialisation
//! - `domain`: input-domain policy and finiteness checks
//! - `gradient_check`: numeric gradient verification
//! - `similarity`: mean pooling and cosine similarity of outputs
//! - `telemetry`: per-operator call counters
//! - `logging`: subscriber setup (`structured-logging` feature)

pub mod basis;
pub mod config;
pub mod contraction;
pub mod domain;
pub mod error;
pub mod expansion;
pub mod gradient;
pub mod gradient_check;
pub mod handle;
pub mod init;
#[cfg(feature = "structured-logging")]
pub mod logging;
pub mod op;
pub mod operator;
pub mod parallel;
pub mod precision;
pub mod similarity;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use basis::{chebyshev_basis, evaluate_series, evaluate_series_derivative};
pub use config::{TanConfig, MAX_DEGREE};
pub use contraction::{contract, ContractionMode};
pub use domain::{DomainPolicy, DomainReport};
pub use error::{NumericalError, NumericalErrorKind, ShapeMismatchError, TanError, TanResult};
pub use expansion::{expand, expand_fused, FusedExpansion};
pub use gradient::{coefficient_gradient, feature_gradient};
pub use gradient_check::{check_operator_gradients, GradientCheckConfig, GradientCheckResult};
pub use handle::{new_operator, HostGradients, HostTensor, OperatorHandle};
pub use init::CoefficientInit;
pub use op::DifferentiableOp;
pub use operator::{ForwardContext, TanGradients, TanOperator, COEFFICIENTS_KEY};
pub use parallel::ParallelConfig;
pub use precision::{Precision, Scalar};
pub use similarity::{cosine_similarity, mean_pool};
pub use telemetry::{OperatorTelemetry, TelemetrySnapshot};
