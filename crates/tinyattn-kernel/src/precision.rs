//! Precision control for operator computations.
//!
//! An operator is built for exactly one precision and keeps it for every
//! forward and backward call; there is no mixed precision inside a call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numerical precision of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floating point (faster, less memory)
    F32,

    /// 64-bit floating point (more accurate)
    #[default]
    F64,
}

impl Precision {
    /// Returns the size in bytes of one scalar.
    pub fn size_bytes(&self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }

    /// Relative tolerance of a finite-difference gradient check at this precision.
    pub fn gradient_tolerance(&self) -> f64 {
        match self {
            Precision::F32 => 1e-3,
            Precision::F64 => 1e-6,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::F32 => write!(f, "FP32"),
            Precision::F64 => write!(f, "FP64"),
        }
    }
}

/// Trait for scalar types the kernels are generic over.
///
/// Implemented for `f32` and `f64`. Every kernel accumulates in `Self`.
pub trait Scalar:
    Copy
    + Clone
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + std::fmt::Debug
    + std::fmt::Display
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
    + std::ops::AddAssign
    + 'static
{
    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Check if value is NaN
    fn is_nan(self) -> bool;

    /// Check if value is finite
    fn is_finite(self) -> bool;

    /// Absolute value
    fn abs(self) -> Self;

    /// Square root
    fn sqrt(self) -> Self;

    /// Hyperbolic tangent
    fn tanh(self) -> Self;

    /// Maximum of two values
    fn max(self, other: Self) -> Self;

    /// Minimum of two values
    fn min(self, other: Self) -> Self;

    /// Convert from f64
    fn from_f64(value: f64) -> Self;

    /// Convert to f64
    fn to_f64(self) -> f64;

    /// The precision type
    fn precision() -> Precision;

    /// Clamp into `[lo, hi]`
    fn clamp_to(self, lo: Self, hi: Self) -> Self {
        self.max(lo).min(hi)
    }
}

macro_rules! impl_scalar {
    ($t:ty, $precision:expr) => {
        impl Scalar for $t {
            fn zero() -> Self {
                0.0
            }

            fn one() -> Self {
                1.0
            }

            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }

            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            fn abs(self) -> Self {
                <$t>::abs(self)
            }

            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }

            fn tanh(self) -> Self {
                <$t>::tanh(self)
            }

            fn max(self, other: Self) -> Self {
                <$t>::max(self, other)
            }

            fn min(self, other: Self) -> Self {
                <$t>::min(self, other)
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn precision() -> Precision {
                $precision
            }
        }
    };
}

impl_scalar!(f32, Precision::F32);
impl_scalar!(f64, Precision::F64);
