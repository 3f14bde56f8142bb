//! Operator configuration.
//!
//! Everything fixed for the lifetime of an operator lives here: degree,
//! dimensions, precision, the contraction convention, the input-domain policy,
//! coefficient initialisation and parallel execution settings.

use crate::contraction::ContractionMode;
use crate::domain::DomainPolicy;
use crate::error::{TanError, TanResult};
use crate::init::CoefficientInit;
use crate::parallel::ParallelConfig;
use crate::precision::Precision;
use serde::{Deserialize, Serialize};

/// Largest accepted polynomial degree.
pub const MAX_DEGREE: usize = 64;

/// Configuration of a Chebyshev attention operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TanConfig {
    /// Polynomial degree N (expansion width N + 1)
    pub degree: usize,
    /// Hidden dimension D of the feature tensor
    pub input_dim: usize,
    /// Output channels D_out
    pub output_dim: usize,
    /// Scalar precision of every tensor the operator touches
    #[serde(default)]
    pub precision: Precision,
    /// Reduction convention over the hidden dimension
    #[serde(default)]
    pub contraction: ContractionMode,
    /// Handling of inputs outside [-1, 1]
    #[serde(default)]
    pub domain: DomainPolicy,
    /// Coefficient initialisation
    #[serde(default)]
    pub init: CoefficientInit,
    /// Data-parallel execution settings
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl TanConfig {
    /// Create a configuration with default policies.
    pub fn new(degree: usize, input_dim: usize, output_dim: usize) -> Self {
        Self {
            degree,
            input_dim,
            output_dim,
            precision: Precision::default(),
            contraction: ContractionMode::default(),
            domain: DomainPolicy::default(),
            init: CoefficientInit::default(),
            parallel: ParallelConfig::default(),
        }
    }

    /// Set the precision
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Set the contraction mode
    pub fn with_contraction(mut self, contraction: ContractionMode) -> Self {
        self.contraction = contraction;
        self
    }

    /// Set the input-domain policy
    pub fn with_domain_policy(mut self, domain: DomainPolicy) -> Self {
        self.domain = domain;
        self
    }

    /// Set the coefficient initialisation
    pub fn with_init(mut self, init: CoefficientInit) -> Self {
        self.init = init;
        self
    }

    /// Set parallel execution settings
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Width of the expansion axis.
    pub fn expansion_width(&self) -> usize {
        self.degree + 1
    }

    /// Coefficient tensor shape `(P, N + 1, D_out)`.
    pub fn coefficient_shape(&self) -> (usize, usize, usize) {
        self.contraction
            .coefficient_shape(self.degree, self.input_dim, self.output_dim)
    }

    /// Number of learned coefficients.
    pub fn num_parameters(&self) -> usize {
        let (p, k, o) = self.coefficient_shape();
        p * k * o
    }

    /// Validate configuration
    pub fn validate(&self) -> TanResult<()> {
        if self.input_dim == 0 {
            return Err(TanError::invalid_config("input_dim must be positive"));
        }

        if self.output_dim == 0 {
            return Err(TanError::invalid_config("output_dim must be positive"));
        }

        if self.degree > MAX_DEGREE {
            return Err(TanError::invalid_config(format!(
                "degree must be at most {}, got {}",
                MAX_DEGREE, self.degree
            )));
        }

        self.init.validate()
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> TanResult<Self> {
        let config: TanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> TanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
