//! Subscriber setup for the operator's `tracing` events.
//!
//! The kernel emits domain warnings at `warn`, construction and discarded
//! contexts at `debug`, and per-call summaries at `trace`. With the
//! `structured-logging` feature this module installs a global subscriber
//! that prints them.
//!
//! ```no_run
//! use tinyattn_kernel::logging::{LogFormat, LogLevel, TracingLogger};
//!
//! TracingLogger::builder()
//!     .with_format(LogFormat::Json)
//!     .with_level(LogLevel::Trace)
//!     .install()
//!     .expect("subscriber already set");
//! ```

use crate::error::{TanError, TanResult};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single line per event, no colors
    #[default]
    Compact,
    /// Multi-line with colors
    Pretty,
    /// One JSON object per event
    Json,
}

/// Most verbose level let through when no filter directive is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "tinyattn_kernel=trace",
            LogLevel::Debug => "tinyattn_kernel=debug",
            LogLevel::Info => "tinyattn_kernel=info",
            LogLevel::Warn => "tinyattn_kernel=warn",
            LogLevel::Error => "tinyattn_kernel=error",
        }
    }
}

/// Builder for the global subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    format: LogFormat,
    level: LogLevel,
    env_filter: Option<String>,
}

impl TracingLogger {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Filter directive such as `"tinyattn_kernel=debug"`; overrides the level.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Resolve the filter: explicit directive, then `RUST_LOG`, then the level.
    fn filter(&self) -> TanResult<EnvFilter> {
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .map_err(|e| TanError::invalid_config(format!("invalid log filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.directive()))),
        }
    }

    /// Install as the global subscriber. Fails if one is already set.
    pub fn install(self) -> TanResult<()> {
        let filter = self.filter()?;
        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            LogFormat::Compact => fmt::layer().with_ansi(false).compact().boxed(),
            LogFormat::Pretty => fmt::layer().pretty().boxed(),
            LogFormat::Json => fmt::layer().json().boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()
            .map_err(|e| TanError::internal(format!("failed to install subscriber: {}", e)))
    }
}
