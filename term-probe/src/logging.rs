//! Logging utilities and configuration for term-probe.
//!
//! Interrogation runs once per step and can be called in tight loops, so the
//! per-step and per-backend logging is gated behind [`LogConfig`] flags. The
//! macros below only evaluate their arguments when the relevant flag is on.

use tracing::Level;

/// Logging configuration for interrogation runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for term-probe components
    pub base_level: Level,
    /// Whether to log per-step evaluation details (predicates, counts)
    pub log_step_details: bool,
    /// Whether to log backend operations (column mutation, filtering, collection)
    pub log_backend_operations: bool,
    /// Whether to emit step and plan metrics through telemetry
    pub log_metrics: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_step_details: false,
            log_backend_operations: true,
            log_metrics: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_step_details: true,
            log_backend_operations: true,
            log_metrics: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_step_details: false,
            log_backend_operations: false,
            log_metrics: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug logging that is skipped entirely unless the base level allows it.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Per-step detail logging.
#[macro_export]
macro_rules! log_step {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_step_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Backend operation logging.
#[macro_export]
macro_rules! log_backend_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_backend_operations {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, respecting char boundaries.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation helpers.
pub mod setup {
    use tracing::Level;

    /// Configuration for installing a global tracing subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for term-probe specifically
        pub probe_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                probe_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                probe_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                probe_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_probe_level(mut self, level: Level) -> Self {
            self.probe_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter directive string.
        pub fn env_filter(&self) -> String {
            match self.env_filter {
                Some(ref filter) => filter.clone(),
                None => format!(
                    "{},term_probe={}",
                    self.level.as_str().to_lowercase(),
                    self.probe_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global fmt (or JSON) subscriber filtered by `RUST_LOG` or
    /// the configured directives.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_probe::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }

    /// Installs the subscriber with an OpenTelemetry layer that exports spans
    /// through the caller's tracer.
    #[cfg(feature = "telemetry")]
    pub fn init_logging_with_telemetry<T>(
        config: LoggingConfig,
        tracer: T,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        T: opentelemetry::trace::Tracer
            + tracing_opentelemetry::PreSampledTracer
            + Send
            + Sync
            + 'static,
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;

        Ok(())
    }
}
