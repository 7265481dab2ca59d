//! Error types for the term-probe interrogation engine.
//!
//! All fallible operations in the crate return [`TermError`] through the
//! [`Result`] alias. Errors are raised at the point of detection and are never
//! downgraded into failing test units: a column that does not exist is an
//! error, not a step where every row failed.

use thiserror::Error;

/// The main error type for term-probe.
#[derive(Error, Debug)]
pub enum TermError {
    /// A column named by a step (or by a column operand) is absent from the table.
    #[error("Column '{column}' not found in table")]
    ColumnNotFound { column: String },

    /// The column's data type is outside the set an assertion accepts.
    #[error(
        "Column '{column}' has type {found}, which is incompatible with '{assertion}' (allowed: {allowed})"
    )]
    IncompatibleType {
        /// The column being tested
        column: String,
        /// The assertion (or operation) that rejected the type
        assertion: String,
        /// The actual data type of the column
        found: String,
        /// Human-readable list of accepted type classes
        allowed: String,
    },

    /// A declaration that cannot be evaluated: unknown assertion kind, malformed
    /// threshold, bad regex, conflicting report field selections and similar.
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    /// Comparator operand lengths disagree.
    #[error("Length of `x` ({expected}) and `{operand}` ({found}) must be the same")]
    LengthMismatch {
        /// Name of the operand whose length is wrong
        operand: String,
        /// Length of the input list
        expected: usize,
        /// Length of the operand list
        found: usize,
    },

    /// A fraction was requested over zero test units.
    #[error("Fraction of {count} over zero test units is undefined")]
    DivisionUndefined { count: usize },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Creates an invalid-specification error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpecification(message.into())
    }

    /// Creates an incompatible-type error.
    pub fn incompatible_type(
        column: impl Into<String>,
        assertion: impl Into<String>,
        found: impl ToString,
        allowed: impl Into<String>,
    ) -> Self {
        Self::IncompatibleType {
            column: column.into(),
            assertion: assertion.into(),
            found: found.to_string(),
            allowed: allowed.into(),
        }
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for TermError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidSpecification(format!("invalid regex pattern: {err}"))
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
            other => TermError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
