//! Application error types.

use thiserror::Error;

/// Application-level errors for protgraph.
#[derive(Error, Debug)]
pub enum AppError {
    // Store errors
    #[error("Graph store unreachable: {0}")]
    Connection(String),

    #[error("Graph store round-trip exceeded {seconds}s deadline")]
    Timeout { seconds: u64 },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Graph query error: {message}")]
    Query { message: String, query: String },

    // Record source errors
    #[error("Malformed record at line {line}: {message}")]
    Source { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Domain errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Only transport-level failures qualify. Constraint violations signal a
    /// data-integrity bug and must never be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Connection(_) | AppError::Timeout { .. })
    }

    /// Short machine-readable code, used in logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Timeout { .. } => "TIMEOUT",
            AppError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            AppError::Query { .. } => "QUERY_ERROR",
            AppError::Source { .. } => "SOURCE_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AppError::Connection("refused".into()).is_retryable());
        assert!(AppError::Timeout { seconds: 5 }.is_retryable());
        assert!(!AppError::ConstraintViolation("dup".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::Query {
            message: "syntax".into(),
            query: "MATCH".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::ConstraintViolation("x".into()).code(),
            "CONSTRAINT_VIOLATION"
        );
        assert_eq!(AppError::Timeout { seconds: 1 }.code(), "TIMEOUT");
    }
}
