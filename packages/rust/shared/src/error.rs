//! Error types for BudgetLens.
//!
//! Library crates use [`BudgetLensError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Failures scoped to a single file, table, item, or classifier call are
//! reported as values next to the successful results. Only structurally
//! invalid top-level input and infrastructure failures become an `Err`.

use std::path::PathBuf;

/// Top-level error type for all BudgetLens operations.
#[derive(Debug, thiserror::Error)]
pub enum BudgetLensError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A source unit could not be read or parsed.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Classifier transport or protocol error.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Session store / database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Caller supplied structurally invalid input.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BudgetLensError>;

impl BudgetLensError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BudgetLensError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = BudgetLensError::validation("tasks must be a list");
        assert!(err.to_string().contains("tasks must be a list"));

        let err = BudgetLensError::extraction("no tables found");
        assert_eq!(err.to_string(), "extraction error: no tables found");
    }

    #[test]
    fn io_error_carries_path() {
        let err = BudgetLensError::io(
            "/tmp/missing.xlsx",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let text = err.to_string();
        assert!(text.contains("missing.xlsx"));
        assert!(text.contains("gone"));
    }
}
