//! Error types for bookdex.
//!
//! Library crates use [`BookdexError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all bookdex operations.
#[derive(Debug, thiserror::Error)]
pub enum BookdexError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Source document could not be read or yielded no text.
    /// Fatal: the pipeline aborts without writing any cache entry.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Stage store read/write error.
    #[error("store error: {0}")]
    Store(String),

    /// Pipeline engine error (unknown dependency, dependency cycle).
    #[error("pipeline error in stage '{stage}': {message}")]
    Stage { stage: String, message: String },

    /// Summarization collaborator error (bridge spawn, protocol, timeout).
    #[error("summarizer error: {0}")]
    Summarize(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid query, bad record).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BookdexError>;

impl BookdexError {
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

    /// Create a stage error with the offending stage's name.
    pub fn stage(stage: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
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
        let err = BookdexError::config("missing wordlist path");
        assert_eq!(err.to_string(), "config error: missing wordlist path");

        let err = BookdexError::stage("frequencies", "dependency cycle");
        assert!(err.to_string().contains("frequencies"));

        let err = BookdexError::validation("schema_version 99 not supported");
        assert!(err.to_string().contains("schema_version 99"));
    }
}
