//! Error types for CLI operations.

use std::path::PathBuf;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Model definition file not found
    #[error("Model definition not found: {}", .path.display())]
    ModelNotFound { path: PathBuf },

    /// Preprocessed frame does not fit the model
    #[error("Model expects {expected} input but preprocessing produces {produced}")]
    ShapeMismatch { expected: String, produced: String },

    /// Could not bind the listen address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn model_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ModelNotFound { path: path.into() }
    }

    pub fn shape_mismatch(expected: impl Into<String>, produced: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            produced: produced.into(),
        }
    }

    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }
}
