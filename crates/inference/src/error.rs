//! Inference error types

use std::path::PathBuf;

use contracts::{ContractError, InputShape};
use thiserror::Error;

/// Inference specific error
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Model definition file could not be read
    #[error("failed to read model definition '{}': {source}", path.display())]
    DescriptorRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model definition file is not a valid descriptor
    #[error("invalid model definition '{}': {source}", path.display())]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Weights file next to the definition does not exist
    #[error("weights file '{}' not found", path.display())]
    WeightsMissing { path: PathBuf },

    /// Weights could not be turned into a runnable model
    #[error("failed to load model '{}': {message}", path.display())]
    Load { path: PathBuf, message: String },

    /// Build does not include a runner for this format
    #[error("model format '{0}' is not supported by this build")]
    UnsupportedFormat(String),

    /// Frame does not match the model input
    #[error("input {width}x{height}x{channels} does not match model input {expected:?}")]
    ShapeMismatch {
        width: u32,
        height: u32,
        channels: u32,
        expected: InputShape,
    },

    /// Model run failed
    #[error("model run failed: {0}")]
    Run(String),

    /// Requested output is missing or empty
    #[error("model produced no value at output {0}")]
    EmptyOutput(usize),
}

impl InferenceError {
    /// Create load error
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<InferenceError> for ContractError {
    fn from(err: InferenceError) -> Self {
        match &err {
            InferenceError::DescriptorRead { path, .. }
            | InferenceError::DescriptorParse { path, .. }
            | InferenceError::WeightsMissing { path }
            | InferenceError::Load { path, .. } => {
                ContractError::model_load(path.display().to_string(), err.to_string())
            }
            InferenceError::UnsupportedFormat(_) => {
                ContractError::model_load("<descriptor>", err.to_string())
            }
            _ => ContractError::inference(err.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, InferenceError>;
