//! Per-frame failures
//!
//! None of these stop the driver; they are logged and counted.

use contracts::ContractError;
use preprocess::PreprocessError;
use socket_server::ServerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Inference(#[from] ContractError),

    #[error("model returned a non-finite steering angle: {0}")]
    NonFinite(f32),

    #[error("frame worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("failed to emit command: {0}")]
    Emit(#[from] ServerError),
}

impl FrameError {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Preprocess(PreprocessError::Base64(_)) => "base64",
            Self::Preprocess(PreprocessError::Decode(_)) => "image_decode",
            Self::Preprocess(_) => "preprocess",
            Self::Inference(_) | Self::NonFinite(_) => "inference",
            Self::Worker(_) => "worker",
            Self::Emit(_) => "emit",
        }
    }
}
