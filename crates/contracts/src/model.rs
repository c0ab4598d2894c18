//! SteeringModel trait - inference interface
//!
//! Implemented by the ONNX runner and by the mock models used in tests.

use crate::{ContractError, InputShape, ModelInput};

/// A loaded, read-only steering predictor
///
/// Implementations must be shareable across tasks: the model is loaded once at
/// startup and only read afterwards.
pub trait SteeringModel: Send + Sync {
    /// Model name (used for logging)
    fn name(&self) -> &str;

    /// Input shape the model expects
    fn input_shape(&self) -> InputShape;

    /// Predict a steering angle for one frame
    ///
    /// # Errors
    /// Returns an inference error if the frame does not fit the model or the
    /// run fails.
    fn predict(&self, input: &ModelInput) -> Result<f32, ContractError>;
}

impl<M: SteeringModel + ?Sized> SteeringModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn input_shape(&self) -> InputShape {
        (**self).input_shape()
    }

    fn predict(&self, input: &ModelInput) -> Result<f32, ContractError> {
        (**self).predict(input)
    }
}

impl<M: SteeringModel + ?Sized> SteeringModel for std::sync::Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn input_shape(&self) -> InputShape {
        (**self).input_shape()
    }

    fn predict(&self, input: &ModelInput) -> Result<f32, ContractError> {
        (**self).predict(input)
    }
}
