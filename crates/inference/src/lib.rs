//! # Inference
//!
//! Steering model loading and prediction.
//!
//! A model is given as a definition file (JSON [`ModelDescriptor`]); the
//! weights live next to it under the same name with the format's extension.
//!
//! ## Feature Flags
//!
//! - `onnx`: ONNX runner built on `tract-onnx` (default)

mod descriptor;
mod error;
mod mock;
#[cfg(feature = "onnx")]
mod onnx;

use std::path::Path;

use contracts::{InputShape, ModelInput, SteeringModel};
use tracing::{info, instrument};

pub use descriptor::{weights_path_for, ModelDescriptor, ModelFormat};
pub use error::{InferenceError, Result};
pub use mock::{ConstantModel, MockModel};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSteeringModel;

/// Load the model described by `definition`
///
/// # Errors
/// - definition unreadable or invalid
/// - weights file missing
/// - weights rejected by the runner
#[instrument(name = "load_model", skip_all, fields(definition = %definition.display()))]
pub fn load_model(definition: &Path) -> Result<Box<dyn SteeringModel>> {
    let descriptor = ModelDescriptor::from_path(definition)?;
    let weights = weights_path_for(definition, descriptor.format);
    if !weights.is_file() {
        return Err(InferenceError::WeightsMissing { path: weights });
    }

    let name = descriptor.display_name(definition);
    info!(model = %name, format = descriptor.format.as_str(), weights = %weights.display(), "Loading model");

    match descriptor.format {
        #[cfg(feature = "onnx")]
        ModelFormat::Onnx => Ok(Box::new(OnnxSteeringModel::load(
            &weights, descriptor, name,
        )?)),
        #[cfg(not(feature = "onnx"))]
        format => Err(InferenceError::UnsupportedFormat(format.as_str().to_string())),
    }
}

/// Reject frames whose dimensions differ from the model input
pub(crate) fn check_input(input: &ModelInput, shape: &InputShape) -> Result<()> {
    if input.matches(shape) && input.len() == input.expected_len() {
        Ok(())
    } else {
        Err(InferenceError::ShapeMismatch {
            width: input.width,
            height: input.height,
            channels: input.channels,
            expected: *shape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_missing_definition() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model(&dir.path().join("model.json")).err().expect("expected load_model to fail");
        assert!(matches!(err, InferenceError::DescriptorRead { .. }));
    }

    #[test]
    fn test_invalid_definition() {
        let dir = tempfile::tempdir().unwrap();
        let def = write_file(dir.path(), "model.json", b"{ not json");
        let err = load_model(&def).err().expect("expected load_model to fail");
        assert!(matches!(err, InferenceError::DescriptorParse { .. }));
    }

    #[test]
    fn test_missing_weights_names_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let def = write_file(dir.path(), "model.json", b"{}");
        let err = load_model(&def).err().expect("expected load_model to fail");
        match err {
            InferenceError::WeightsMissing { path } => {
                assert_eq!(path, dir.path().join("model.onnx"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_corrupt_weights() {
        let dir = tempfile::tempdir().unwrap();
        let def = write_file(dir.path(), "model.json", b"{}");
        write_file(dir.path(), "model.onnx", b"definitely not protobuf");
        let err = load_model(&def).err().expect("expected load_model to fail");
        assert!(matches!(err, InferenceError::Load { .. }));
    }

    #[test]
    fn test_errors_map_to_contract_errors() {
        let err: contracts::ContractError = InferenceError::WeightsMissing {
            path: "m.onnx".into(),
        }
        .into();
        assert!(matches!(err, contracts::ContractError::ModelLoad { .. }));

        let err: contracts::ContractError = InferenceError::EmptyOutput(0).into();
        assert!(matches!(err, contracts::ContractError::Inference { .. }));
    }
}
