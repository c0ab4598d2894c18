//! ONNX steering model (tract)

use std::path::Path;

use contracts::{ContractError, InputShape, ModelInput, SteeringModel, TensorLayout};
use tract_onnx::prelude::*;
use tracing::{debug, info, instrument};

use crate::descriptor::ModelDescriptor;
use crate::error::{InferenceError, Result};
use crate::check_input;

type Plan = TypedRunnableModel<TypedModel>;

/// Optimized batch-1 tract plan plus the descriptor it was built from
pub struct OnnxSteeringModel {
    name: String,
    descriptor: ModelDescriptor,
    plan: Plan,
}

impl std::fmt::Debug for OnnxSteeringModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSteeringModel")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl OnnxSteeringModel {
    /// Load weights and optimize for the descriptor's fixed input shape
    #[instrument(name = "onnx_load", skip_all, fields(weights = %weights.display()))]
    pub fn load(weights: &Path, descriptor: ModelDescriptor, name: String) -> Result<Self> {
        let dims = descriptor.input.dims();

        let plan = tract_onnx::onnx()
            .model_for_path(weights)
            .and_then(|model| model.with_input_fact(0, f32::fact(dims).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::load(weights, format!("{e:#}")))?;

        info!(model = %name, ?dims, output_index = descriptor.output_index, "ONNX model loaded");

        Ok(Self {
            name,
            descriptor,
            plan,
        })
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn input_tensor(&self, input: &ModelInput) -> Result<Tensor> {
        let scale = self.descriptor.input_scale;
        let offset = self.descriptor.input_offset;
        let data = match self.descriptor.input.layout {
            TensorLayout::Nhwc => input.to_f32(scale, offset),
            TensorLayout::Nchw => input.to_f32_planar(scale, offset),
        };
        Tensor::from_shape(&self.descriptor.input.dims(), &data)
            .map_err(|e| InferenceError::Run(format!("{e:#}")))
    }

    fn run(&self, input: &ModelInput) -> Result<f32> {
        check_input(input, &self.descriptor.input)?;

        let tensor = self.input_tensor(input)?;
        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Run(format!("{e:#}")))?;

        let index = self.descriptor.output_index;
        let output = outputs
            .get(index)
            .ok_or(InferenceError::EmptyOutput(index))?;
        let values = output
            .cast_to::<f32>()
            .map_err(|e| InferenceError::Run(format!("{e:#}")))?;
        let steering = values
            .as_slice::<f32>()
            .map_err(|e| InferenceError::Run(format!("{e:#}")))?
            .first()
            .copied()
            .ok_or(InferenceError::EmptyOutput(index))?;

        debug!(steering, "model output");
        Ok(steering)
    }
}

impl SteeringModel for OnnxSteeringModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_shape(&self) -> InputShape {
        self.descriptor.input
    }

    fn predict(&self, input: &ModelInput) -> std::result::Result<f32, ContractError> {
        Ok(self.run(input)?)
    }
}
