//! Model definition file
//!
//! A small JSON document next to the weights:
//!
//! ```json
//! {
//!   "name": "nvidia-pilotnet",
//!   "format": "onnx",
//!   "input": { "height": 66, "width": 200, "channels": 3, "layout": "nhwc" },
//!   "output_index": 0,
//!   "input_scale": 1.0,
//!   "input_offset": 0.0
//! }
//! ```
//!
//! Every field is optional. The defaults describe a model that normalizes its
//! own input (a leading `x / 127.5 - 1` layer), which is how steering models
//! of this family are usually exported.

use std::path::{Path, PathBuf};

use contracts::InputShape;
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

/// Weights format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    #[default]
    Onnx,
}

impl ModelFormat {
    /// File extension of the weights file
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.extension()
    }
}

/// Parsed model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDescriptor {
    /// Display name (falls back to the file stem)
    pub name: Option<String>,

    pub format: ModelFormat,

    /// Input tensor shape and layout
    pub input: InputShape,

    /// Which model output carries the steering angle
    pub output_index: usize,

    /// Pixel values are fed as `x * input_scale + input_offset`
    pub input_scale: f32,

    pub input_offset: f32,
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            format: ModelFormat::default(),
            input: InputShape::default(),
            output_index: 0,
            input_scale: 1.0,
            input_offset: 0.0,
        }
    }
}

impl ModelDescriptor {
    /// Read and parse a definition file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| InferenceError::DescriptorRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content).map_err(|source| InferenceError::DescriptorParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Name to report, using the definition's file stem when unnamed
    pub fn display_name(&self, definition: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            definition
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "model".to_string())
        })
    }
}

/// Weights path for a model definition: same path, format extension
///
/// `models/model.json` → `models/model.onnx`
pub fn weights_path_for(definition: &Path, format: ModelFormat) -> PathBuf {
    definition.with_extension(format.extension())
}
