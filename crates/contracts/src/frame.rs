//! ModelInput - Preprocess output
//!
//! The frame handed to the steering model.

use serde::{Deserialize, Serialize};

/// Pixel colour space of a preprocessed frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    Rgb,
    #[default]
    Yuv,
}

/// Memory layout of the batch-1 input tensor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// `[1, height, width, channels]`
    #[default]
    Nhwc,
    /// `[1, channels, height, width]`
    Nchw,
}

/// Input shape the model was trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_channels")]
    pub channels: u32,

    #[serde(default)]
    pub layout: TensorLayout,
}

fn default_height() -> u32 {
    66
}

fn default_width() -> u32 {
    200
}

fn default_channels() -> u32 {
    3
}

impl Default for InputShape {
    fn default() -> Self {
        Self {
            height: default_height(),
            width: default_width(),
            channels: default_channels(),
            layout: TensorLayout::default(),
        }
    }
}

impl InputShape {
    /// Batch-1 tensor dimensions in this shape's layout
    pub fn dims(&self) -> [usize; 4] {
        let (h, w, c) = (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        );
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, c],
            TensorLayout::Nchw => [1, c, h, w],
        }
    }
}

/// Preprocessed camera frame, interleaved HWC bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub color_space: ColorSpace,
    pub data: Vec<u8>,
}

impl ModelInput {
    /// All-zero frame of the given shape
    pub fn blank(shape: &InputShape, color_space: ColorSpace) -> Self {
        let len = (shape.width * shape.height * shape.channels) as usize;
        Self {
            width: shape.width,
            height: shape.height,
            channels: shape.channels,
            color_space,
            data: vec![0; len],
        }
    }

    /// Expected byte length for the declared dimensions
    pub fn expected_len(&self) -> usize {
        (self.width * self.height * self.channels) as usize
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Does this frame fit a model input shape
    pub fn matches(&self, shape: &InputShape) -> bool {
        self.width == shape.width && self.height == shape.height && self.channels == shape.channels
    }

    /// Pixel at (x, y), channel c
    pub fn at(&self, x: u32, y: u32, c: u32) -> u8 {
        let idx = ((y * self.width + x) * self.channels + c) as usize;
        self.data[idx]
    }

    /// Convert to f32 as `x * scale + offset`, keeping HWC order
    pub fn to_f32(&self, scale: f32, offset: f32) -> Vec<f32> {
        self.data
            .iter()
            .map(|&v| f32::from(v) * scale + offset)
            .collect()
    }

    /// Convert to f32 in CHW order
    pub fn to_f32_planar(&self, scale: f32, offset: f32) -> Vec<f32> {
        let (w, h, c) = (
            self.width as usize,
            self.height as usize,
            self.channels as usize,
        );
        let mut out = vec![0.0f32; w * h * c];
        for y in 0..h {
            for x in 0..w {
                for ch in 0..c {
                    let v = self.data[(y * w + x) * c + ch];
                    out[ch * h * w + y * w + x] = f32::from(v) * scale + offset;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shape_is_nvidia_input() {
        let shape = InputShape::default();
        assert_eq!(shape.dims(), [1, 66, 200, 3]);
    }

    #[test]
    fn nchw_dims() {
        let shape = InputShape {
            layout: TensorLayout::Nchw,
            ..Default::default()
        };
        assert_eq!(shape.dims(), [1, 3, 66, 200]);
    }

    #[test]
    fn blank_frame_has_expected_len() {
        let frame = ModelInput::blank(&InputShape::default(), ColorSpace::Yuv);
        assert_eq!(frame.len(), 66 * 200 * 3);
        assert_eq!(frame.len(), frame.expected_len());
        assert!(frame.matches(&InputShape::default()));
    }

    #[test]
    fn planar_conversion_reorders_channels() {
        let frame = ModelInput {
            width: 2,
            height: 1,
            channels: 3,
            color_space: ColorSpace::Rgb,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        assert_eq!(frame.to_f32(1.0, 0.0), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(
            frame.to_f32_planar(1.0, 0.0),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
        assert_eq!(frame.at(1, 0, 2), 6);
    }

    #[test]
    fn scale_and_offset_are_applied() {
        let frame = ModelInput {
            width: 1,
            height: 1,
            channels: 1,
            color_space: ColorSpace::Rgb,
            data: vec![255],
        };
        assert_eq!(frame.to_f32(0.5, -1.0), vec![126.5]);
    }
}
