//! Preprocessor - telemetry image → ModelInput
//!
//! crop → blur → area resize → colour conversion, in that order.

use image::RgbImage;
use tracing::trace;

use contracts::{ColorSpace, InputShape, ModelInput, PreprocessConfig, TensorLayout};

use crate::decode::decode_image;
use crate::error::{PreprocessError, Result};
use crate::ops::{crop_rows, gaussian_blur, resize_area, rgb_to_yuv};

/// Configured preprocessing chain
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor, rejecting configurations that can never succeed
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        if config.blur_kernel > 1 && config.blur_kernel % 2 == 0 {
            return Err(PreprocessError::InvalidKernel(config.blur_kernel));
        }
        if config.target_width == 0 || config.target_height == 0 {
            return Err(PreprocessError::EmptyTarget {
                width: config.target_width,
                height: config.target_height,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Shape of every frame this preprocessor produces
    pub fn output_shape(&self) -> InputShape {
        InputShape {
            height: self.config.target_height,
            width: self.config.target_width,
            channels: 3,
            layout: TensorLayout::Nhwc,
        }
    }

    /// Run the chain on a decoded RGB frame
    pub fn run(&self, img: &RgbImage) -> Result<ModelInput> {
        let cfg = &self.config;
        let (src_w, src_h) = img.dimensions();

        let cropped = crop_rows(img, cfg.crop_top, cfg.crop_bottom)?;
        let blurred = gaussian_blur(&cropped, cfg.blur_kernel)?;
        let resized = resize_area(&blurred, cfg.target_width, cfg.target_height)?;
        let converted = match cfg.color_space {
            ColorSpace::Yuv => rgb_to_yuv(&resized),
            ColorSpace::Rgb => resized,
        };

        trace!(
            src_w,
            src_h,
            dst_w = cfg.target_width,
            dst_h = cfg.target_height,
            color_space = ?cfg.color_space,
            "frame preprocessed"
        );

        Ok(ModelInput {
            width: cfg.target_width,
            height: cfg.target_height,
            channels: 3,
            color_space: cfg.color_space,
            data: converted.into_raw(),
        })
    }

    /// Decode a base64 camera payload and run the chain
    pub fn run_base64(&self, payload: &str) -> Result<ModelInput> {
        let img = decode_image(payload)?;
        self.run(&img)
    }
}
