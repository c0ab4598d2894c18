//! Row crop

use image::{imageops, RgbImage};

use crate::error::{PreprocessError, Result};

/// Keep rows `top..bottom`
///
/// Slice semantics: `bottom` is clamped to the image height, and a window
/// that selects no rows is an error.
pub fn crop_rows(img: &RgbImage, top: u32, bottom: u32) -> Result<RgbImage> {
    let (width, height) = img.dimensions();
    let bottom = bottom.min(height);

    if top >= bottom || width == 0 {
        return Err(PreprocessError::EmptyCrop {
            top,
            bottom,
            height,
        });
    }

    Ok(imageops::crop_imm(img, 0, top, width, bottom - top).to_image())
}
