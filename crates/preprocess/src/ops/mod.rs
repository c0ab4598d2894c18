//! Image operations
//!
//! Each operation reproduces the OpenCV call the steering models were trained
//! against, on 8-bit interleaved RGB buffers.

mod blur;
mod color;
mod crop;
mod resize;

pub use blur::{gaussian_blur, gaussian_kernel};
pub use color::rgb_to_yuv;
pub use crop::crop_rows;
pub use resize::resize_area;

/// Round half up and saturate to u8
#[inline]
pub(crate) fn saturate_u8(value: f32) -> u8 {
    (value + 0.5).floor().clamp(0.0, 255.0) as u8
}
