//! Gaussian blur
//!
//! `GaussianBlur(k×k, sigma = 0)`: fixed binomial kernels up to 7 taps,
//! sampled Gaussian above that, separable, `REFLECT_101` borders.

use image::RgbImage;

use super::saturate_u8;
use crate::error::{PreprocessError, Result};

const SMALL_KERNELS: [&[f32]; 4] = [
    &[1.0],
    &[0.25, 0.5, 0.25],
    &[0.0625, 0.25, 0.375, 0.25, 0.0625],
    &[
        0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
    ],
];

/// 1-D kernel for an odd size with sigma derived from the size
pub fn gaussian_kernel(ksize: u32) -> Result<Vec<f32>> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(PreprocessError::InvalidKernel(ksize));
    }

    let idx = (ksize / 2) as usize;
    if let Some(fixed) = SMALL_KERNELS.get(idx) {
        return Ok(fixed.to_vec());
    }

    let sigma = ((ksize as f64 - 1.0) * 0.5 - 1.0) * 0.3 + 0.8;
    let scale = -0.5 / (sigma * sigma);
    let center = (ksize / 2) as f64;
    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    Ok(raw.into_iter().map(|v| (v / sum) as f32).collect())
}

/// Mirror an out-of-range index without repeating the edge pixel
#[inline]
fn reflect_101(mut i: i64, len: usize) -> usize {
    let n = len as i64;
    if n == 1 {
        return 0;
    }
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * (n - 1) - i;
        }
    }
    i as usize
}

/// Blur with a `ksize × ksize` Gaussian; sizes 0 and 1 return a copy
pub fn gaussian_blur(img: &RgbImage, ksize: u32) -> Result<RgbImage> {
    if ksize <= 1 {
        return Ok(img.clone());
    }
    let kernel = gaussian_kernel(ksize)?;
    let radius = (ksize / 2) as i64;

    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = img.as_raw();

    // horizontal pass, kept in f32 so rounding happens once
    let mut tmp = vec![0.0f32; w * h * 3];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as i64 + k as i64 - radius, w);
                    acc += weight * f32::from(src[(y * w + sx) * 3 + c]);
                }
                tmp[(y * w + x) * 3 + c] = acc;
            }
        }
    }

    let mut out = RgbImage::new(width, height);
    let dst: &mut [u8] = &mut out;
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as i64 + k as i64 - radius, h);
                    acc += weight * tmp[(sy * w + x) * 3 + c];
                }
                dst[(y * w + x) * 3 + c] = saturate_u8(acc);
            }
        }
    }

    Ok(out)
}
