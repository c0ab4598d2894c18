//! Area resize
//!
//! `INTER_AREA` when shrinking: every destination pixel is the
//! coverage-weighted mean of the source pixels under its footprint.
//!
//! Enlarging keeps the same rule, so a footprint that straddles two source
//! pixels blends them by overlap. OpenCV switches to a bilinear variant in
//! that case; the steering pipeline only ever shrinks.

use image::RgbImage;

use super::saturate_u8;
use crate::error::{PreprocessError, Result};

/// `(source index, weight)` taps for one destination index
type Taps = Vec<(usize, f32)>;

/// Coverage taps along one axis; each row of weights sums to 1
fn area_taps(src_len: u32, dst_len: u32) -> Vec<Taps> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    (0..dst_len)
        .map(|i| {
            let start = f64::from(i) * scale;
            let end = (start + scale).min(f64::from(src_len));
            let mut taps = Taps::new();
            let mut j = start.floor() as usize;
            while (j as f64) < end && j < src_len as usize {
                let lo = start.max(j as f64);
                let hi = end.min(j as f64 + 1.0);
                let covered = hi - lo;
                if covered > 1e-9 {
                    taps.push((j, (covered / scale) as f32));
                }
                j += 1;
            }
            taps
        })
        .collect()
}

/// Resize to `width × height` by pixel-area averaging
pub fn resize_area(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyTarget { width, height });
    }
    let (src_w, src_h) = img.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(img.clone());
    }
    if src_w == 0 || src_h == 0 {
        return Err(PreprocessError::EmptyTarget {
            width: src_w,
            height: src_h,
        });
    }

    let x_taps = area_taps(src_w, width);
    let y_taps = area_taps(src_h, height);
    let src = img.as_raw();
    let stride = src_w as usize * 3;

    let mut out = RgbImage::new(width, height);
    let dst: &mut [u8] = &mut out;
    for (dy, rows) in y_taps.iter().enumerate() {
        for (dx, cols) in x_taps.iter().enumerate() {
            let mut acc = [0.0f32; 3];
            for &(sy, wy) in rows {
                for &(sx, wx) in cols {
                    let base = sy * stride + sx * 3;
                    let w = wy * wx;
                    for c in 0..3 {
                        acc[c] += w * f32::from(src[base + c]);
                    }
                }
            }
            let o = (dy * width as usize + dx) * 3;
            for c in 0..3 {
                dst[o + c] = saturate_u8(acc[c]);
            }
        }
    }

    Ok(out)
}
