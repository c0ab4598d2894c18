//! RGB → YUV
//!
//! OpenCV `COLOR_RGB2YUV` on 8-bit input works in 14-bit fixed point and
//! rounds Y before deriving chroma from it:
//! `Y = .299R + .587G + .114B`, `U = .492(B - Y) + 128`, `V = .877(R - Y) + 128`.

use image::RgbImage;

const SHIFT: u32 = 14;
const HALF: i32 = 1 << (SHIFT - 1);
const DELTA: i32 = 128 << SHIFT;

const KR: i32 = 4899;
const KG: i32 = 9617;
const KB: i32 = 1868;
const KU: i32 = 8061;
const KV: i32 = 14369;

#[inline]
fn descale(value: i32) -> u8 {
    (value >> SHIFT).clamp(0, 255) as u8
}

/// Convert an RGB image to YUV, in place of the RGB channels
pub fn rgb_to_yuv(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        let [r, g, b] = px.0.map(i32::from);
        let y = (r * KR + g * KG + b * KB + HALF) >> SHIFT;
        let u = (b - y) * KU + DELTA + HALF;
        let v = (r - y) * KV + DELTA + HALF;
        px.0 = [y.clamp(0, 255) as u8, descale(u), descale(v)];
    }
    out
}
