//! Camera payload decoding
//!
//! The simulator sends its center camera as a base64 string holding a JPEG.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use image::RgbImage;

use crate::error::Result;

/// Standard alphabet, padding optional
const TOLERANT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64 payload, ignoring embedded whitespace
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(TOLERANT.decode(compact)?)
}

/// Decode encoded image bytes (any format the `image` crate reads) to 8-bit RGB
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Decode a base64 image payload to 8-bit RGB
pub fn decode_image(payload: &str) -> Result<RgbImage> {
    let bytes = decode_base64(payload)?;
    decode_image_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreprocessError;
    use base64::engine::general_purpose::STANDARD;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_base64(img: &RgbImage) -> String {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    #[test]
    fn test_decode_png_round_trip() {
        let img = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        let decoded = decode_image(&png_base64(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_jpeg() {
        let img = RgbImage::from_pixel(32, 16, Rgb([128, 128, 128]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        let payload = STANDARD.encode(buf.into_inner());

        let decoded = decode_image(&payload).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn test_missing_padding_and_whitespace() {
        let payload = STANDARD.encode(b"hello!!");
        let unpadded = payload.trim_end_matches('=');
        let wrapped = format!("{}\n{}", &unpadded[..4], &unpadded[4..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"hello!!");
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode_base64("not*base64").unwrap_err();
        assert!(matches!(err, PreprocessError::Base64(_)));
    }

    #[test]
    fn test_not_an_image() {
        let payload = STANDARD.encode(b"plain text, no pixels here");
        let err = decode_image(&payload).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }
}
