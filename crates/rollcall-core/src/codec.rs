//! Payload image codec — base64 (optionally data-URI-prefixed) to RGB.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid image data: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode an `image_base64` payload into an RGB image.
///
/// Accepts either raw base64 or a data-URI (`data:image/png;base64,<data>`);
/// everything up to and including the first comma is stripped. Any container
/// format the image crate understands is accepted — there is no allow-list.
pub fn decode_image(payload: &str) -> Result<RgbImage, CodecError> {
    let data = match payload.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => payload,
    };
    let bytes = STANDARD.decode(data)?;
    let img = image::load_from_memory(&bytes)?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_base64(img: &RgbImage) -> String {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        STANDARD.encode(&buf)
    }

    fn sample_image() -> RgbImage {
        RgbImage::from_fn(8, 6, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 7]))
    }

    #[test]
    fn test_decodes_raw_base64_png() {
        let img = sample_image();
        let decoded = decode_image(&png_base64(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.get_pixel(3, 2), &Rgb([90, 80, 7]));
    }

    #[test]
    fn test_data_uri_prefix_decodes_identically() {
        let raw = png_base64(&sample_image());
        let prefixed = format!("data:image/png;base64,{raw}");
        let a = decode_image(&raw).unwrap();
        let b = decode_image(&prefixed).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_strips_only_through_first_comma() {
        // Unusual but legal prefix text before the comma is discarded wholesale.
        let raw = png_base64(&sample_image());
        let prefixed = format!("some;odd prefix,{raw}");
        assert!(decode_image(&prefixed).is_ok());
    }

    #[test]
    fn test_invalid_base64_is_a_base64_error() {
        let err = decode_image("!!not-base64!!").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
    }

    #[test]
    fn test_valid_base64_invalid_image_is_an_image_error() {
        let payload = STANDARD.encode(b"definitely not an image container");
        let err = decode_image(&payload).unwrap_err();
        assert!(matches!(err, CodecError::Image(_)));
    }

    #[test]
    fn test_jpeg_container_accepted() {
        let img = sample_image();
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        let decoded = decode_image(&STANDARD.encode(&buf)).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
    }
}
