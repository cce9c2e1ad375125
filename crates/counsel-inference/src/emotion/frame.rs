//! Webcam frame decoding and tensor preparation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::DynamicImage;

use counsel_core::defaults::EMOTION_INPUT_SIZE;
use counsel_core::{Error, Result};

/// RGB.
pub const INPUT_CHANNELS: usize = 3;

/// Length of the flattened `224 x 224 x 3` input tensor.
pub const TENSOR_LEN: usize =
    EMOTION_INPUT_SIZE as usize * EMOTION_INPUT_SIZE as usize * INPUT_CHANNELS;

fn invalid() -> Error {
    Error::InvalidInput("invalid image data".to_string())
}

/// Decode a base64 JPEG/PNG, accepting a `data:image/...;base64,` prefix.
pub fn decode_frame(input: &str) -> Result<DynamicImage> {
    let trimmed = input.trim();
    let payload = if trimmed.starts_with("data:") {
        trimmed.split_once(',').map(|(_, data)| data).ok_or_else(invalid)?
    } else {
        trimmed
    };
    if payload.is_empty() {
        return Err(invalid());
    }

    let bytes = STANDARD.decode(payload).map_err(|_| invalid())?;
    image::load_from_memory(&bytes).map_err(|_| invalid())
}

/// Resize to the model input size and scale pixels to `[0, 1]`, row-major HWC.
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let rgb = image
        .resize_exact(EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    rgb.pixels()
        .flat_map(|p| p.0)
        .map(|channel| f32::from(channel) / 255.0)
        .collect()
}

/// Reshape a flat HWC tensor into the nested `[H][W][C]` form the REST API expects.
pub(crate) fn nest(tensor: &[f32]) -> Vec<Vec<Vec<f32>>> {
    let side = EMOTION_INPUT_SIZE as usize;
    tensor
        .chunks(side * INPUT_CHANNELS)
        .map(|row| row.chunks(INPUT_CHANNELS).map(<[f32]>::to_vec).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> String {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        STANDARD.encode(bytes)
    }

    #[test]
    fn test_decode_raw_base64_png() {
        let img = decode_frame(&encoded(8, 6, [255, 0, 0], ImageFormat::Png)).unwrap();
        assert_eq!(img.width(), 8);
        assert_eq!(img.height(), 6);
    }

    #[test]
    fn test_decode_data_url_jpeg() {
        let data_url = format!(
            "data:image/jpeg;base64,{}",
            encoded(16, 16, [10, 20, 30], ImageFormat::Jpeg)
        );
        let img = decode_frame(&data_url).unwrap();
        assert_eq!(img.width(), 16);
    }

    #[test]
    fn test_empty_and_garbage_rejected() {
        for input in ["", "   ", "data:image/png;base64,", "not base64 !!", "aGVsbG8="] {
            let err = decode_frame(input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput(ref m) if m == "invalid image data"),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_data_url_without_comma_rejected() {
        assert!(decode_frame("data:image/png;base64").is_err());
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let img = decode_frame(&encoded(40, 30, [255, 0, 0], ImageFormat::Png)).unwrap();
        let tensor = preprocess(&img);

        assert_eq!(tensor.len(), TENSOR_LEN);
        assert_eq!(TENSOR_LEN, 150_528);
        assert_eq!(&tensor[..3], &[1.0, 0.0, 0.0]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_nest_shape() {
        let tensor = vec![0.5; TENSOR_LEN];
        let nested = nest(&tensor);
        assert_eq!(nested.len(), 224);
        assert_eq!(nested[0].len(), 224);
        assert_eq!(nested[0][0].len(), 3);
    }
}
