use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image payload is empty")]
    EmptyPayload,
    #[error("Invalid base64 image payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
    #[error("Failed to stage image for OCR: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode a base64 image, with or without a `data:image/...;base64,` header.
pub fn decode_image_payload(payload: &str) -> Result<Vec<u8>, PreprocessError> {
    let body = match payload.split_once(',') {
        Some((_, rest)) => rest,
        None => payload,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(PreprocessError::EmptyPayload);
    }
    Ok(BASE64.decode(compact)?)
}

/// Process raw image bytes (JPEG / PNG / WEBP / …) and return normalized PNG bytes.
pub fn prepare_for_ocr_from_bytes(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img))
}

/// Stage prepared PNG bytes in a scratch file for the OCR backend.
/// The file is deleted when the returned handle is dropped.
pub fn write_scratch_image(png: &[u8]) -> Result<NamedTempFile, PreprocessError> {
    let mut file = tempfile::Builder::new()
        .prefix("receipt-")
        .suffix(".png")
        .tempfile()?;
    file.write_all(png)?;
    file.flush()?;
    Ok(file)
}

/// Grayscale + contrast stretch.
fn normalize(img: DynamicImage) -> DynamicImage {
    // Down-scale very large phone photos; OCR works best around 2000 px.
    let img = if img.width() > 2800 || img.height() > 2800 {
        img.resize(2800, 2800, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray: GrayImage = img.to_luma8();

    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max_px - min_px) as u32;
    let stretched: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        let v = ((p - min_px) as u32 * 255 / range) as u8;
        Luma([v])
    });

    DynamicImage::ImageLuma8(stretched)
}

fn encode_as_png(img: DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
