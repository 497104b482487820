//! Screenshot payload codec.
//!
//! Capture collaborators hand over screenshots as standard image
//! payloads: a `data:image/png;base64,...` URL, bare base64, or raw
//! encoded bytes. Everything is decoded to RGBA8 before diffing;
//! results are re-encoded to PNG for the persistence layer.

use crate::result::{CotejarError, CotejarResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageEncoder, RgbaImage};

/// Decode an image payload into an RGBA pixel grid.
///
/// Accepts a `data:<mime>;base64,` URL or bare base64 text.
///
/// # Errors
///
/// Returns `DecodeFailure` for malformed base64 or unparseable image
/// data, `EmptyImage` for a zero-dimension image.
pub fn decode(payload: &str) -> CotejarResult<RgbaImage> {
    let encoded = match payload.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };

    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CotejarError::DecodeFailure {
            message: format!("invalid base64: {e}"),
        })?;

    decode_bytes(&bytes)
}

/// Decode raw encoded image bytes (PNG, JPEG) into an RGBA pixel grid.
///
/// # Errors
///
/// Returns `DecodeFailure` if the bytes are not a valid image,
/// `EmptyImage` for a zero-dimension image.
pub fn decode_bytes(bytes: &[u8]) -> CotejarResult<RgbaImage> {
    let img = image::load_from_memory(bytes).map_err(|e| CotejarError::DecodeFailure {
        message: e.to_string(),
    })?;

    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(CotejarError::EmptyImage {
            width: rgba.width(),
            height: rgba.height(),
        });
    }
    Ok(rgba)
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns `EncodeFailure` if PNG encoding fails.
pub fn encode_png(img: &RgbaImage) -> CotejarResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| CotejarError::EncodeFailure {
            message: e.to_string(),
        })?;
    Ok(buffer)
}

/// Encode an RGBA image as a `data:image/png;base64,` URL.
///
/// # Errors
///
/// Returns `EncodeFailure` if PNG encoding fails.
pub fn encode_data_url(img: &RgbaImage) -> CotejarResult<String> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}
