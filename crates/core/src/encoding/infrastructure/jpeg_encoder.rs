use std::borrow::Cow;

use image::codecs::jpeg;
use image::{DynamicImage, ExtendedColorType, RgbaImage};

use crate::encoding::domain::image_encoder::{EncodeError, ImageEncoder};
use crate::shared::frame::Frame;

/// Baseline JPEG encoder backed by the `image` crate.
pub struct JpegEncoder;

impl JpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEncoder for JpegEncoder {
    fn encode(&self, frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let (pixels, color) = match frame.channels() {
            1 => (Cow::Borrowed(frame.data()), ExtendedColorType::L8),
            3 => (Cow::Borrowed(frame.data()), ExtendedColorType::Rgb8),
            // JPEG has no alpha channel.
            4 => (Cow::Owned(drop_alpha(frame)?), ExtendedColorType::Rgb8),
            n => return Err(EncodeError::UnsupportedChannels(n)),
        };

        // Roughly 1 bit per pixel is a reasonable starting point at q85.
        let mut out = Vec::with_capacity(frame.byte_len() / 8);
        jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode(&pixels, frame.width(), frame.height(), color)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;
        Ok(out)
    }

    fn extension(&self) -> &str {
        "jpg"
    }
}

fn drop_alpha(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let rgba = RgbaImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| EncodeError::Codec("RGBA buffer does not match frame size".into()))?;
    Ok(DynamicImage::ImageRgba8(rgba).to_rgb8().into_raw())
}
