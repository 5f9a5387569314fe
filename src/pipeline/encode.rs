//! Image encoding: `DynamicImage` → base64 payload for the backend request.
//!
//! All three backends accept images as base64 embedded in the JSON request
//! body. PNG is the default because it is lossless; text crispness matters
//! far more than file size for table transcription; JPEG is available when
//! payload size is the binding constraint.

use crate::config::PageImageFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// One rasterised page, encoded and ready for a backend request.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// Base64 of the encoded image bytes.
    pub base64: String,
    /// MIME type matching the chosen encoding.
    pub mime_type: &'static str,
}

/// Encode a rasterised page in the configured format.
pub fn encode_page(
    img: &DynamicImage,
    format: PageImageFormat,
) -> Result<EncodedPage, image::ImageError> {
    let mut buf = Vec::new();
    let image_format = match format {
        PageImageFormat::Png => image::ImageFormat::Png,
        PageImageFormat::Jpeg => image::ImageFormat::Jpeg,
    };
    // JPEG encoding rejects alpha; flatten first.
    match format {
        PageImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_to(&mut Cursor::new(&mut buf), image_format)?;
        }
        PageImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image_format)?;
        }
    }

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(EncodedPage {
        base64: b64,
        mime_type: format.mime_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_png() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let page = encode_page(&img, PageImageFormat::Png).expect("encode should succeed");
        assert_eq!(page.mime_type, "image/png");
        let decoded = STANDARD.decode(&page.base64).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn encode_jpeg_flattens_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 128])));
        let page = encode_page(&img, PageImageFormat::Jpeg).expect("encode should succeed");
        assert_eq!(page.mime_type, "image/jpeg");
        assert!(!page.base64.is_empty());
    }
}
