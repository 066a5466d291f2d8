use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader};

use crate::error::{GridError, Result};
use crate::media::crop::CropRect;

pub const OUTPUT_CONTENT_TYPE: &str = "image/jpeg";
pub const OUTPUT_EXTENSION: &str = "jpg";

/// The encoded crop, ready for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

/// Checks that `bytes` carry a recognizable image header without decoding
/// pixel data.
pub fn sniff(bytes: &[u8]) -> Result<()> {
    image::guess_format(bytes)
        .map(|_| ())
        .map_err(|err| GridError::validation(format!("unrecognized image data: {err}")))
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()
        .map_err(|err| GridError::validation(format!("cannot decode image: {err}")))
}

/// Copies exactly `rect` out of `image` and encodes it as JPEG, whatever
/// the source format was.
pub fn rasterize(image: &DynamicImage, rect: CropRect, quality: u8) -> Result<EncodedImage> {
    let (width, height) = image.dimensions();
    let fits = rect.width > 0
        && rect.height > 0
        && rect.x as u64 + rect.width as u64 <= width as u64
        && rect.y as u64 + rect.height as u64 <= height as u64;
    if !fits {
        return Err(GridError::validation(format!(
            "crop {rect:?} exceeds the {width}x{height} source"
        )));
    }

    let rgb = image
        .crop_imm(rect.x, rect.y, rect.width, rect.height)
        .to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| GridError::Encode(err.to_string()))?;

    Ok(EncodedImage {
        bytes,
        width: rect.width,
        height: rect.height,
        content_type: OUTPUT_CONTENT_TYPE,
    })
}
