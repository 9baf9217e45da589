use image::RgbImage;

use crate::error::CaptionError;

/// Decodes an uploaded image and converts it to 8-bit RGB.
///
/// The format is guessed from the leading bytes, so anything the `image`
/// decoders understand is accepted. Grayscale, alpha and 16-bit images are
/// flattened to three 8-bit channels.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, CaptionError> {
    if bytes.is_empty() {
        return Err(CaptionError::Decode("Image data is empty".to_string()));
    }

    let img = image::load_from_memory(bytes).map_err(|e| CaptionError::Decode(e.to_string()))?;

    log::debug!(
        "Decoded {}x{} image ({:?})",
        img.width(),
        img.height(),
        img.color()
    );

    match img {
        image::DynamicImage::ImageRgb8(rgb) => Ok(rgb),
        other => Ok(other.to_rgb8()),
    }
}
