use crate::error::OcrError;
use image::DynamicImage;

/// Collapse color channels to luminance
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    Ok(DynamicImage::ImageLuma8(image.to_luma8()))
}
