use crate::error::OcrError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Shorter side below this is upscaled; plate crops are often tiny
const MIN_SHORT_SIDE: u32 = 480;
/// Longer side is capped to keep inference time bounded
const MAX_LONG_SIDE: u32 = 2400;

/// Rescale so small inputs gain detail and huge inputs stay tractable
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError(format!(
            "Cannot resize empty image ({}x{})",
            width, height
        )));
    }

    let factor = scale_factor(width, height);

    // Within 5% of the current size is not worth resampling
    if (0.95..=1.05).contains(&factor) {
        return Ok(image);
    }

    let new_width = ((width as f32 * factor).round() as u32).max(1);
    let new_height = ((height as f32 * factor).round() as u32).max(1);

    Ok(image.resize_exact(new_width, new_height, FilterType::Lanczos3))
}

fn scale_factor(width: u32, height: u32) -> f32 {
    let short = width.min(height) as f32;
    let long = width.max(height) as f32;

    let mut factor = 1.0;
    if short < MIN_SHORT_SIDE as f32 {
        factor = MIN_SHORT_SIDE as f32 / short;
    }
    if long * factor > MAX_LONG_SIDE as f32 {
        factor = MAX_LONG_SIDE as f32 / long;
    }
    factor
}
