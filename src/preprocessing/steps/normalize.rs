use crate::error::OcrError;
use image::{DynamicImage, GrayImage, Luma};

/// Fraction of pixels ignored at each end of the histogram
const CLIP_FRACTION: f32 = 0.01;

/// Stretch contrast so the 1st..99th percentile spans 0-255
///
/// Clipping the tails keeps a few glare or shadow pixels on a plate from
/// pinning the range.
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    let (low, high) = percentile_bounds(&gray, CLIP_FRACTION);

    if high <= low {
        return Ok(DynamicImage::ImageLuma8(gray));
    }

    let range = (high - low) as f32;
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let clamped = (value as u8).clamp(low, high);
        *slot = ((clamped - low) as f32 / range * 255.0).round() as u8;
    }

    let mut stretched = gray;
    for pixel in stretched.pixels_mut() {
        *pixel = Luma([lut[pixel.0[0] as usize]]);
    }

    Ok(DynamicImage::ImageLuma8(stretched))
}

fn percentile_bounds(img: &GrayImage, clip: f32) -> (u8, u8) {
    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return (0, 0);
    }
    let cutoff = (total as f32 * clip) as u64;

    let mut seen = 0;
    let mut low = 0u8;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > cutoff {
            low = value as u8;
            break;
        }
    }

    seen = 0;
    let mut high = 255u8;
    for (value, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > cutoff {
            high = value as u8;
            break;
        }
    }

    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_contrast_is_stretched() {
        let img = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x as u8) * 4]));

        let result = apply(DynamicImage::ImageLuma8(img)).unwrap().to_luma8();
        let min = result.pixels().map(|p| p.0[0]).min().unwrap();
        let max = result.pixels().map(|p| p.0[0]).max().unwrap();

        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_outliers_do_not_pin_range() {
        // Mostly mid-gray with a single white glare pixel
        let mut img = GrayImage::from_fn(20, 20, |x, _| Luma([90 + (x as u8) * 2]));
        img.put_pixel(0, 0, Luma([255]));

        let (_, high) = percentile_bounds(&img, CLIP_FRACTION);
        assert!(high < 255, "glare pixel should be clipped, got {}", high);
    }

    #[test]
    fn test_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(10, 10, Luma([77]));
        let result = apply(DynamicImage::ImageLuma8(img)).unwrap().to_luma8();
        assert_eq!(result.get_pixel(5, 5).0[0], 77);
    }
}
