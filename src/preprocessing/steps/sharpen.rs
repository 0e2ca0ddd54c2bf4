use crate::error::OcrError;
use image::DynamicImage;
use imageproc::filter::sharpen_gaussian;

/// Unsharp-mask strength
const AMOUNT: f32 = 1.5;
/// Blur radius of the mask
const SIGMA: f32 = 1.0;

/// Unsharp masking to crisp up character strokes
pub fn apply(image: DynamicImage) -> Result<DynamicImage, OcrError> {
    let gray = image.to_luma8();
    Ok(DynamicImage::ImageLuma8(sharpen_gaussian(&gray, SIGMA, AMOUNT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use imageproc::filter::gaussian_blur_f32;

    /// Total variation along rows
    fn edge_energy(img: &GrayImage) -> f32 {
        let mut total = 0.0;
        for y in 0..img.height() {
            for x in 1..img.width() {
                let a = img.get_pixel(x - 1, y).0[0] as f32;
                let b = img.get_pixel(x, y).0[0] as f32;
                total += (a - b).abs();
            }
        }
        total
    }

    #[test]
    fn test_sharpen_restores_blurred_edge() {
        let img = GrayImage::from_fn(30, 10, |x, _| {
            if x < 15 {
                Luma([40])
            } else {
                Luma([210])
            }
        });
        let blurred = gaussian_blur_f32(&img, 2.0);

        let result = apply(DynamicImage::ImageLuma8(blurred.clone()))
            .unwrap()
            .to_luma8();

        assert!(
            edge_energy(&result) > edge_energy(&blurred),
            "sharpened edge energy {} should exceed blurred {}",
            edge_energy(&result),
            edge_energy(&blurred)
        );
    }
}
