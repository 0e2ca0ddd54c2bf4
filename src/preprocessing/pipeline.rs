use crate::error::OcrError;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Hand the upload to the engine untouched
    #[default]
    None,
    /// Steps: grayscale
    Minimal,
    /// Steps: grayscale, resize, normalize, sharpen
    Document,
}

impl Preset {
    /// Parse from a form field or CLI value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "minimal" => Some(Self::Minimal),
            "document" => Some(Self::Document),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Document => "document",
        }
    }

    pub fn names() -> Vec<&'static str> {
        [Self::None, Self::Minimal, Self::Document]
            .iter()
            .map(Preset::as_str)
            .collect()
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// What the pipeline did, reported back to clients
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingStats {
    pub preset: String,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
    /// Output size divided by input size, per axis
    #[serde(skip)]
    pub scale: (f32, f32),
}

/// Preprocessed image plus the stats describing how it was produced
pub struct Preprocessed {
    pub image: DynamicImage,
    pub stats: PreprocessingStats,
}

/// Preprocessing pipeline that applies steps based on preset
pub struct Pipeline {
    preset: Preset,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn process(&self, image: DynamicImage) -> Result<Preprocessed, OcrError> {
        let start = Instant::now();
        let (orig_width, orig_height) = image.dimensions();
        let mut timings = Vec::new();
        let mut img = image;

        match self.preset {
            Preset::None => {}
            Preset::Minimal => {
                img = run_step("grayscale", img, &mut timings, steps::grayscale::apply)?;
            }
            Preset::Document => {
                img = run_step("grayscale", img, &mut timings, steps::grayscale::apply)?;
                img = run_step("resize", img, &mut timings, steps::resize::apply)?;
                img = run_step("normalize", img, &mut timings, steps::normalize::apply)?;
                img = run_step("sharpen", img, &mut timings, steps::sharpen::apply)?;
            }
        }

        let scale = if orig_width == 0 || orig_height == 0 {
            (1.0, 1.0)
        } else {
            (
                img.width() as f32 / orig_width as f32,
                img.height() as f32 / orig_height as f32,
            )
        };

        Ok(Preprocessed {
            image: img,
            stats: PreprocessingStats {
                preset: self.preset.as_str().to_string(),
                total_time_ms: start.elapsed().as_millis() as u64,
                steps: timings,
                scale,
            },
        })
    }
}

fn run_step<F>(
    name: &str,
    img: DynamicImage,
    timings: &mut Vec<StepTiming>,
    step_fn: F,
) -> Result<DynamicImage, OcrError>
where
    F: FnOnce(DynamicImage) -> Result<DynamicImage, OcrError>,
{
    let step_start = Instant::now();
    let result = step_fn(img)?;
    tracing::trace!("preprocessing step {} done", name);
    timings.push(StepTiming {
        name: name.to_string(),
        time_ms: step_start.elapsed().as_millis() as u64,
    });
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_preset_parse() {
        assert_eq!(Preset::parse("Document"), Some(Preset::Document));
        assert_eq!(Preset::parse(" none "), Some(Preset::None));
        assert_eq!(Preset::parse("aggressive"), None);
        assert_eq!(Preset::names(), vec!["none", "minimal", "document"]);
    }

    #[test]
    fn test_none_keeps_image_and_unit_scale() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let out = Pipeline::new(Preset::None).process(img).unwrap();
        assert!(matches!(out.image, DynamicImage::ImageRgb8(_)));
        assert!(out.stats.steps.is_empty());
        assert_eq!(out.stats.scale, (1.0, 1.0));
    }

    #[test]
    fn test_minimal_runs_grayscale_only() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let out = Pipeline::new(Preset::Minimal).process(img).unwrap();
        let names: Vec<_> = out.stats.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["grayscale"]);
        assert_eq!(out.stats.preset, "minimal");
    }

    #[test]
    fn test_document_reports_scale() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(200, 60));
        let out = Pipeline::new(Preset::Document).process(img).unwrap();
        let names: Vec<_> = out.stats.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["grayscale", "resize", "normalize", "sharpen"]);
        assert_eq!(out.stats.scale, (8.0, 8.0));
    }
}
