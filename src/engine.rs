use crate::error::OcrError;
use crate::preprocessing::{Pipeline, PreprocessingStats};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Four corners in image pixel coordinates, clockwise from top-left
pub type Polygon = [[f32; 2]; 4];

/// A single detected text region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    pub polygon: Polygon,
    pub text: String,
    pub confidence: f32,
}

impl TextRegion {
    /// Build a region from an axis-aligned rectangle
    pub fn from_rect(
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        text: String,
        confidence: f32,
    ) -> Self {
        Self {
            polygon: [[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Map coordinates from a resized image back onto the source image
    pub fn unscaled(mut self, (scale_x, scale_y): (f32, f32)) -> Self {
        if scale_x > 0.0 && scale_y > 0.0 {
            for corner in self.polygon.iter_mut() {
                corner[0] /= scale_x;
                corner[1] /= scale_y;
            }
        }
        self
    }
}

/// OCR processing result
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub regions: Vec<TextRegion>,
    pub text: String,
    pub confidence: f32,
    pub warnings: Vec<String>,
}

impl OcrResult {
    pub fn from_regions(regions: Vec<TextRegion>) -> Self {
        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.confidence).sum::<f32>() / regions.len() as f32
        };

        let mut warnings = Vec::new();
        if regions.is_empty() {
            warnings.push("No text could be detected in this image".to_string());
        }

        Self {
            regions,
            text,
            confidence,
            warnings,
        }
    }
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Detect and recognize text regions in a decoded image
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError>;

    /// Get supported MIME types
    fn supported_formats(&self) -> Vec<String>;
}

/// Result of running the pipeline and the engine over one image
#[derive(Debug)]
pub struct Extraction {
    pub result: OcrResult,
    pub preprocessing: PreprocessingStats,
}

/// Preprocess `image`, run the engine, and report regions in source coordinates
pub fn extract(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    pipeline: &Pipeline,
) -> Result<Extraction, OcrError> {
    let prepared = pipeline.process(image.clone())?;
    let scale = prepared.stats.scale;

    let regions = engine
        .recognize(&prepared.image)?
        .into_iter()
        .filter(|r| !r.text.trim().is_empty())
        .map(|r| r.unscaled(scale))
        .collect::<Vec<_>>();

    tracing::debug!(
        "{} detected {} regions (preset: {})",
        engine.name(),
        regions.len(),
        prepared.stats.preset
    );

    Ok(Extraction {
        result: OcrResult::from_regions(regions),
        preprocessing: prepared.stats,
    })
}

type EngineFactory = dyn Fn() -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync;

/// Builds the engine once on first use and hands out the same instance afterwards
pub struct EngineCell {
    name: &'static str,
    cell: OnceCell<Arc<dyn OcrEngine>>,
    factory: Arc<EngineFactory>,
}

impl EngineCell {
    pub fn lazy<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync + 'static,
    {
        Self {
            name,
            cell: OnceCell::new(),
            factory: Arc::new(factory),
        }
    }

    /// Wrap an engine that is already constructed
    pub fn ready(engine: Arc<dyn OcrEngine>) -> Self {
        let name = engine.name();
        let factory_engine = engine.clone();
        Self {
            name,
            cell: OnceCell::new_with(Some(engine)),
            factory: Arc::new(move || Ok(factory_engine.clone())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The engine, if it has been constructed already
    pub fn loaded(&self) -> Option<Arc<dyn OcrEngine>> {
        self.cell.get().cloned()
    }

    /// Get the engine, constructing it on the blocking pool if needed
    pub async fn get(&self) -> Result<Arc<dyn OcrEngine>, OcrError> {
        let engine = self
            .cell
            .get_or_try_init(|| async {
                tracing::info!("Loading {} engine...", self.name);
                let factory = self.factory.clone();
                tokio::task::spawn_blocking(move || (*factory)())
                    .await
                    .map_err(|e| {
                        OcrError::Internal(format!("Engine initialization task failed: {}", e))
                    })?
            })
            .await?;

        Ok(engine.clone())
    }
}
