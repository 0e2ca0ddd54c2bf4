//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. Detection and recognition
//! models are downloaded into the model directory on first use.

use crate::config::Config;
use crate::engine::{OcrEngine, TextRegion};
use crate::error::OcrError;
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";
/// Upper bound on a downloaded model
const MAX_MODEL_BYTES: u64 = 200 * 1024 * 1024;

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Load (downloading if needed) both models and build the engine
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let detection_model_path = ensure_model_downloaded(
            DETECTION_MODEL_URL,
            &config.model_dir,
            "text-detection.rten",
        )?;
        let recognition_model_path = ensure_model_downloaded(
            RECOGNITION_MODEL_URL,
            &config.model_dir,
            "text-recognition.rten",
        )?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        tracing::info!("ocrs engine initialized successfully");

        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - English/Latin text, no system dependencies required"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        // ImageSource::from_bytes expects HWC RGB8
        let rgb_img = image.to_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OcrError::ProcessingError(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;

        let line_rects = self.engine.find_text_lines(&ocr_input, &word_rects);

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let regions = line_texts
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line
                    .words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.trim().is_empty() {
                    return None;
                }

                let rect = line.bounding_rect();
                let left = rect.left() as f32;
                let top = rect.top() as f32;
                let right = left + rect.width() as f32;
                let bottom = top + rect.height() as f32;

                let confidence = calculate_confidence(&text);
                Some(TextRegion::from_rect(left, top, right, bottom, text, confidence))
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "ocrs recognized {} of {} candidate lines",
            regions.len(),
            line_rects.len()
        );

        Ok(regions)
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["image/png".to_string(), "image/jpeg".to_string()]
    }
}

// ============================================================================
// Confidence scoring heuristics
// ============================================================================

/// Score a recognized line by how plausible its characters look.
///
/// ocrs does not report per-line scores, so this stands in for one. Lines
/// here are short (a sign, a plate), so digits count as much as letters.
fn calculate_confidence(text: &str) -> f32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed.chars().count() < 3 {
        return 0.4;
    }

    let symbols = symbol_score(trimmed);
    let tokens = token_score(trimmed);
    let runs = run_score(trimmed);

    (0.55 * symbols + 0.25 * tokens + 0.2 * runs).clamp(0.0, 1.0)
}

/// Share of characters that are alphanumeric, whitespace or common punctuation.
///
/// Stray symbols (`§`, `¤`, box-drawing) are the clearest sign of garbage.
fn symbol_score(text: &str) -> f32 {
    let total = text.chars().count() as f32;
    let odd = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation())
        .count() as f32;
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count() as f32;

    let odd_penalty = 1.0 - (odd / total * 8.0).min(1.0);
    let alnum_share = (alnum / total * 1.25).min(1.0);

    0.6 * odd_penalty + 0.4 * alnum_share
}

/// Penalize lines made mostly of one-character tokens.
fn token_score(text: &str) -> f32 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return 0.0;
    }

    let singles = tokens.iter().filter(|t| t.chars().count() == 1).count() as f32;
    let single_share = singles / tokens.len() as f32;

    let longest = tokens.iter().map(|t| t.chars().count()).max().unwrap_or(0);
    let length_score = match longest {
        0..=1 => 0.3,
        2..=15 => 1.0,
        16..=25 => 0.7,
        _ => 0.4,
    };

    length_score * (1.0 - (single_share * 0.8))
}

/// Long runs of one repeated character usually mean the recognizer stuttered.
fn run_score(text: &str) -> f32 {
    let mut longest = 0;
    let mut current = 0;
    let mut prev = None;

    for c in text.chars().filter(|c| !c.is_whitespace()) {
        current = if Some(c) == prev { current + 1 } else { 1 };
        longest = longest.max(current);
        prev = Some(c);
    }

    match longest {
        0..=3 => 1.0,
        4..=5 => 0.7,
        6..=9 => 0.4,
        _ => 0.1,
    }
}

// ============================================================================
// Model download
// ============================================================================

/// Ensure model is present in `dir` and return its path
fn ensure_model_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create model directory: {}", e))
    })?;

    let model_path = dir.join(filename);

    if model_path.exists() {
        tracing::info!("Using cached model from {:?}", model_path);
    } else {
        tracing::info!("Downloading {} (this may take a moment)...", filename);
        download_file(url, &model_path)?;
        tracing::info!("Downloaded {} to {:?}", filename, model_path);
    }

    Ok(model_path)
}

/// Download to a sibling temp path, then rename so a partial file is never cached
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download model: {}", e)))?;

    let mut body = response.into_body();
    let buffer = body.with_config().limit(MAX_MODEL_BYTES).read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create model file: {}", e))
    })?;
    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write model file: {}", e)))?;

    std::fs::rename(&partial, path)
        .map_err(|e| OcrError::InitializationError(format!("Failed to store model file: {}", e)))?;

    Ok(())
}
