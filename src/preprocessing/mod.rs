//! Optional image cleanup applied before OCR inference
//!
//! Presets trade latency for accuracy on low-contrast or small inputs such as
//! cropped license plates. Region coordinates are always reported against the
//! original upload, so the pipeline records how much it rescaled the image.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, PreprocessingStats, Preset};
