//! OCR engine implementations
//!
//! Engines are conditionally compiled based on feature flags. Whichever one
//! is built is wrapped in an [`EngineCell`] so its models load only once.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

use crate::config::Config;
use crate::engine::EngineCell;

/// Lazily constructed ocrs engine
#[cfg(feature = "engine-ocrs")]
pub fn default_engine(config: &Config) -> EngineCell {
    use crate::engine::OcrEngine;
    use std::sync::Arc;

    let config = config.clone();
    EngineCell::lazy("ocrs", move || {
        let engine = ocrs::OcrsEngine::new(&config)?;
        Ok(Arc::new(engine) as Arc<dyn OcrEngine>)
    })
}

#[cfg(not(feature = "engine-ocrs"))]
pub fn default_engine(_config: &Config) -> EngineCell {
    use crate::error::OcrError;

    EngineCell::lazy("none", || {
        Err(OcrError::InitializationError(
            "No OCR engines available. Build with --features engine-ocrs".to_string(),
        ))
    })
}
