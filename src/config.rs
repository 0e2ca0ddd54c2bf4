use crate::preprocessing::Preset;
use crate::Args;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    /// Where the detection/recognition models are cached
    pub model_dir: PathBuf,
    pub font_path: Option<PathBuf>,
    pub default_preset: Preset,
    pub preload: bool,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let default_preset = Preset::parse(&args.preset).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown preprocessing preset '{}' (expected one of: {})",
                args.preset,
                Preset::names().join(", ")
            )
        })?;

        Ok(Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            model_dir: args.model_dir.unwrap_or_else(default_model_dir),
            font_path: args.font_path,
            default_preset,
            preload: args.preload,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_file_size: 20 * 1024 * 1024,
            model_dir: default_model_dir(),
            font_path: None,
            default_preset: Preset::None,
            preload: false,
        }
    }
}

fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ocr-gate-server")
}
