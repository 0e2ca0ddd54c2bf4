use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod annotate;
mod config;
mod engine;
mod engines;
mod error;
mod plates;
mod preprocessing;
mod server;
mod ui;

#[derive(Parser, Debug)]
#[command(name = "ocr-gate-server")]
#[command(about = "OCR text extractor and license-plate gate")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "8501")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 20MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// Directory holding the detection/recognition models (defaults to the user cache dir)
    #[arg(long, env = "OCR_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// TrueType/OpenType font used for region labels on annotated images
    #[arg(long, env = "OCR_FONT_PATH")]
    pub font_path: Option<PathBuf>,

    /// Preprocessing preset applied when a request does not pick one (none, minimal, document)
    #[arg(long, env = "OCR_PRESET", default_value = "none")]
    pub preset: String,

    /// Load the OCR models at startup instead of on the first request
    #[arg(long, env = "OCR_PRELOAD")]
    pub preload: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::try_from(args)?;

    tracing::info!("Starting ocr-gate-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}
