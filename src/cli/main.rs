//! Face blur CLI tool
//!
//! Command-line interface over [`FaceBlurProcessor`]: detect or draw faces,
//! pick which to blur, write `<stem>_BLURRED<ext>`.

use super::config::CliConfigBuilder;
use crate::{
    cache::{ModelCache, CACHE_DIR_ENV},
    config::SelectionMode,
    display::default_surface,
    download::ModelDownloader,
    models::{ModelSource, DEFAULT_MODEL_FILE, DEFAULT_MODEL_URL},
    processor::{FaceBlurProcessor, ProcessorConfig},
    tracing_config::{events, init_cli_tracing, spans},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use tracing::Instrument;

/// Blur faces in a photo, found automatically or drawn by hand
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "faceblur")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Path to the input image
    #[arg(value_name = "IMAGE", required_unless_present_any = ["show_providers", "show_cache_dir", "download_model"])]
    pub image: Option<PathBuf>,

    /// Draw face regions by hand instead of running the detector
    #[arg(short, long)]
    pub manual: bool,

    /// Output file [default: <stem>_BLURRED<ext> in the current directory]
    #[arg(short, long, value_name = "OUT")]
    pub out: Option<PathBuf>,

    /// How selected faces are obscured
    #[arg(long, value_enum, default_value_t = CliStrategy::Ellipse)]
    pub strategy: CliStrategy,

    /// Box blur window size in pixels
    #[arg(long, default_value_t = 30)]
    pub kernel_size: u32,

    /// Which overlapping candidates a click toggles
    #[arg(long, value_enum, default_value_t = CliTogglePolicy::All)]
    pub toggle_policy: CliTogglePolicy,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Path to a detector ONNX file [default: cached UltraFace RFB-320]
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Detector input resolution as WIDTHxHEIGHT; must match the model (RFB-640 takes 640x480)
    #[arg(long, value_name = "WxH", default_value = "320x240", value_parser = parse_input_size)]
    pub input_size: (u32, u32),

    /// Minimum detector confidence for a face candidate
    #[arg(long, default_value_t = 0.7)]
    pub confidence: f32,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Load face candidates from a JSON regions file instead of detecting them
    #[arg(long, value_name = "JSON")]
    pub regions: Option<PathBuf>,

    /// Write the blurred regions to a JSON file
    #[arg(long, value_name = "JSON")]
    pub export_regions: Option<PathBuf>,

    /// Skip the selection and preview windows
    #[arg(long)]
    pub no_gui: bool,

    /// Download the default detector model and exit
    #[arg(long)]
    pub download_model: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Show the model cache directory and exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    /// Blur inside each face's inscribed ellipse
    Ellipse,
    /// Blur each face's bounding rectangle
    Rectangle,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliTogglePolicy {
    /// A click toggles every face under the pointer
    All,
    /// A click toggles only the first face under the pointer
    First,
}

fn parse_input_size(value: &str) -> std::result::Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let parse = |side: &str| side.trim().parse::<u32>().map_err(|e| format!("invalid size '{side}': {e}"));
    Ok((parse(width)?, parse(height)?))
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (_guard, session_id) = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    // Handle special flags that don't require an input
    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    if cli.show_cache_dir {
        return show_current_cache_dir();
    }

    if cli.download_model {
        let path = download_default_model().await?;
        println!("Model cached at {}", path.display());
        return Ok(());
    }

    let input = cli.image.clone().context("An input image is required")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let output = CliConfigBuilder::output_path(&cli);

    if config.mode == SelectionMode::Manual && !config.interactive {
        events::warning_with_recommendation(
            "Manual mode without a window has no way to draw regions; the output will match the input",
            "drop --no-gui",
        );
    }

    ensure_model_available(&config).await?;

    let _session = spans::session(&session_id, &format!("{:?}", config.mode), &cli.execution_provider).entered();
    info!("Input: {}", input.display());
    info!("Backend: {:?}, Provider: {}", config.backend_type, config.detector.execution_provider);

    let mut processor = FaceBlurProcessor::new(config).context("Failed to create processor")?;
    let mut surface = default_surface(processor.config().interactive);

    let _file_span = spans::file_processing(&input, &output).entered();
    let result = match processor.process_file(&input, &output, surface.as_mut()) {
        Ok(result) => result,
        Err(e) => {
            events::error_with_context(&e, "processing image");
            return Err(e).with_context(|| format!("Failed to blur faces in {}", input.display()));
        },
    };

    info!(
        "Blurred {} of {} candidate(s) in {}ms",
        result.regions.len(),
        result.candidates.len(),
        result.timings.total_ms
    );
    Ok(())
}

/// Download the default model when this run needs it and the cache lacks it
async fn ensure_model_available(config: &ProcessorConfig) -> Result<()> {
    if !config.needs_model() {
        return Ok(());
    }
    let ModelSource::Cached(file_name) = &config.model_source else {
        return Ok(());
    };

    let cache = ModelCache::new().context("Failed to initialize model cache")?;
    if cache.is_model_cached(file_name) {
        return Ok(());
    }
    if file_name != DEFAULT_MODEL_FILE {
        anyhow::bail!(
            "Model '{}' is not cached in {} and has no known download URL",
            file_name,
            cache.get_current_cache_dir().display()
        );
    }

    info!("Detector model not cached yet; downloading it once");
    download_default_model().await?;
    Ok(())
}

async fn download_default_model() -> Result<PathBuf> {
    let downloader = ModelDownloader::new().context("Failed to create model downloader")?;
    downloader
        .download_model(DEFAULT_MODEL_URL, DEFAULT_MODEL_FILE, true)
        .instrument(spans::model_download(DEFAULT_MODEL_URL))
        .await
        .context("Failed to download detector model")
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("Backend and Execution Provider Diagnostics");
    println!("==========================================");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nExecution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "available"
        } else {
            "not available"
        };
        println!(
            "  {:<12} {:<14} {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\nUsage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:cuda    # Use NVIDIA CUDA");
    println!("  --execution-provider tract:cpu    # Use pure Rust Tract backend");
}

/// Show the current cache directory
fn show_current_cache_dir() -> Result<()> {
    let cache = ModelCache::new().context("Failed to access cache directory")?;
    println!("Model cache: {}", cache.get_current_cache_dir().display());

    if std::env::var_os(CACHE_DIR_ENV).is_some() {
        println!("Source: {CACHE_DIR_ENV} environment variable");
    } else {
        println!("Source: platform cache directory (set {CACHE_DIR_ENV} to override)");
    }

    let models = cache.scan_cached_models().context("Failed to list cached models")?;
    if models.is_empty() {
        println!("No models cached. Run `faceblur --download-model` to fetch the default detector.");
    }
    for model in models {
        println!(
            "  {} ({}{})",
            model.file_name,
            crate::cache::format_size(model.size_bytes),
            if model.has_checksum { ", verified" } else { "" }
        );
    }
    Ok(())
}
