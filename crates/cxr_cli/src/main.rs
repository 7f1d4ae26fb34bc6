//! cxr-rs CLI: classify chest X-rays and render Grad-CAM overlays.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use cxr_core::encode_png;
use cxr_infer::{InferencePipeline, PipelineConfig};
use cxr_models::{load_model, CxrNet, CxrNetConfig};

/// Backend type for inference; gradients are needed for explanations.
type InferBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "cxr")]
#[command(author, version)]
#[command(about = "Chest X-ray classification with Grad-CAM explanations")]
#[command(long_about = "cxr-rs: classify a chest X-ray as normal, viral or bacterial pneumonia
and highlight the regions that drove a pneumonia prediction.

EXAMPLES:
  # Classify an image and print the JSON report
  cxr analyze chest.png --weights cxrnet.mpk --pretty

  # Also write the heatmap overlay
  cxr analyze chest.png --weights cxrnet.mpk --overlay chest_cam.png

  # Show the default configuration
  cxr config > cxr.json")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image and explain the prediction
    Analyze {
        /// Image file (JPEG, PNG, GIF, WebP, BMP or TIFF)
        image: PathBuf,

        /// Model weights written by `save_model`
        #[arg(long, value_name = "FILE")]
        weights: Option<PathBuf>,

        /// Pipeline configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Minimum heatmap intensity kept
        #[arg(long, value_name = "T")]
        threshold: Option<f32>,

        /// Overlay opacity
        #[arg(long, value_name = "A")]
        alpha: Option<f32>,

        /// Where to write the overlay PNG
        #[arg(long, value_name = "OUT.png")]
        overlay: Option<PathBuf>,

        /// Pretty-print the JSON report
        #[arg(long, default_value = "false")]
        pretty: bool,
    },
    /// Print the default configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Analyze {
            image,
            weights,
            config,
            threshold,
            alpha,
            overlay,
            pretty,
        } => handle_analyze(
            &image,
            weights.as_deref(),
            config.as_deref(),
            threshold,
            alpha,
            overlay.as_deref(),
            pretty,
        ),
        Commands::Config => {
            let json = serde_json::to_string_pretty(&PipelineConfig::default())?;
            println!("{json}");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, threshold: Option<f32>, alpha: Option<f32>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(threshold) = threshold {
        config = config.with_threshold(threshold);
    }
    if let Some(alpha) = alpha {
        config = config.with_alpha(alpha);
    }
    config.validate()?;
    Ok(config)
}

fn load_classifier(
    weights: Option<&Path>,
    n_classes: usize,
    device: &<InferBackend as Backend>::Device,
) -> Result<CxrNet<InferBackend>> {
    let model_config = CxrNetConfig::new(n_classes);
    match weights {
        Some(path) => load_model(&model_config, path, device)
            .with_context(|| format!("Failed to load weights from {}", path.display())),
        None => {
            tracing::warn!("no weights given, using an untrained model");
            Ok(model_config.init(device))
        }
    }
}

fn handle_analyze(
    image: &Path,
    weights: Option<&Path>,
    config: Option<&Path>,
    threshold: Option<f32>,
    alpha: Option<f32>,
    overlay: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let config = load_config(config, threshold, alpha)?;
    let device = <InferBackend as Backend>::Device::default();
    let model = load_classifier(weights, config.class_set.len(), &device)?;
    let pipeline = InferencePipeline::<InferBackend, _>::new(model, config, device)?;

    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let result = pipeline.analyze_bytes(&bytes)?;

    if let Some(out) = overlay {
        match &result.explanation {
            Some(explanation) => {
                let png = encode_png(&explanation.overlay)?;
                std::fs::write(out, png)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                tracing::info!(path = %out.display(), "overlay written");
            }
            None => tracing::warn!(
                diagnosis = %result.diagnosis,
                "no explanation for this prediction, overlay not written"
            ),
        }
    }

    let report = result.report();
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
