//! Bus Label Detector - YOLO label detection with per-region OCR
//!
//! Loads a test image, finds bus labels with a YOLO model, reads the text in
//! every label concurrently and shows the result as an overlay. Runs as a
//! desktop viewer or headless from the command line.

mod assets;
mod config;
mod dashboard;
mod overlay;
mod pipeline;
mod vision;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::assets::AssetBundle;
use crate::config::AppConfig;
use crate::dashboard::TestImageSource;
use crate::overlay::{layout, raster, EstimatedMetrics, OverlayShape};
use crate::pipeline::{DetectionPipeline, Driver, RecognitionPolicy};
use crate::vision::detection::YoloDetector;
use crate::vision::ocr::PaddleRecognizer;
use crate::vision::{describe, DetectionError, Size, SourceImage};

/// Bus Label Detector - find bus labels and read their text
#[derive(Parser, Debug)]
#[command(name = "bus-label-detector")]
#[command(about = "Detect bus labels with YOLO and read them with OCR")]
struct Args {
    /// Configuration file (defaults to config.toml in the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image to process instead of the bundled test image
    #[arg(long)]
    image: Option<PathBuf>,

    /// Run one detection cycle without a window and print the results as JSON
    #[arg(long)]
    headless: bool,

    /// Annotated image written in headless mode
    #[arg(short, long, default_value = "annotated.png")]
    output: PathBuf,

    /// Canvas size WIDTHxHEIGHT for the overlay layout in headless mode
    /// (defaults to the image size)
    #[arg(long, value_parser = parse_canvas)]
    canvas: Option<(u32, u32)>,

    /// Keep detections whose text recognition failed instead of failing the cycle
    #[arg(long)]
    partial_results: bool,

    /// Write the effective configuration to this file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_canvas(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("invalid width: {}", e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("invalid height: {}", e))?;
    if w == 0 || h == 0 {
        return Err("canvas dimensions must be non-zero".to_string());
    }
    Ok((w, h))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over -v
    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bus_label_detector={},ort=warn", level)));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Bus Label Detector starting...");

    let mut config = load_config_or_default(args.config.as_deref())?;
    if args.partial_results {
        config.pipeline.policy = RecognitionPolicy::PartialResults;
    }
    info!("Recognition policy: {:?}", config.pipeline.policy);

    if let Some(path) = &args.write_config {
        config::save_config(&config, path).with_context(|| format!("Failed to write config {:?}", path))?;
        info!("Configuration written to {:?}", path);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let assets = AssetBundle::new(config.assets.dir.clone());
    info!("Asset bundle: {:?}", assets.root());
    let test_image = match &args.image {
        Some(path) => TestImageSource::File(path.clone()),
        None => TestImageSource::Bundled {
            assets: assets.clone(),
            name: config.assets.test_image.clone(),
        },
    };

    let pipeline = build_pipeline(&assets, &config);

    if args.headless {
        run_headless(&runtime, pipeline, &test_image, &config, args.canvas, &args.output)
    } else {
        let driver = Driver::new(pipeline, runtime.handle().clone());
        if let Err(e) = dashboard::app::run_dashboard(driver, test_image, config.overlay) {
            error!("Dashboard error: {}", e);
        }
        info!("Bus Label Detector shutdown complete");
        Ok(())
    }
}

/// Load configuration from `--config`, the user config dir, or defaults
fn load_config_or_default(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path).with_context(|| format!("Failed to load config {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_dir) = config::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring invalid configuration {:?}: {}", config_path, e),
            }
        }
    }

    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Load both models; a failure is reported on every detection request
fn build_pipeline(assets: &AssetBundle, config: &AppConfig) -> Result<DetectionPipeline, DetectionError> {
    let detector = YoloDetector::load(assets, &config.detector)?;
    let recognizer = PaddleRecognizer::load(assets, &config.recognizer)?;
    Ok(DetectionPipeline::new(
        Arc::new(detector),
        Arc::new(recognizer),
        config.pipeline.policy,
    ))
}

/// One detection cycle: JSON on stdout, annotated image on disk
fn run_headless(
    runtime: &tokio::runtime::Runtime,
    pipeline: Result<DetectionPipeline, DetectionError>,
    test_image: &TestImageSource,
    config: &AppConfig,
    canvas: Option<(u32, u32)>,
    output: &Path,
) -> Result<()> {
    let report = |e: DetectionError| {
        let message = describe(&e);
        error!("{}", message);
        anyhow!(message)
    };

    let pipeline = pipeline.map_err(report)?;
    let image: SourceImage = match test_image {
        TestImageSource::Bundled { assets, name } => assets.load_test_image(name)?,
        TestImageSource::File(path) => SourceImage::open(path).map_err(report)?,
    };

    let detections = runtime.block_on(pipeline.run(&image)).map_err(report)?;
    info!("Found {} labels", detections.len());

    let annotated = raster::render_annotated(&image, &detections, &config.overlay);
    annotated
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Annotated image written to {:?}", output);

    let canvas = canvas
        .map(|(w, h)| Size::new(w as f32, h as f32))
        .unwrap_or_else(|| image.size());
    let outlines = layout(canvas, image.size(), &detections, &config.overlay, &EstimatedMetrics)
        .into_iter()
        .filter_map(|shape| match shape {
            OverlayShape::Outline { rect } => Some(rect),
            OverlayShape::Label { .. } => None,
        });

    let entries: Vec<_> = detections
        .iter()
        .zip(outlines)
        .map(|(detection, display)| {
            serde_json::json!({
                "id": detection.id,
                "confidence": detection.confidence,
                "recognized_text": detection.recognized_text,
                "bounding_box": detection.bounding_box,
                "display_rect": display,
            })
        })
        .collect();

    let report = serde_json::json!({
        "image": image.size(),
        "canvas": canvas,
        "detections": entries,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
