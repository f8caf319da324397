use anyhow::{bail, Context};
use balltrack::{ColorPreset, Config, FramePipeline};
use clap::Parser;
use opencv::{core::Vector, imgcodecs, prelude::*};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Run the ball detector on a single image.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Input image path
    #[arg(long)]
    input: PathBuf,
    /// Output image path
    #[arg(long, default_value = "output.jpg")]
    output: PathBuf,
    /// Path to a JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ball color preset
    #[arg(long, value_enum)]
    color: Option<ColorPreset>,
}

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(color) = args.color {
        config.color = color.range();
    }
    config.validate()?;

    let img = imgcodecs::imread(&args.input.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        bail!("failed to load image {}", args.input.display());
    }

    let mut pipeline = FramePipeline::new(&config);
    let report = pipeline.process_frame(&img)?;
    match &report.detection {
        Some(det) => println!(
            "ball at ({}, {}) radius {:.1} area {:.0}",
            det.centroid.x, det.centroid.y, det.radius, det.area
        ),
        None => println!("no ball found"),
    }

    imgcodecs::imwrite(
        &args.output.to_string_lossy(),
        &report.annotated,
        &Vector::new(),
    )?;
    Ok(())
}
