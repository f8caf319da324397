use anyhow::{bail, Context};
use balltrack::{
    ColorPreset, Config, FanoutSink, FramePipeline, SourceKind, StopReason, VideoFileSink,
    WindowSink,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "balltrack",
    about = "Track a colored ball in a video stream and draw its trail",
    version = "0.1.0"
)]
struct Args {
    /// Path to the (optional) video file; the webcam is used when omitted
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Max trail buffer size [default: 64]
    #[arg(short, long)]
    buffer: Option<usize>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ball color preset
    #[arg(long, value_enum)]
    color: Option<ColorPreset>,

    /// Camera device index
    #[arg(long)]
    camera: Option<i32>,

    /// Also write annotated frames to this video file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Do not open a display window (needs --video)
    #[arg(long)]
    headless: bool,

    /// Draw frame number and FPS on the output
    #[arg(long)]
    info: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(buffer) = self.buffer {
            config.buffer = buffer;
        }
        if let Some(color) = self.color {
            config.color = color.range();
        }
        if let Some(camera) = self.camera {
            config.camera_index = camera;
        }
        config.show_info |= self.info;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let config = args.to_config()?;

    let kind = SourceKind::from_video_arg(args.video.clone(), config.camera_index);
    if args.headless && !kind.is_file() {
        bail!("--headless needs --video; a camera stream could never be stopped");
    }

    let mut sink = FanoutSink::new();
    if !args.headless {
        sink.push(Box::new(WindowSink::new(&config.window_name)?));
    }
    if let Some(output) = &args.output {
        sink.push(Box::new(VideoFileSink::new(output, args.fps)));
    }
    if sink.is_empty() {
        bail!("--headless without --output would discard every frame");
    }

    let mut source = kind
        .open(Duration::from_millis(config.warmup_ms))
        .context("failed to open video source")?;

    info!(
        buffer = config.buffer,
        lower = ?config.color.lower,
        upper = ?config.color.upper,
        "tracking started, press '{}' to quit",
        config.quit_key
    );
    let mut pipeline = FramePipeline::new(&config);
    let summary = pipeline.run(&mut source, &mut sink)?;

    match summary.reason {
        StopReason::EndOfStream => info!(frames = summary.frames, "video finished"),
        StopReason::Cancelled => info!(frames = summary.frames, "stopped by user"),
    }
    Ok(())
}
