pub mod config;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod trail;
pub mod utils;
pub mod visualization;

// Re-export main types
pub use crate::config::{ColorPreset, ColorRange, Config};
pub use crate::detection::{BallDetector, Detection};
pub use crate::error::{Result, TrackError};
pub use crate::pipeline::{FramePipeline, FrameReport, RunState, RunSummary, StopReason};
pub use crate::sink::{FanoutSink, FrameSink, VideoFileSink, WindowSink};
pub use crate::source::{CameraSource, FileSource, FrameSource, SourceKind};
pub use crate::trail::TrailBuffer;
