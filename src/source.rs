//! Frame sources: a live camera or a video file behind one trait.

use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackError};

/// Something that hands out BGR frames one at a time.
pub trait FrameSource {
    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Mat>>;

    /// Release the underlying device or file. Safe to call more than once.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        (**self).next_frame()
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}

fn warm_up(warmup: Duration) {
    if !warmup.is_zero() {
        debug!(?warmup, "waiting for video source to warm up");
        thread::sleep(warmup);
    }
}

/// How long a camera may keep handing back empty grabs before it is
/// considered gone.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_empty_grabs: u32,
    pub warn_after: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_empty_grabs: 200,
            warn_after: 20,
            backoff: Duration::from_millis(10),
        }
    }
}

/// Call `read` until it yields a non-empty frame, sleeping between empty
/// grabs. Gives up with `OpenSource` once the policy is exhausted.
pub fn grab_with_retry<F>(uri: &str, policy: &RetryPolicy, mut read: F) -> Result<Mat>
where
    F: FnMut(&mut Mat) -> Result<bool>,
{
    let mut frame = Mat::default();
    for attempt in 1..=policy.max_empty_grabs {
        if read(&mut frame)? && !frame.empty() {
            if attempt > policy.warn_after {
                info!(uri, attempt, "video source recovered");
            }
            return Ok(frame);
        }
        if attempt == policy.warn_after {
            warn!(uri, attempts = attempt, "video source keeps returning empty frames");
        }
        if !policy.backoff.is_zero() {
            thread::sleep(policy.backoff);
        }
    }
    Err(TrackError::OpenSource {
        uri: uri.to_string(),
    })
}

/// Live camera. Never reports end of stream; empty grabs are retried up to
/// the retry policy, after which the camera counts as lost.
pub struct CameraSource {
    cap: VideoCapture,
    index: i32,
    retry: RetryPolicy,
}

impl CameraSource {
    pub fn open(index: i32, warmup: Duration) -> Result<Self> {
        let cap = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(TrackError::OpenSource {
                uri: format!("camera:{index}"),
            });
        }
        info!(index, "opened camera");
        warm_up(warmup);
        Ok(Self {
            cap,
            index,
            retry: RetryPolicy::default(),
        })
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let uri = format!("camera:{}", self.index);
        let cap = &mut self.cap;
        let frame = grab_with_retry(&uri, &self.retry, |frame| {
            if !cap.is_opened()? {
                return Err(TrackError::OpenSource { uri: uri.clone() });
            }
            Ok(cap.read(frame)?)
        })?;
        Ok(Some(frame))
    }

    fn release(&mut self) -> Result<()> {
        if self.cap.is_opened()? {
            self.cap.release()?;
            info!(index = self.index, "released camera");
        }
        Ok(())
    }
}

/// Video file. Exhaustion and undecodable frames both end the stream.
pub struct FileSource {
    cap: VideoCapture,
    path: PathBuf,
    frames_read: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>, warmup: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let uri = path.to_string_lossy().to_string();
        let cap = VideoCapture::from_file(&uri, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(TrackError::OpenSource { uri });
        }
        let total = cap.get(videoio::CAP_PROP_FRAME_COUNT)?;
        let fps = cap.get(videoio::CAP_PROP_FPS)?;
        info!(path = %path.display(), total_frames = total, fps, "opened video file");
        warm_up(warmup);
        Ok(Self {
            cap,
            path,
            frames_read: 0,
        })
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        match self.cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {
                self.frames_read += 1;
                Ok(Some(frame))
            }
            Ok(_) => {
                info!(path = %self.path.display(), frames = self.frames_read, "end of video");
                Ok(None)
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "frame failed to decode, stopping");
                Ok(None)
            }
        }
    }

    fn release(&mut self) -> Result<()> {
        if self.cap.is_opened()? {
            self.cap.release()?;
            debug!(path = %self.path.display(), "released video file");
        }
        Ok(())
    }
}

/// Where frames come from, decided once at startup.
pub enum SourceKind {
    Camera { index: i32 },
    File { path: PathBuf },
}

impl SourceKind {
    pub fn from_video_arg(video: Option<PathBuf>, camera_index: i32) -> Self {
        match video {
            Some(path) => SourceKind::File { path },
            None => SourceKind::Camera {
                index: camera_index,
            },
        }
    }

    pub fn open(&self, warmup: Duration) -> Result<Box<dyn FrameSource>> {
        Ok(match self {
            SourceKind::Camera { index } => Box::new(CameraSource::open(*index, warmup)?),
            SourceKind::File { path } => Box::new(FileSource::open(path, warmup)?),
        })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SourceKind::File { .. })
    }
}
