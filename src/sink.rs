//! Frame consumers: a display window, a video file, or several at once.

use opencv::{
    core::{Mat, Size},
    highgui,
    prelude::*,
    videoio::VideoWriter,
};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, TrackError};

pub trait FrameSink {
    fn present(&mut self, frame: &Mat) -> Result<()>;

    /// One non-blocking keyboard poll. Sinks without input return `None`.
    fn poll_key(&mut self) -> Result<Option<char>> {
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Turn a `wait_key` code into a character; -1 means no key.
pub fn key_from_code(code: i32) -> Option<char> {
    if code < 0 {
        return None;
    }
    char::from_u32((code & 0xFF) as u32)
}

/// HighGUI window.
pub struct WindowSink {
    name: String,
    open: bool,
}

impl WindowSink {
    pub fn new(name: &str) -> Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_string(),
            open: true,
        })
    }
}

impl FrameSink for WindowSink {
    fn present(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.name, frame)?;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<char>> {
        Ok(key_from_code(highgui::wait_key(1)?))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            highgui::destroy_all_windows()?;
            self.open = false;
        }
        Ok(())
    }
}

/// Writes annotated frames to a video file. The writer is opened lazily
/// because the output size is only known after the first resize.
pub struct VideoFileSink {
    path: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
    frames_written: u64,
}

impl VideoFileSink {
    pub fn new(path: impl AsRef<Path>, fps: f64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fps: if fps > 0.0 { fps } else { 30.0 },
            writer: None,
            frames_written: 0,
        }
    }

    fn open_writer(&self, size: Size) -> Result<VideoWriter> {
        let path = self.path.to_string_lossy().to_string();
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(&path, fourcc, self.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(TrackError::OpenSink { path });
        }
        info!(path = %self.path.display(), width = size.width, height = size.height, "writing annotated video");
        Ok(writer)
    }
}

impl FrameSink for VideoFileSink {
    fn present(&mut self, frame: &Mat) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.open_writer(frame.size()?)?);
        }
        if let Some(writer) = &mut self.writer {
            writer.write(frame)?;
            self.frames_written += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
            info!(path = %self.path.display(), frames = self.frames_written, "closed video writer");
        }
        Ok(())
    }
}

/// Presents to every inner sink and reports the first key any of them saw.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn FrameSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl FrameSink for FanoutSink {
    fn present(&mut self, frame: &Mat) -> Result<()> {
        for sink in &mut self.sinks {
            sink.present(frame)?;
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<char>> {
        let mut pressed = None;
        for sink in &mut self.sinks {
            let key = sink.poll_key()?;
            if pressed.is_none() {
                pressed = key;
            }
        }
        Ok(pressed)
    }

    fn close(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.close()?;
        }
        Ok(())
    }
}
