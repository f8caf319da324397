//! Per-frame processing and the acquire/process/present loop.

use opencv::{core::Mat, prelude::*};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detection::{BallDetector, Detection};
use crate::error::{Result, TrackError};
use crate::sink::FrameSink;
use crate::source::FrameSource;
use crate::trail::TrailBuffer;
use crate::utils;
use crate::visualization;

/// Result of pushing one frame through the pipeline.
#[derive(Debug)]
pub struct FrameReport {
    pub frame_id: u64,
    pub detection: Option<Detection>,
    /// Resized input with the detection and trail drawn on it.
    pub annotated: Mat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub detections: u64,
    pub reason: StopReason,
}

enum Step {
    Presented { found: bool, quit: bool },
    EndOfStream,
}

pub struct FramePipeline {
    detector: BallDetector,
    trail: TrailBuffer,
    resize_width: i32,
    marker_radius: i32,
    quit_key: char,
    show_info: bool,
    frame_id: u64,
    started: Option<Instant>,
}

impl FramePipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            detector: BallDetector::new(config),
            trail: TrailBuffer::new(config.buffer),
            resize_width: config.resize_width,
            marker_radius: config.marker_radius,
            quit_key: config.quit_key,
            show_info: config.show_info,
            frame_id: 0,
            started: None,
        }
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    /// Resize, detect, annotate and update the trail for one BGR frame.
    pub fn process_frame(&mut self, frame: &Mat) -> Result<FrameReport> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let mut annotated = utils::resize_to_width(frame, self.resize_width)?;

        let detection = self.detector.detect(&annotated)?;
        if let Some(det) = &detection {
            visualization::draw_detection(&mut annotated, det, self.marker_radius)?;
        }
        self.trail.push(detection.map(|det| det.centroid));
        visualization::draw_trail(&mut annotated, &self.trail)?;

        let frame_id = self.frame_id;
        self.frame_id += 1;

        if self.show_info {
            let elapsed = started.elapsed().as_secs_f64();
            let fps = if elapsed > 0.0 {
                self.frame_id as f64 / elapsed
            } else {
                0.0
            };
            visualization::draw_frame_info(&mut annotated, frame_id, fps)?;
        }

        match &detection {
            Some(det) => debug!(
                frame_id,
                x = det.centroid.x,
                y = det.centroid.y,
                radius = det.radius,
                "ball found"
            ),
            None => debug!(frame_id, "no ball"),
        }

        Ok(FrameReport {
            frame_id,
            detection,
            annotated,
        })
    }

    /// Drive frames from `source` to `sink` until the stream ends or the quit key is hit.
    ///
    /// Errors stop the run through `Draining` so the source and sink are
    /// still released; the first error is returned afterwards.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let mut state = RunState::Running;
        let mut reason = StopReason::EndOfStream;
        let mut frames = 0u64;
        let mut detections = 0u64;
        let mut failure: Option<TrackError> = None;

        while state != RunState::Stopped {
            state = match state {
                RunState::Running => match self.step(source, sink) {
                    Ok(Step::EndOfStream) => {
                        reason = StopReason::EndOfStream;
                        RunState::Draining
                    }
                    Ok(Step::Presented { found, quit }) => {
                        frames += 1;
                        if found {
                            detections += 1;
                        }
                        if quit {
                            reason = StopReason::Cancelled;
                            RunState::Draining
                        } else {
                            RunState::Running
                        }
                    }
                    Err(err) => {
                        warn!(%err, frames, "tracking failed, shutting down");
                        failure = Some(err);
                        RunState::Draining
                    }
                },
                RunState::Draining => {
                    let released = source.release();
                    let closed = sink.close();
                    for result in [released, closed] {
                        if let Err(err) = result {
                            if failure.is_none() {
                                failure = Some(err);
                            } else {
                                warn!(%err, "cleanup failed");
                            }
                        }
                    }
                    RunState::Stopped
                }
                RunState::Stopped => RunState::Stopped,
            };
        }

        if let Some(err) = failure {
            return Err(err);
        }
        info!(frames, detections, ?reason, "tracking stopped");
        Ok(RunSummary {
            frames,
            detections,
            reason,
        })
    }

    fn step<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<Step>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let Some(frame) = source.next_frame()? else {
            return Ok(Step::EndOfStream);
        };
        let report = self.process_frame(&frame)?;
        sink.present(&report.annotated)?;
        let quit = sink.poll_key()? == Some(self.quit_key);
        Ok(Step::Presented {
            found: report.detection.is_some(),
            quit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use opencv::{
        core::{Point, Scalar, Vec3b, CV_8UC3},
        imgproc,
    };
    use std::collections::VecDeque;

    fn frame_with_ball(center: Option<Point>, radius: i32) -> Mat {
        let mut frame =
            Mat::new_rows_cols_with_default(400, 600, CV_8UC3, Scalar::all(255.0)).unwrap();
        if let Some(center) = center {
            imgproc::circle(
                &mut frame,
                center,
                radius,
                Scalar::new(0.0, 255.0, 0.0, 0.0),
                -1,
                imgproc::LINE_8,
                0,
            )
            .unwrap();
        }
        frame
    }

    struct ScriptedSource {
        frames: VecDeque<Mat>,
        released: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Mat>) -> Self {
            Self {
                frames: frames.into(),
                released: false,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Mat>> {
            Ok(self.frames.pop_front())
        }

        fn release(&mut self) -> Result<()> {
            self.released = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        presented: Vec<Mat>,
        keys: VecDeque<Option<char>>,
        fail_after: Option<usize>,
        closed: bool,
    }

    impl FrameSink for CollectingSink {
        fn present(&mut self, frame: &Mat) -> Result<()> {
            if self.fail_after == Some(self.presented.len()) {
                return Err(TrackError::OpenSink {
                    path: "out.mp4".to_string(),
                });
            }
            self.presented.push(frame.clone());
            Ok(())
        }

        fn poll_key(&mut self) -> Result<Option<char>> {
            Ok(self.keys.pop_front().flatten())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[test]
    fn test_synthetic_ball_is_detected() {
        let mut pipeline = FramePipeline::new(&Config::default());
        let frame = frame_with_ball(Some(Point::new(250, 180)), 20);

        let report = pipeline.process_frame(&frame).unwrap();
        let det = report.detection.expect("ball should be detected");
        assert!((det.centroid.x - 250).abs() <= 1);
        assert!((det.centroid.y - 180).abs() <= 1);
        assert_relative_eq!(det.center.x, 250.0, epsilon = 1.0);
        assert_relative_eq!(det.center.y, 180.0, epsilon = 1.0);
        assert_relative_eq!(det.radius, 20.0, max_relative = 0.1);
        assert_eq!(pipeline.trail().front(), Some(Some(det.centroid)));

        let marker = *report.annotated.at_2d::<Vec3b>(180, 250).unwrap();
        assert_eq!(marker, Vec3b::from([0, 0, 255]));
    }

    #[test]
    fn test_background_only_frame_records_gap() {
        let mut pipeline = FramePipeline::new(&Config::default());
        let frame = frame_with_ball(None, 0);

        let report = pipeline.process_frame(&frame).unwrap();
        assert!(report.detection.is_none());
        assert_eq!(pipeline.trail().front(), Some(None));

        let mut diff = Mat::default();
        opencv::core::absdiff(&report.annotated, &frame, &mut diff).unwrap();
        let mut gray = Mat::default();
        imgproc::cvt_color_def(&diff, &mut gray, imgproc::COLOR_BGR2GRAY).unwrap();
        assert_eq!(opencv::core::count_non_zero(&gray).unwrap(), 0);
    }

    #[test]
    fn test_frames_are_resized_to_configured_width() {
        let mut pipeline = FramePipeline::new(&Config::default());
        let frame =
            Mat::new_rows_cols_with_default(720, 1280, CV_8UC3, Scalar::all(255.0)).unwrap();
        let report = pipeline.process_frame(&frame).unwrap();
        assert_eq!(report.annotated.cols(), 600);
        assert_eq!(report.annotated.rows(), 337);
    }

    #[test]
    fn test_trail_is_bounded_by_buffer() {
        let config = Config {
            buffer: 3,
            ..Config::default()
        };
        let mut pipeline = FramePipeline::new(&config);
        for x in [100, 150, 200, 250, 300] {
            let frame = frame_with_ball(Some(Point::new(x, 200)), 25);
            pipeline.process_frame(&frame).unwrap();
        }
        let xs: Vec<i32> = pipeline
            .trail()
            .iter()
            .map(|p| p.expect("every frame has a ball").x)
            .collect();
        assert_eq!(xs.len(), 3);
        assert!((xs[0] - 300).abs() <= 1);
        assert!((xs[2] - 200).abs() <= 1);
    }

    #[test]
    fn test_run_until_end_of_stream() {
        let frames = vec![
            frame_with_ball(Some(Point::new(200, 200)), 25),
            frame_with_ball(None, 0),
            frame_with_ball(Some(Point::new(260, 200)), 25),
        ];
        let mut source = ScriptedSource::new(frames);
        let mut sink = CollectingSink::default();
        let mut pipeline = FramePipeline::new(&Config::default());

        let summary = pipeline.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.detections, 2);
        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(sink.presented.len(), 3);
        assert!(source.released);
        assert!(sink.closed);
    }

    #[test]
    fn test_quit_key_cancels_run() {
        let frames = (0..5).map(|_| frame_with_ball(None, 0)).collect();
        let mut source = ScriptedSource::new(frames);
        let mut sink = CollectingSink {
            keys: vec![None, Some('x'), Some('q')].into(),
            ..CollectingSink::default()
        };
        let mut pipeline = FramePipeline::new(&Config::default());

        let summary = pipeline.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(summary.frames, 3);
        assert_eq!(source.frames.len(), 2);
        assert!(source.released);
        assert!(sink.closed);
    }

    #[test]
    fn test_sink_error_still_drains() {
        let frames = (0..4).map(|_| frame_with_ball(None, 0)).collect();
        let mut source = ScriptedSource::new(frames);
        let mut sink = CollectingSink {
            fail_after: Some(2),
            ..CollectingSink::default()
        };
        let mut pipeline = FramePipeline::new(&Config::default());

        let result = pipeline.run(&mut source, &mut sink);
        assert!(matches!(result, Err(TrackError::OpenSink { .. })));
        assert_eq!(sink.presented.len(), 2);
        assert_eq!(source.frames.len(), 1);
        assert!(source.released);
        assert!(sink.closed);
    }

    #[test]
    fn test_first_error_wins_over_cleanup_error() {
        struct BrokenSource;

        impl FrameSource for BrokenSource {
            fn next_frame(&mut self) -> Result<Option<Mat>> {
                Err(TrackError::OpenSource {
                    uri: "camera:0".to_string(),
                })
            }

            fn release(&mut self) -> Result<()> {
                Err(TrackError::config("release failed"))
            }
        }

        let mut source = BrokenSource;
        let mut sink = CollectingSink::default();
        let mut pipeline = FramePipeline::new(&Config::default());

        let result = pipeline.run(&mut source, &mut sink);
        assert!(matches!(result, Err(TrackError::OpenSource { .. })));
        assert!(sink.presented.is_empty());
        assert!(sink.closed);
    }
}
