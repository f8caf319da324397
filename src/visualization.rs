use opencv::{
    core::{Mat, Point, Scalar},
    imgproc,
    prelude::*,
};

use crate::detection::Detection;
use crate::trail::TrailBuffer;
use crate::utils::put_text;

/// Enclosing circle outline (BGR yellow).
pub const CIRCLE_COLOR: Scalar = Scalar::new(0.0, 255.0, 255.0, 0.0);
/// Centroid marker and trail (BGR red).
pub const TRAIL_COLOR: Scalar = Scalar::new(0.0, 0.0, 255.0, 0.0);
const CIRCLE_THICKNESS: i32 = 2;

/// Outline the enclosing circle and mark the centroid.
pub fn draw_detection(frame: &mut Mat, det: &Detection, marker_radius: i32) -> opencv::Result<()> {
    let center = Point::new(det.center.x as i32, det.center.y as i32);
    imgproc::circle(
        frame,
        center,
        det.radius as i32,
        CIRCLE_COLOR,
        CIRCLE_THICKNESS,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::circle(
        frame,
        det.centroid,
        marker_radius,
        TRAIL_COLOR,
        -1,
        imgproc::LINE_8,
        0,
    )
}

/// Connect consecutive trail points, thick near the head and thinning out.
pub fn draw_trail(frame: &mut Mat, trail: &TrailBuffer) -> opencv::Result<()> {
    if trail.is_empty() {
        return Ok(());
    }
    for (i, newer, older) in trail.segments() {
        let thickness = trail.thickness(i);
        if thickness <= 0 {
            continue;
        }
        imgproc::line(frame, newer, older, TRAIL_COLOR, thickness, imgproc::LINE_8, 0)?;
    }
    Ok(())
}

pub fn draw_frame_info(frame: &mut Mat, frame_id: u64, fps: f64) -> opencv::Result<()> {
    let text = format!("Frame: {} FPS: {:.1}", frame_id, fps);
    // Dark outline first so the text reads on bright backgrounds.
    put_text(frame, &text, (10, 30), Scalar::new(0.0, 0.0, 0.0, 0.0), 0.6, 3)?;
    put_text(frame, &text, (10, 30), Scalar::new(255.0, 255.0, 255.0, 0.0), 0.6, 1)
}
