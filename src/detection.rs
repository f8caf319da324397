use opencv::{
    core::{self, Mat, Point, Point2f, Vector},
    imgproc,
    prelude::*,
};
use tracing::debug;

use crate::config::{ColorRange, Config};
use crate::error::Result;
use crate::utils;

pub type Contour = Vector<Point>;

/// The largest color region found in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Center of the minimum enclosing circle.
    pub center: Point2f,
    pub radius: f32,
    /// Moment centroid, truncated to pixel coordinates.
    pub centroid: Point,
    pub area: f64,
}

impl Detection {
    pub fn is_significant(&self, min_radius: f32) -> bool {
        exceeds_radius(self.radius, min_radius)
    }
}

/// A circle only counts when strictly larger than `min_radius`.
pub fn exceeds_radius(radius: f32, min_radius: f32) -> bool {
    radius > min_radius
}

/// Per-pixel range test on an HSV image.
pub fn segment(hsv: &Mat, range: &ColorRange) -> Result<Mat> {
    let mut mask = Mat::default();
    core::in_range(hsv, &range.lower_scalar(), &range.upper_scalar(), &mut mask)?;
    Ok(mask)
}

/// Opening: erode then dilate with the default 3x3 element.
pub fn clean_mask(mask: &Mat, erode_iterations: i32, dilate_iterations: i32) -> Result<Mat> {
    let kernel = Mat::default();
    let anchor = Point::new(-1, -1);
    let border_value = imgproc::morphology_default_border_value()?;

    let mut eroded = Mat::default();
    imgproc::erode(
        mask,
        &mut eroded,
        &kernel,
        anchor,
        erode_iterations,
        core::BORDER_CONSTANT,
        border_value,
    )?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        &eroded,
        &mut dilated,
        &kernel,
        anchor,
        dilate_iterations,
        core::BORDER_CONSTANT,
        border_value,
    )?;
    Ok(dilated)
}

/// Outer boundaries only, straight runs compressed to their end points.
pub fn external_contours(mask: &Mat) -> Result<Vector<Contour>> {
    let mut contours = Vector::<Contour>::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;
    Ok(contours)
}

/// Pick the contour with the largest area (first one wins ties) and measure it.
///
/// Returns `None` when there are no contours or the winner has zero area.
pub fn largest_region(contours: &Vector<Contour>) -> Result<Option<Detection>> {
    let mut best: Option<(Contour, f64)> = None;
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        let larger = best.as_ref().map_or(true, |(_, best_area)| area > *best_area);
        if larger {
            best = Some((contour, area));
        }
    }
    let Some((contour, area)) = best else {
        return Ok(None);
    };

    let moments = imgproc::moments(&contour, false)?;
    if moments.m00 == 0.0 {
        debug!(points = contour.len(), "largest contour has zero area");
        return Ok(None);
    }
    let centroid = Point::new(
        (moments.m10 / moments.m00) as i32,
        (moments.m01 / moments.m00) as i32,
    );

    let mut center = Point2f::default();
    let mut radius = 0.0f32;
    imgproc::min_enclosing_circle(&contour, &mut center, &mut radius)?;

    Ok(Some(Detection {
        center,
        radius,
        centroid,
        area,
    }))
}

/// Color-threshold detector for a single ball.
pub struct BallDetector {
    range: ColorRange,
    blur_kernel: i32,
    erode_iterations: i32,
    dilate_iterations: i32,
    min_radius: f32,
}

impl BallDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            range: config.color,
            blur_kernel: config.blur_kernel,
            erode_iterations: config.erode_iterations,
            dilate_iterations: config.dilate_iterations,
            min_radius: config.min_radius,
        }
    }

    /// Blur, convert to HSV, threshold and open. `frame` is BGR.
    pub fn mask(&self, frame: &Mat) -> Result<Mat> {
        let blurred = utils::blur(frame, self.blur_kernel)?;
        let hsv = utils::bgr_to_hsv(&blurred)?;
        let mask = segment(&hsv, &self.range)?;
        clean_mask(&mask, self.erode_iterations, self.dilate_iterations)
    }

    /// Largest matching region, without the radius filter applied.
    pub fn locate(&self, frame: &Mat) -> Result<Option<Detection>> {
        let mask = self.mask(frame)?;
        let contours = external_contours(&mask)?;
        largest_region(&contours)
    }

    /// Largest matching region that clears the minimum radius.
    pub fn detect(&self, frame: &Mat) -> Result<Option<Detection>> {
        let found = self.locate(frame)?;
        match found {
            Some(det) if det.is_significant(self.min_radius) => Ok(Some(det)),
            Some(det) => {
                debug!(radius = det.radius, min_radius = self.min_radius, "region too small");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
