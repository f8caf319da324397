use opencv::{
    core::{Mat, Point, Scalar, Size},
    imgproc,
    prelude::*,
};

/// Scale `frame` to `width` keeping the aspect ratio. The new height is truncated.
pub fn resize_to_width(frame: &Mat, width: i32) -> opencv::Result<Mat> {
    let size = frame.size()?;
    let mut resized = Mat::default();
    if size.width == width || size.width <= 0 {
        frame.copy_to(&mut resized)?;
        return Ok(resized);
    }
    let ratio = width as f64 / size.width as f64;
    let height = ((size.height as f64 * ratio) as i32).max(1);
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    Ok(resized)
}

/// Gaussian blur with a square kernel; sigma is derived from the kernel size.
pub fn blur(frame: &Mat, kernel: i32) -> opencv::Result<Mat> {
    let mut blurred = Mat::default();
    imgproc::gaussian_blur_def(frame, &mut blurred, Size::new(kernel, kernel), 0.0)?;
    Ok(blurred)
}

pub fn bgr_to_hsv(frame: &Mat) -> opencv::Result<Mat> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(frame, &mut hsv, imgproc::COLOR_BGR2HSV)?;
    Ok(hsv)
}

pub fn put_text(
    img: &mut Mat,
    text: &str,
    org: (i32, i32),
    color: Scalar,
    font_scale: f64,
    thickness: i32,
) -> opencv::Result<()> {
    let point = Point::new(org.0, org.1);
    imgproc::put_text(
        img,
        text,
        point,
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        color,
        thickness,
        imgproc::LINE_8,
        false,
    )
}
