use opencv::core::Scalar;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, TrackError};

/// Inclusive HSV bounds on OpenCV's scale (H 0-180, S and V 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const GREEN: ColorRange = ColorRange {
        lower: [29, 86, 6],
        upper: [64, 255, 255],
    };

    pub const BLUE: ColorRange = ColorRange {
        lower: [150, 150, 0],
        upper: [180, 255, 255],
    };

    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn lower_scalar(&self) -> Scalar {
        to_scalar(self.lower)
    }

    pub fn upper_scalar(&self) -> Scalar {
        to_scalar(self.upper)
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        ColorRange::GREEN
    }
}

fn to_scalar(v: [u8; 3]) -> Scalar {
    Scalar::new(v[0] as f64, v[1] as f64, v[2] as f64, 0.0)
}

/// Named ball colors selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreset {
    #[default]
    Green,
    Blue,
}

impl ColorPreset {
    pub fn range(self) -> ColorRange {
        match self {
            ColorPreset::Green => ColorRange::GREEN,
            ColorPreset::Blue => ColorRange::BLUE,
        }
    }
}

/// Largest accepted trail capacity. Keeps the head segment well under
/// OpenCV's maximum line thickness.
pub const MAX_BUFFER: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub color: ColorRange,
    pub resize_width: i32,
    pub blur_kernel: i32,
    pub erode_iterations: i32,
    pub dilate_iterations: i32,
    /// Enclosing circles must be strictly larger than this to count.
    pub min_radius: f32,
    pub marker_radius: i32,
    /// Capacity of the trail history.
    pub buffer: usize,
    pub camera_index: i32,
    pub warmup_ms: u64,
    pub window_name: String,
    pub quit_key: char,
    pub show_info: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color: ColorRange::GREEN,
            resize_width: 600,
            blur_kernel: 11,
            erode_iterations: 2,
            dilate_iterations: 2,
            min_radius: 10.0,
            marker_radius: 5,
            buffer: 64,
            camera_index: 0,
            warmup_ms: 2000,
            window_name: "Frame".to_string(),
            quit_key: 'q',
            show_info: false,
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&data)?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer == 0 || self.buffer > MAX_BUFFER {
            return Err(TrackError::config(format!(
                "buffer must be between 1 and {MAX_BUFFER}, got {}",
                self.buffer
            )));
        }
        if self.resize_width <= 0 {
            return Err(TrackError::config("resize_width must be positive"));
        }
        if self.blur_kernel <= 0 || self.blur_kernel % 2 == 0 {
            return Err(TrackError::config(format!(
                "blur_kernel must be a positive odd number, got {}",
                self.blur_kernel
            )));
        }
        if self.erode_iterations < 0 || self.dilate_iterations < 0 {
            return Err(TrackError::config("morphology iterations must not be negative"));
        }
        if !self.min_radius.is_finite() || self.min_radius < 0.0 {
            return Err(TrackError::config("min_radius must be a non-negative number"));
        }
        if self.marker_radius <= 0 {
            return Err(TrackError::config("marker_radius must be positive"));
        }
        if (0..3).any(|c| self.color.lower[c] > self.color.upper[c]) {
            return Err(TrackError::config(format!(
                "color lower bound {:?} exceeds upper bound {:?}",
                self.color.lower, self.color.upper
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_green_tracker() {
        let cfg = Config::default();
        assert_eq!(cfg.color, ColorRange::GREEN);
        assert_eq!(cfg.resize_width, 600);
        assert_eq!(cfg.blur_kernel, 11);
        assert_eq!(cfg.buffer, 64);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{ "buffer": 32, "color": { "lower": [150, 150, 0], "upper": [180, 255, 255] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.buffer, 32);
        assert_eq!(cfg.color, ColorRange::BLUE);
        assert_eq!(cfg.min_radius, 10.0);
        assert_eq!(cfg.quit_key, 'q');
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_buffer = Config { buffer: 0, ..Config::default() };
        assert!(matches!(zero_buffer.validate(), Err(TrackError::Config { .. })));

        let huge_buffer = Config { buffer: usize::MAX, ..Config::default() };
        assert!(matches!(huge_buffer.validate(), Err(TrackError::Config { .. })));
        let largest = Config { buffer: MAX_BUFFER, ..Config::default() };
        assert!(largest.validate().is_ok());
        let over = Config { buffer: MAX_BUFFER + 1, ..Config::default() };
        assert!(over.validate().is_err());

        let even_kernel = Config { blur_kernel: 10, ..Config::default() };
        assert!(even_kernel.validate().is_err());

        let inverted = Config {
            color: ColorRange::new([64, 86, 6], [29, 255, 255]),
            ..Config::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_presets_map_to_ranges() {
        assert_eq!(ColorPreset::default().range(), ColorRange::GREEN);
        assert_eq!(ColorPreset::Blue.range(), ColorRange::BLUE);
        assert_eq!(ColorRange::default(), ColorRange::GREEN);

        let blue = ColorRange::BLUE.lower_scalar();
        assert_eq!((blue[0], blue[1], blue[2]), (150.0, 150.0, 0.0));
    }
}
