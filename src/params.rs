//! Transform Parameters - Validated Once, Shared Read-Only
//!
//! Any value that could produce an invalid canvas is rejected here,
//! before a single file is touched.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Fatal configuration problems. These abort the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Threshold {0} is out of range, expected 0..=255")]
    ThresholdOutOfRange(i64),

    #[error("Scale factor must be positive, got {0}")]
    NonPositiveScale(f64),

    #[error("Scale factor must be finite, got {0}")]
    NonFiniteScale(f64),

    #[error("Scale factor {scale} reduces a {width}x{height} image to zero pixels")]
    DegenerateScale { width: u32, height: u32, scale: f64 },

    #[error("Path for {0} must not be empty")]
    EmptyPath(&'static str),

    #[error("Animation name {0:?} must be a single path component")]
    InvalidName(String),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters applied identically to every frame of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParameters {
    threshold: u8,
    shift_x: i32,
    shift_y: i32,
    scale_factor: f64,
    canvas_width: u32,
    canvas_height: u32,
}

impl TransformParameters {
    /// Validate raw values and build parameters for the fixed 128x64 canvas.
    pub fn new(threshold: i64, shift_x: i32, shift_y: i32, scale_factor: f64) -> Result<Self, ConfigError> {
        let threshold = u8::try_from(threshold)
            .map_err(|_| ConfigError::ThresholdOutOfRange(threshold))?;

        if !scale_factor.is_finite() {
            return Err(ConfigError::NonFiniteScale(scale_factor));
        }
        if scale_factor <= 0.0 {
            return Err(ConfigError::NonPositiveScale(scale_factor));
        }

        Ok(Self {
            threshold,
            shift_x,
            shift_y,
            scale_factor,
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
        })
    }

    pub fn threshold(&self) -> u8 { self.threshold }
    pub fn shift_x(&self) -> i32 { self.shift_x }
    pub fn shift_y(&self) -> i32 { self.shift_y }
    pub fn scale_factor(&self) -> f64 { self.scale_factor }
    pub fn canvas_width(&self) -> u32 { self.canvas_width }
    pub fn canvas_height(&self) -> u32 { self.canvas_height }

    /// Size of a `width`x`height` image after uniform scaling.
    ///
    /// Truncates toward zero. A zero dimension is a configuration error.
    pub fn scaled_size(&self, width: u32, height: u32) -> Result<(u32, u32), ConfigError> {
        let w = (width as f64 * self.scale_factor).floor();
        let h = (height as f64 * self.scale_factor).floor();

        if w < 1.0 || h < 1.0 {
            return Err(ConfigError::DegenerateScale {
                width,
                height,
                scale: self.scale_factor,
            });
        }

        // Clamp keeps absurd factors from wrapping; anything past u32 is cropped anyway.
        Ok((w.min(u32::MAX as f64) as u32, h.min(u32::MAX as f64) as u32))
    }
}
