//! Frame Transformer - Source Image to Device Canvas
//!
//! Stages run in a fixed order, each a pure function over an owned buffer:
//! flatten alpha, binarize, translate, then scale onto the centred canvas.
//! Nothing between calls is cached, so identical inputs give identical bytes.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;

use crate::params::{ConfigError, TransformParameters};
use crate::{BLACK, WHITE};

/// A finished canvas-sized two-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasFrame {
    image: GrayImage,
}

impl CanvasFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// True when every pixel is pure black or pure white.
    pub fn is_two_level(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == BLACK || v == WHITE)
    }

    /// Encode as an 8-bit grayscale PNG. The same bytes are written and hashed.
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

/// Run the full pipeline on one decoded image.
///
/// Fails only when the scale factor collapses this image to zero pixels.
pub fn transform(source: &DynamicImage, params: &TransformParameters) -> Result<CanvasFrame, ConfigError> {
    let (scaled_w, scaled_h) = params.scaled_size(source.width(), source.height())?;

    let opaque = flatten_alpha(source);
    let mono = binarize(&opaque, params.threshold());
    let moved = translate(&mono, params.shift_x(), params.shift_y());
    let image = scale_onto_canvas(
        &moved,
        scaled_w,
        scaled_h,
        params.canvas_width(),
        params.canvas_height(),
    );

    debug_assert!(image.as_raw().iter().all(|&v| v == BLACK || v == WHITE));
    Ok(CanvasFrame { image })
}

/// Composite every pixel over opaque white and drop the alpha channel.
pub fn flatten_alpha(source: &DynamicImage) -> RgbImage {
    let rgba = source.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let px = rgba.get_pixel(x, y);
        let a = px[3] as u32;
        let over_white = |c: u8| -> u8 {
            ((c as u32 * a + WHITE as u32 * (255 - a) + 127) / 255) as u8
        };
        Rgb([over_white(px[0]), over_white(px[1]), over_white(px[2])])
    })
}

/// BT.601 luma, rounded. Matches the usual RGB-to-gray conversion.
pub fn intensity(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000) as u8
}

/// Hard threshold: `intensity >= threshold` is background.
pub fn binarize(source: &RgbImage, threshold: u8) -> GrayImage {
    let (width, height) = source.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        if intensity(source.get_pixel(x, y)) >= threshold {
            Luma([WHITE])
        } else {
            Luma([BLACK])
        }
    })
}

/// Shift content by `(dx, dy)` without wrapping. Vacated pixels become white.
pub fn translate(source: &GrayImage, dx: i32, dy: i32) -> GrayImage {
    let (width, height) = source.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let sx = x as i64 - dx as i64;
        let sy = y as i64 - dy as i64;
        if sx < 0 || sy < 0 || sx >= width as i64 || sy >= height as i64 {
            Luma([WHITE])
        } else {
            *source.get_pixel(sx as u32, sy as u32)
        }
    })
}

/// Nearest-neighbour scale to `scaled_width`x`scaled_height`, pasted centred
/// on a white canvas.
///
/// Only canvas pixels are computed and each maps straight back to a source
/// pixel, so cost and memory do not depend on the scale factor. Values are
/// copied, never blended, so a two-level input stays two-level.
///
/// Offsets are `(canvas - scaled) / 2`, truncated toward zero. Overflow is
/// cropped. An empty `source` or a zero scaled size gives a blank canvas.
pub fn scale_onto_canvas(
    source: &GrayImage,
    scaled_width: u32,
    scaled_height: u32,
    canvas_width: u32,
    canvas_height: u32,
) -> GrayImage {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 || scaled_width == 0 || scaled_height == 0 {
        return GrayImage::from_pixel(canvas_width, canvas_height, Luma([WHITE]));
    }

    let off_x = (canvas_width as i64 - scaled_width as i64) / 2;
    let off_y = (canvas_height as i64 - scaled_height as i64) / 2;

    // Sample at scaled pixel centres: src = floor((2d + 1) * src_len / (2 * scaled_len)).
    let pick = |d: i64, src_len: u32, scaled_len: u32| -> Option<u32> {
        if d < 0 || d >= scaled_len as i64 {
            return None;
        }
        let s = ((2 * d as u128 + 1) * src_len as u128) / (2 * scaled_len as u128);
        Some((s as u32).min(src_len - 1))
    };

    GrayImage::from_fn(canvas_width, canvas_height, |cx, cy| {
        match (
            pick(cx as i64 - off_x, width, scaled_width),
            pick(cy as i64 - off_y, height, scaled_height),
        ) {
            (Some(sx), Some(sy)) => *source.get_pixel(sx, sy),
            _ => Luma([WHITE]),
        }
    })
}
