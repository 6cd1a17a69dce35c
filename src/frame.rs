//! Frame containers.
//!
//! - `ColorFrame`: BGR8 raster as delivered by the camera's color sensor.
//! - `DepthFrame`: z16 depth map aligned to the color sensor, with the scale that
//!   turns raw units into meters.
//! - `FramePair`: one color frame and, when the depth stream is enabled, the depth
//!   frame captured with it.
//!
//! Pairs are produced by a `FrameSource` on every poll and consumed in the same
//! iteration. Nothing in this module retains frames across iterations.

use anyhow::{anyhow, Result};
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use std::time::Instant;

// ----------------------------------------------------------------------------
// ColorFrame
// ----------------------------------------------------------------------------

/// Color raster in BGR byte order (3 bytes per pixel, row-major, no padding).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ColorFrame {
    /// Wrap a tightly packed BGR8 buffer. Fails when the length does not match
    /// `width * height * 3`.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = packed_len(width, height, 3)?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame from an RGB image, swapping channels into BGR order.
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let mut data = Vec::with_capacity(image.as_raw().len());
        for px in image.pixels() {
            let [r, g, b] = px.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self {
            data,
            width: image.width(),
            height: image.height(),
        }
    }

    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    /// BGR triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel_bgr(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Convert to an RGB image (channel swap only, same resolution).
    pub fn to_rgb_image(&self) -> RgbImage {
        let width = self.width as usize;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let idx = ((y as usize) * width + x as usize) * 3;
            Rgb([self.data[idx + 2], self.data[idx + 1], self.data[idx]])
        })
    }
}

// ----------------------------------------------------------------------------
// DepthFrame
// ----------------------------------------------------------------------------

/// Depth map with one raw z16 value per pixel.
///
/// `depth_scale` is the size of one raw unit in meters (0.001 for most depth
/// cameras). A raw value of 0 means "no reading" and is reported as 0.0 m.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthFrame {
    data: Vec<u16>,
    pub width: u32,
    pub height: u32,
    depth_scale: f32,
}

impl DepthFrame {
    pub fn from_raw(data: Vec<u16>, width: u32, height: u32, depth_scale: f32) -> Result<Self> {
        let expected = packed_len(width, height, 1)?;
        if data.len() != expected {
            return Err(anyhow!(
                "depth frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("depth frame must not be empty"));
        }
        if !depth_scale.is_finite() || depth_scale <= 0.0 {
            return Err(anyhow!("depth scale must be positive, got {}", depth_scale));
        }
        Ok(Self {
            data,
            width,
            height,
            depth_scale,
        })
    }

    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    /// Raw z16 value at `(x, y)`. Coordinates are clamped into the frame.
    pub fn raw(&self, x: i32, y: i32) -> u16 {
        let (cx, cy) = self.clamp(x, y);
        self.data[(cy as usize) * (self.width as usize) + cx as usize]
    }

    /// Distance in meters at `(x, y)`.
    ///
    /// Coordinates outside the frame are clamped to the nearest edge pixel. The
    /// value is returned unvalidated: zero readings come back as 0.0.
    pub fn distance(&self, x: i32, y: i32) -> f32 {
        self.raw(x, y) as f32 * self.depth_scale
    }

    fn clamp(&self, x: i32, y: i32) -> (u32, u32) {
        let cx = x.clamp(0, self.width as i32 - 1) as u32;
        let cy = y.clamp(0, self.height as i32 - 1) as u32;
        (cx, cy)
    }
}

// ----------------------------------------------------------------------------
// FramePair
// ----------------------------------------------------------------------------

/// Color + optional depth frame captured together.
#[derive(Clone, Debug)]
pub struct FramePair {
    pub color: ColorFrame,
    pub depth: Option<DepthFrame>,
    /// Source-local sequence number, starting at 1.
    pub sequence: u64,
    pub captured_at: Instant,
}

impl FramePair {
    pub fn new(color: ColorFrame, depth: Option<DepthFrame>, sequence: u64) -> Self {
        Self {
            color,
            depth,
            sequence,
            captured_at: Instant::now(),
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Resize to exactly `width x height`. Same-size input is copied unchanged.
pub fn fit_to(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

fn packed_len(width: u32, height: u32, channels: usize) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_frame_validates_length() {
        assert!(ColorFrame::from_bgr(vec![0u8; 12], 2, 2).is_ok());
        assert!(ColorFrame::from_bgr(vec![0u8; 11], 2, 2).is_err());
    }

    #[test]
    fn bgr_to_rgb_swaps_channels() -> Result<()> {
        let frame = ColorFrame::from_bgr(vec![10, 20, 30, 40, 50, 60], 2, 1)?;
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([30, 20, 10]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([60, 50, 40]));

        let back = ColorFrame::from_rgb_image(&rgb);
        assert_eq!(back, frame);
        Ok(())
    }

    #[test]
    fn depth_distance_uses_scale() -> Result<()> {
        let depth = DepthFrame::from_raw(vec![0, 1500, 2000, 250], 2, 2, 0.001)?;
        assert_eq!(depth.distance(0, 0), 0.0);
        assert!((depth.distance(1, 0) - 1.5).abs() < 1e-6);
        assert!((depth.distance(0, 1) - 2.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn depth_lookup_clamps_out_of_range_coordinates() -> Result<()> {
        let depth = DepthFrame::from_raw(vec![1, 2, 3, 4], 2, 2, 1.0)?;
        assert_eq!(depth.raw(-5, -5), 1);
        assert_eq!(depth.raw(10, 0), 2);
        assert_eq!(depth.raw(0, 10), 3);
        assert_eq!(depth.raw(10, 10), 4);
        Ok(())
    }

    #[test]
    fn depth_frame_rejects_bad_scale() {
        assert!(DepthFrame::from_raw(vec![0; 4], 2, 2, 0.0).is_err());
        assert!(DepthFrame::from_raw(vec![0; 3], 2, 2, 0.001).is_err());
    }

    #[test]
    fn fit_to_same_size_is_identity() {
        let img = RgbImage::from_fn(4, 3, |x, y| Rgb([x as u8, y as u8, 7]));
        assert_eq!(fit_to(&img, 4, 3), img);
        assert_eq!(fit_to(&img, 8, 6).dimensions(), (8, 6));
    }
}
