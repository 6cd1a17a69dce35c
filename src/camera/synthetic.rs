//! Synthetic depth camera.
//!
//! Produces a drifting color gradient and a planar depth ramp at the configured
//! frame rate. Depth at column `x` is `1000 + x` raw units at 1 mm per unit, so
//! the center column of a 640 wide frame reads 1.32 m.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::{CameraConfig, FrameSource, SourceStats};
use crate::frame::{ColorFrame, DepthFrame, FramePair};

pub const SYNTHETIC_DEPTH_BASE: u16 = 1000;
pub const SYNTHETIC_DEPTH_SCALE: f32 = 0.001;

pub struct SyntheticCamera {
    config: CameraConfig,
    running: bool,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            running: false,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn frame_interval(&self) -> Duration {
        if self.config.fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.config.fps
        }
    }

    /// Sleep until the next frame is due, but never longer than the wait timeout.
    fn pace(&self) {
        let Some(last) = self.last_frame_at else {
            return;
        };
        let due = self.frame_interval().saturating_sub(last.elapsed());
        let wait = due.min(self.config.wait_timeout);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }

    fn generate_color(&self) -> Result<ColorFrame> {
        let (w, h) = (self.config.width, self.config.height);
        let shift = self.frame_count;
        let mut data = Vec::with_capacity((w as usize) * (h as usize) * 3);
        for y in 0..h as u64 {
            for x in 0..w as u64 {
                let b = ((x + shift) % 256) as u8;
                let g = (y % 256) as u8;
                let r = (((x + y) / 2 + shift * 3) % 256) as u8;
                data.extend_from_slice(&[b, g, r]);
            }
        }
        ColorFrame::from_bgr(data, w, h)
    }

    fn generate_depth(&self) -> Result<DepthFrame> {
        let (w, h) = (self.config.width, self.config.height);
        let mut data = Vec::with_capacity((w as usize) * (h as usize));
        for _ in 0..h {
            for x in 0..w {
                data.push(SYNTHETIC_DEPTH_BASE.saturating_add(x.min(u16::MAX as u32) as u16));
            }
        }
        DepthFrame::from_raw(data, w, h, SYNTHETIC_DEPTH_SCALE)
    }
}

impl FrameSource for SyntheticCamera {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn start(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!(
                "invalid stream resolution {}x{}",
                self.config.width,
                self.config.height
            ));
        }
        self.running = true;
        self.last_frame_at = None;
        log::info!(
            "SyntheticCamera: streaming {} ({}x{} @ {} fps, depth={})",
            self.config.device,
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.enable_depth
        );
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<FramePair>> {
        if !self.running {
            return Err(anyhow!("camera {} is not started", self.config.device));
        }
        self.pace();

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        let color = self.generate_color()?;
        let depth = if self.config.enable_depth {
            Some(self.generate_depth()?)
        } else {
            None
        };
        Ok(Some(FramePair::new(color, depth, self.frame_count)))
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            log::info!("SyntheticCamera: stopped {}", self.config.device);
        }
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frame_count,
            timeouts: 0,
            device: self.config.device.clone(),
        }
    }
}
