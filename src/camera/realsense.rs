#![cfg(feature = "camera-realsense")]

//! Intel RealSense source.
//!
//! Color is requested as BGR8 and depth as Z16, both at the configured profile.
//! Raw buffers are copied out of librealsense frames before they are handed on,
//! so no SDK frame outlives the poll that produced it.

use anyhow::{anyhow, Context as _, Result};
use realsense_rust::{
    config::Config,
    context::Context,
    frame::{ColorFrame as RsColorFrame, DepthFrame as RsDepthFrame, FrameEx},
    kind::{Rs2Format, Rs2StreamKind},
    pipeline::{ActivePipeline, FrameWaitError, InactivePipeline},
};
use std::ffi::CString;

use super::{CameraConfig, FrameSource, SourceStats};
use crate::frame::{ColorFrame, DepthFrame, FramePair};

pub struct RealSenseCamera {
    config: CameraConfig,
    context: Context,
    pipeline: Option<ActivePipeline>,
    frame_count: u64,
    timeouts: u64,
}

impl RealSenseCamera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        let context = Context::new().context("create librealsense context")?;
        Ok(Self {
            config,
            context,
            pipeline: None,
            frame_count: 0,
            timeouts: 0,
        })
    }

    fn stream_config(&self) -> Result<Config> {
        let mut config = Config::new();
        if !self.config.device.trim().is_empty() {
            let serial = CString::new(self.config.device.as_str())
                .context("device serial contains a NUL byte")?;
            config
                .enable_device_from_serial(&serial)
                .context("select realsense device")?;
        }
        let (w, h, fps) = (
            self.config.width as usize,
            self.config.height as usize,
            self.config.fps as usize,
        );
        config
            .disable_all_streams()
            .context("reset realsense streams")?
            .enable_stream(Rs2StreamKind::Color, None, w, h, Rs2Format::Bgr8, fps)
            .context("enable color stream")?;
        if self.config.enable_depth {
            config
                .enable_stream(Rs2StreamKind::Depth, None, w, h, Rs2Format::Z16, fps)
                .context("enable depth stream")?;
        }
        Ok(config)
    }
}

impl FrameSource for RealSenseCamera {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn start(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            return Ok(());
        }
        let config = self.stream_config()?;
        let inactive =
            InactivePipeline::try_from(&self.context).context("create realsense pipeline")?;
        let active = inactive
            .start(Some(config))
            .context("start realsense pipeline")?;
        self.pipeline = Some(active);
        log::info!(
            "RealSenseCamera: streaming {}x{} @ {} fps (depth={})",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.enable_depth
        );
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<FramePair>> {
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| anyhow!("realsense pipeline not started"))?;

        let frames = match pipeline.wait(Some(self.config.wait_timeout)) {
            Ok(frames) => frames,
            Err(FrameWaitError::DidTimeoutBeforeFrameArrival) => {
                self.timeouts += 1;
                return Ok(None);
            }
            Err(err) => return Err(anyhow::Error::new(err).context("wait for realsense frames")),
        };

        let Some(color) = frames.frames_of_type::<RsColorFrame>().into_iter().next() else {
            return Ok(None);
        };
        let color = copy_color(&color)?;

        let depth = if self.config.enable_depth {
            match frames.frames_of_type::<RsDepthFrame>().into_iter().next() {
                Some(depth) => Some(copy_depth(&depth)?),
                None => None,
            }
        } else {
            None
        };

        self.frame_count += 1;
        Ok(Some(FramePair::new(color, depth, self.frame_count)))
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(active) = self.pipeline.take() {
            let _inactive = active.stop();
            log::info!("RealSenseCamera: pipeline stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_delivered: self.frame_count,
            timeouts: self.timeouts,
            device: self.config.device.clone(),
        }
    }
}

fn copy_color(frame: &RsColorFrame) -> Result<ColorFrame> {
    let width = frame.width() as u32;
    let height = frame.height() as u32;
    let len = frame.get_data_size();
    // SAFETY: the pointer and size come from the same live librealsense frame,
    // and the bytes are copied before the frame is released.
    let bytes = unsafe {
        let ptr: *const _ = frame.get_data();
        std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec()
    };
    ColorFrame::from_bgr(bytes, width, height).context("copy realsense color frame")
}

fn copy_depth(frame: &RsDepthFrame) -> Result<DepthFrame> {
    let width = frame.width() as u32;
    let height = frame.height() as u32;
    let scale = frame.depth_units().context("read depth units")?;
    let len = frame.get_data_size() / std::mem::size_of::<u16>();
    // SAFETY: Z16 frames hold `width * height` native-endian u16 values; the
    // slice is copied before the frame is released.
    let raw = unsafe {
        let ptr: *const _ = frame.get_data();
        std::slice::from_raw_parts(ptr.cast::<u16>(), len).to_vec()
    };
    DepthFrame::from_raw(raw, width, height, scale).context("copy realsense depth frame")
}
