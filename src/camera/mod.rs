//! Depth camera sources.
//!
//! - Synthetic source (`stub://` devices) for tests and hardware-free runs
//! - Intel RealSense devices (feature: camera-realsense)
//!
//! Every source produces `FramePair`s on demand. A poll that sees no color frame
//! before the wait timeout returns `Ok(None)`; the caller skips that iteration.
//! Errors are fatal for the acquisition loop and are not retried here.

#[cfg(feature = "camera-realsense")]
pub mod realsense;
pub mod synthetic;

#[cfg(feature = "camera-realsense")]
pub use realsense::RealSenseCamera;
pub use synthetic::SyntheticCamera;

use anyhow::Result;
use std::time::Duration;

use crate::frame::FramePair;
use crate::{DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub const DEFAULT_DEVICE: &str = "stub://camera";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Stream configuration shared by all camera backends.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// `stub://<name>` for the synthetic source, otherwise a device serial
    /// number (empty selects the first attached device).
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Stream depth alongside color.
    pub enable_depth: bool,
    /// Upper bound on a single poll.
    pub wait_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            enable_depth: true,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl CameraConfig {
    pub fn color_only(mut self) -> Self {
        self.enable_depth = false;
        self
    }
}

/// Counters reported by a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_delivered: u64,
    pub timeouts: u64,
    pub device: String,
}

/// A camera that yields paired color/depth frames.
///
/// Sources are owned by the thread that starts them; only one poll may be in
/// flight at a time.
pub trait FrameSource {
    /// Device identifier for logs and status text.
    fn name(&self) -> &str;

    /// Configure the streams and start streaming.
    fn start(&mut self) -> Result<()>;

    /// Wait up to the configured timeout for the next frame pair.
    ///
    /// `Ok(None)` means no color frame was available in time.
    fn poll(&mut self) -> Result<Option<FramePair>>;

    /// Stop streaming and release the device. No-op when not running.
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Open the backend named by `config.device`. The source is returned stopped.
pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    if config.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(config.clone())));
    }
    #[cfg(feature = "camera-realsense")]
    {
        Ok(Box::new(RealSenseCamera::new(config.clone())?))
    }
    #[cfg(not(feature = "camera-realsense"))]
    {
        anyhow::bail!(
            "camera '{}' requires the camera-realsense feature",
            config.device
        )
    }
}
