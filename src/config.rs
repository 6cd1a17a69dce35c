use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{CameraConfig, DEFAULT_DEVICE, DEFAULT_WAIT_TIMEOUT};
use crate::capture::{CaptureConfig, DEFAULT_CAPTURE_DIR, DEFAULT_IMAGE_EXTENSION};
use crate::detect::postprocess::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::pipeline::DEFAULT_JOIN_TIMEOUT;
use crate::{DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH};

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    camera: Option<CameraConfigFile>,
    capture: Option<CaptureConfigFile>,
    detector: Option<DetectorConfigFile>,
    join_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    wait_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    folder: Option<PathBuf>,
    extension: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
}

/// Settings shared by both tools.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    /// Preselected model; when unset the viewer asks for one.
    pub model_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    /// How long shutdown waits for the acquisition thread.
    pub join_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            model_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Defaults, then the JSON file named by `DEPTHCAM_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DEPTHCAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit file, still honoring env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_HEIGHT),
            fps: camera_file.fps.unwrap_or(DEFAULT_FPS),
            enable_depth: true,
            wait_timeout: camera_file
                .wait_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_WAIT_TIMEOUT),
        };

        let capture_file = file.capture.unwrap_or_default();
        let capture = CaptureConfig {
            folder: capture_file
                .folder
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAPTURE_DIR)),
            extension: capture_file
                .extension
                .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string()),
            ..CaptureConfig::default()
        };

        let detector = file.detector.unwrap_or_default();
        Ok(Self {
            camera,
            capture,
            model_path: detector.model_path,
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            join_timeout: file
                .join_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_JOIN_TIMEOUT),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("DEPTHCAM_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(dir) = std::env::var("DEPTHCAM_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture.folder = PathBuf::from(dir);
            }
        }
        if let Ok(model) = std::env::var("DEPTHCAM_MODEL") {
            if !model.trim().is_empty() {
                self.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(timeout) = std::env::var("DEPTHCAM_JOIN_TIMEOUT_MS") {
            let millis: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("DEPTHCAM_JOIN_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.join_timeout = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.camera.fps == 0 {
            return Err(anyhow!("camera fps must be greater than zero"));
        }
        if self.camera.wait_timeout.is_zero() {
            return Err(anyhow!("camera wait timeout must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1 (got {})",
                self.confidence_threshold
            ));
        }
        if self.join_timeout.is_zero() {
            return Err(anyhow!("join timeout must be greater than zero"));
        }
        self.capture.extension = self
            .capture
            .extension
            .trim_start_matches('.')
            .to_lowercase();
        if !matches!(self.capture.extension.as_str(), "jpg" | "jpeg" | "png") {
            return Err(anyhow!(
                "unsupported capture format {:?} (expected jpg or png)",
                self.capture.extension
            ));
        }
        if self.capture.folder.as_os_str().is_empty() {
            return Err(anyhow!("capture folder must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
