//! Still capture for the capture tool.
//!
//! - `CaptureSession`: output folder, save counter and the most recent preview frame.
//! - `CaptureController`: camera lifecycle, preview refresh and save, plus the
//!   status text and button states the window renders.
//!
//! The counter starts at 0 for every session and only advances after a file has
//! been written, so names are unique within one run: `image_0000.jpg`, ...

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{open_camera, CameraConfig, FrameSource};
use crate::frame::fit_to;
use crate::overlay::{draw_rect, draw_text, fill_rect, text_size};
use crate::stream::{StreamController, StreamState};
use crate::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub const DEFAULT_CAPTURE_DIR: &str = "captured_images";
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpg";
pub const PREVIEW_WIDTH: u32 = 320;
pub const PREVIEW_HEIGHT: u32 = 240;
/// Cadence of the preview refresh timer.
pub const PREVIEW_INTERVAL: Duration = Duration::from_millis(30);
/// Height of the status strip under the preview.
pub const PANEL_HEIGHT: u32 = 44;

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub folder: PathBuf,
    pub extension: String,
    /// Resolution of saved frames.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Resolution of the on-screen preview.
    pub preview_width: u32,
    pub preview_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from(DEFAULT_CAPTURE_DIR),
            extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            frame_width: DEFAULT_WIDTH,
            frame_height: DEFAULT_HEIGHT,
            preview_width: PREVIEW_WIDTH,
            preview_height: PREVIEW_HEIGHT,
        }
    }
}

/// `image_0007.jpg` for index 7.
pub fn image_file_name(index: u32, extension: &str) -> String {
    format!("image_{:04}.{}", index, extension)
}

// ----------------------------------------------------------------------------
// CaptureSession
// ----------------------------------------------------------------------------

pub struct CaptureSession {
    config: CaptureConfig,
    next_index: u32,
    latest: Option<RgbImage>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            next_index: 0,
            latest: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn folder(&self) -> &Path {
        &self.config.folder
    }

    /// Create the output folder if it does not exist yet.
    pub fn ensure_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.folder).with_context(|| {
            format!(
                "failed to create capture folder {}",
                self.config.folder.display()
            )
        })
    }

    /// Index the next successful save will use.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn next_path(&self) -> PathBuf {
        self.config
            .folder
            .join(image_file_name(self.next_index, &self.config.extension))
    }

    /// Remember `frame` as the one the next capture writes.
    pub fn set_latest(&mut self, frame: RgbImage) {
        self.latest = Some(frame);
    }

    pub fn latest(&self) -> Option<&RgbImage> {
        self.latest.as_ref()
    }

    pub fn clear_latest(&mut self) {
        self.latest = None;
    }

    /// Write the latest frame. `Ok(None)` when there is nothing to save yet.
    pub fn capture(&mut self) -> Result<Option<PathBuf>> {
        let Some(frame) = self.latest.as_ref() else {
            return Ok(None);
        };
        self.ensure_folder()?;
        let path = self.next_path();
        frame
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.next_index += 1;
        log::info!("saved {}", path.display());
        Ok(Some(path))
    }
}

// ----------------------------------------------------------------------------
// CaptureController
// ----------------------------------------------------------------------------

/// Enabled state of the three capture buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonStates {
    pub start: bool,
    pub capture: bool,
    pub stop: bool,
}

/// The three capture buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureAction {
    Start,
    Capture,
    Stop,
}

impl CaptureAction {
    pub const ALL: [CaptureAction; 3] = [Self::Start, Self::Capture, Self::Stop];

    /// Keyboard shortcut for each button: `S`, `C` (or space) and `X`.
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            's' => Some(Self::Start),
            'c' | ' ' => Some(Self::Capture),
            'x' => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "[S] Start Camera",
            Self::Capture => "[C] Capture Image",
            Self::Stop => "[X] Stop Camera",
        }
    }
}

impl ButtonStates {
    pub fn enabled(&self, action: CaptureAction) -> bool {
        match action {
            CaptureAction::Start => self.start,
            CaptureAction::Capture => self.capture,
            CaptureAction::Stop => self.stop,
        }
    }
}

pub type CameraOpener = Box<dyn FnMut(&CameraConfig) -> Result<Box<dyn FrameSource>>>;

pub struct CaptureController {
    camera_config: CameraConfig,
    open: CameraOpener,
    camera: Option<Box<dyn FrameSource>>,
    session: CaptureSession,
    stream: StreamController,
    status: String,
}

impl CaptureController {
    pub fn new(camera_config: CameraConfig, capture_config: CaptureConfig) -> Result<Self> {
        Self::with_opener(camera_config, capture_config, Box::new(open_camera))
    }

    /// Build with a custom camera factory.
    pub fn with_opener(
        camera_config: CameraConfig,
        capture_config: CaptureConfig,
        open: CameraOpener,
    ) -> Result<Self> {
        let session = CaptureSession::new(capture_config);
        session.ensure_folder()?;
        Ok(Self {
            camera_config,
            open,
            camera: None,
            session,
            stream: StreamController::new(),
            status: "Camera not started".to_string(),
        })
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn state(&self) -> StreamState {
        self.stream.state()
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn buttons(&self) -> ButtonStates {
        let running = self.stream.is_running();
        ButtonStates {
            start: self.stream.state() == StreamState::Idle,
            capture: running,
            stop: running,
        }
    }

    /// Press a button. Disabled buttons are ignored.
    pub fn apply(&mut self, action: CaptureAction) -> Result<()> {
        if !self.buttons().enabled(action) {
            log::debug!("{:?} ignored while {:?}", action, self.state());
            return Ok(());
        }
        match action {
            CaptureAction::Start => self.start_camera(),
            CaptureAction::Capture => self.capture_image().map(|_| ()),
            CaptureAction::Stop => self.stop_camera(),
        }
    }

    /// Open and start the camera. No-op while already running.
    ///
    /// On failure the status line carries the error and the controller stays idle.
    pub fn start_camera(&mut self) -> Result<()> {
        if self.stream.state() != StreamState::Idle {
            return Ok(());
        }
        let opened = (self.open)(&self.camera_config).and_then(|mut camera| {
            camera.start()?;
            Ok(camera)
        });
        match opened {
            Ok(camera) => {
                self.camera = Some(camera);
                self.stream.start()?;
                self.status = "Camera started".to_string();
                Ok(())
            }
            Err(err) => {
                self.status = format!("Failed to start camera: {:#}", err);
                Err(err.context("failed to start camera"))
            }
        }
    }

    /// One preview timer tick.
    ///
    /// Returns the downscaled preview when a new frame arrived and records the
    /// full resolution frame for the next capture.
    pub fn refresh_preview(&mut self) -> Result<Option<RgbImage>> {
        if !self.stream.is_running() {
            return Ok(None);
        }
        let Some(camera) = self.camera.as_mut() else {
            return Ok(None);
        };
        let Some(pair) = camera.poll()? else {
            return Ok(None);
        };

        let cfg = self.session.config();
        let full = fit_to(&pair.color.to_rgb_image(), cfg.frame_width, cfg.frame_height);
        let preview = fit_to(&full, cfg.preview_width, cfg.preview_height);
        self.session.set_latest(full);
        Ok(Some(preview))
    }

    /// Save the latest preview frame. No-op before the first preview.
    pub fn capture_image(&mut self) -> Result<Option<PathBuf>> {
        let saved = self.session.capture()?;
        if let Some(path) = &saved {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.status = format!("Saved: {}", name);
        }
        Ok(saved)
    }

    /// Stop and release the camera. No-op while idle.
    ///
    /// A failing camera stop is logged; the controller still returns to idle.
    pub fn stop_camera(&mut self) -> Result<()> {
        if !self.stream.is_running() {
            return Ok(());
        }
        self.stream.request_stop()?;
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop() {
                log::warn!("camera stop failed: {:#}", err);
            }
        }
        self.session.clear_latest();
        self.stream.finish_stop()?;
        self.status = "Camera stopped".to_string();
        Ok(())
    }
}

const PANEL_BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);
const PREVIEW_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const TEXT_ENABLED: Rgb<u8> = Rgb([240, 240, 240]);
const TEXT_DISABLED: Rgb<u8> = Rgb([110, 110, 110]);

/// Compose the capture window: preview on top, status line and buttons below.
///
/// Without a preview the image area is left black.
pub fn render_panel(
    preview: Option<&RgbImage>,
    status: &str,
    buttons: ButtonStates,
    width: u32,
    height: u32,
) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height + PANEL_HEIGHT, PREVIEW_BACKGROUND);
    if let Some(preview) = preview {
        let fitted = fit_to(preview, width, height);
        image::imageops::replace(&mut canvas, &fitted, 0, 0);
    }

    let top = height as i32;
    fill_rect(&mut canvas, 0, top, width as i32, top + PANEL_HEIGHT as i32, PANEL_BACKGROUND);
    draw_text(&mut canvas, 4, top + 4, status, TEXT_ENABLED, 1);

    let mut x = 4;
    let y = top + 22;
    for action in CaptureAction::ALL {
        let label = action.label();
        let (w, h) = text_size(label, 1);
        let color = if buttons.enabled(action) {
            TEXT_ENABLED
        } else {
            TEXT_DISABLED
        };
        draw_rect(&mut canvas, x - 2, y - 2, x + w as i32 + 2, y + h as i32 + 2, color, 1);
        draw_text(&mut canvas, x, y, label, color, 1);
        x += w as i32 + 12;
    }
    canvas
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Err(err) = self.stop_camera() {
            log::warn!("camera shutdown on exit failed: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(image_file_name(0, "jpg"), "image_0000.jpg");
        assert_eq!(image_file_name(42, "png"), "image_0042.png");
        assert_eq!(image_file_name(12345, "jpg"), "image_12345.jpg");
    }

    #[test]
    fn capture_without_frame_is_noop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("captured_images");
        let mut session = CaptureSession::new(CaptureConfig {
            folder: folder.clone(),
            ..CaptureConfig::default()
        });
        assert_eq!(session.capture()?, None);
        assert_eq!(session.next_index(), 0);
        assert!(!folder.exists());
        Ok(())
    }

    #[test]
    fn buttons_follow_stream_state() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let camera = CameraConfig {
            device: "stub://buttons".to_string(),
            ..CameraConfig::default()
        }
        .color_only();
        let mut ctl = CaptureController::new(
            camera,
            CaptureConfig {
                folder: dir.path().to_path_buf(),
                ..CaptureConfig::default()
            },
        )?;
        assert_eq!(ctl.status(), "Camera not started");
        assert_eq!(
            ctl.buttons(),
            ButtonStates { start: true, capture: false, stop: false }
        );

        ctl.start_camera()?;
        assert_eq!(ctl.status(), "Camera started");
        assert_eq!(
            ctl.buttons(),
            ButtonStates { start: false, capture: true, stop: true }
        );

        ctl.stop_camera()?;
        assert_eq!(ctl.status(), "Camera stopped");
        assert_eq!(ctl.state(), StreamState::Idle);
        assert!(ctl.buttons().start);
        Ok(())
    }

    #[test]
    fn key_shortcuts_map_to_buttons() {
        assert_eq!(CaptureAction::from_key('S'), Some(CaptureAction::Start));
        assert_eq!(CaptureAction::from_key('c'), Some(CaptureAction::Capture));
        assert_eq!(CaptureAction::from_key(' '), Some(CaptureAction::Capture));
        assert_eq!(CaptureAction::from_key('x'), Some(CaptureAction::Stop));
        assert_eq!(CaptureAction::from_key('q'), None);
    }

    #[test]
    fn disabled_buttons_are_ignored() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let camera = CameraConfig {
            device: "stub://apply".to_string(),
            ..CameraConfig::default()
        };
        let mut ctl = CaptureController::new(
            camera,
            CaptureConfig {
                folder: dir.path().to_path_buf(),
                ..CaptureConfig::default()
            },
        )?;
        ctl.apply(CaptureAction::Stop)?;
        ctl.apply(CaptureAction::Capture)?;
        assert_eq!(ctl.status(), "Camera not started");
        ctl.apply(CaptureAction::Start)?;
        assert_eq!(ctl.state(), StreamState::Running);
        Ok(())
    }

    #[test]
    fn panel_stacks_preview_above_status_strip() {
        let preview = RgbImage::from_pixel(PREVIEW_WIDTH, PREVIEW_HEIGHT, Rgb([0, 200, 0]));
        let buttons = ButtonStates { start: true, capture: false, stop: false };
        let panel = render_panel(
            Some(&preview),
            "Camera not started",
            buttons,
            PREVIEW_WIDTH,
            PREVIEW_HEIGHT,
        );
        assert_eq!(panel.dimensions(), (PREVIEW_WIDTH, PREVIEW_HEIGHT + PANEL_HEIGHT));
        assert_eq!(*panel.get_pixel(10, 10), Rgb([0, 200, 0]));
        let strip_has_text = (PREVIEW_HEIGHT..PREVIEW_HEIGHT + PANEL_HEIGHT)
            .flat_map(|y| (0..PREVIEW_WIDTH).map(move |x| (x, y)))
            .any(|(x, y)| *panel.get_pixel(x, y) == TEXT_ENABLED);
        assert!(strip_has_text);
    }
}
