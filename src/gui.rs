//! Windows and dialogs for the two tools.
//!
//! Windows come from `show_image`, whose event loop owns the main thread; the
//! tools run their own loop on the thread `#[show_image::main]` hands them and
//! talk to the window through a `WindowProxy`. Dialogs use `rfd`.

use anyhow::{anyhow, Result};
use image::RgbImage;
use show_image::event::{ElementState, VirtualKeyCode, WindowEvent};
use show_image::{ImageInfo, ImageView, WindowOptions, WindowProxy};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::detect::MODEL_EXTENSION;

/// What the tools care about from the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// A key was pressed; letters are reported lowercase.
    Key(char),
    /// The user closed the window.
    Closed,
}

pub struct ImageWindow {
    title: String,
    proxy: WindowProxy,
    events: Receiver<WindowEvent>,
    closed: bool,
}

impl ImageWindow {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
        let proxy = show_image::create_window(
            title,
            WindowOptions {
                size: Some([width, height]),
                default_controls: false,
                ..Default::default()
            },
        )
        .map_err(|e| anyhow!("failed to create window {:?}: {}", title, e))?;
        let events = proxy
            .event_channel()
            .map_err(|e| anyhow!("failed to subscribe to window events: {}", e))?;
        Ok(Self {
            title: title.to_string(),
            proxy,
            events,
            closed: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replace the displayed image.
    pub fn show(&mut self, image: &RgbImage) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let (width, height) = image.dimensions();
        let view = ImageView::new(ImageInfo::rgb8(width, height), image.as_raw());
        if let Err(e) = self.proxy.set_image("frame", view) {
            // The window is gone once its id is no longer valid.
            log::debug!("window {:?} rejected image: {}", self.title, e);
            self.closed = true;
        }
        Ok(())
    }

    /// Drain pending window events without blocking.
    pub fn poll_events(&mut self) -> Vec<UiEvent> {
        let mut out = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(ev) = translate(&event) {
                        if ev == UiEvent::Closed {
                            self.closed = true;
                        }
                        out.push(ev);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.closed {
                        self.closed = true;
                        out.push(UiEvent::Closed);
                    }
                    break;
                }
            }
        }
        out
    }
}

fn translate(event: &WindowEvent) -> Option<UiEvent> {
    match event {
        WindowEvent::CloseRequested(_) | WindowEvent::Destroyed(_) => Some(UiEvent::Closed),
        WindowEvent::KeyboardInput(ev) if ev.input.state == ElementState::Pressed => {
            ev.input.key_code.and_then(key_char).map(UiEvent::Key)
        }
        _ => None,
    }
}

fn key_char(code: VirtualKeyCode) -> Option<char> {
    let c = match code {
        VirtualKeyCode::S => 's',
        VirtualKeyCode::C => 'c',
        VirtualKeyCode::X => 'x',
        VirtualKeyCode::Q => 'q',
        VirtualKeyCode::Space => ' ',
        VirtualKeyCode::Escape => '\u{1b}',
        _ => return None,
    };
    Some(c)
}

// ----------------------------------------------------------------------------
// Dialogs
// ----------------------------------------------------------------------------

/// Ask for a YOLOv8 model file. `None` when the user cancels.
pub fn pick_model_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select YOLOv8 Model")
        .add_filter("ONNX YOLOv8 Model", &[MODEL_EXTENSION])
        .pick_file()
}

pub fn show_error(title: &str, message: &str) {
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title(title)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

pub fn show_info(title: &str, message: &str) {
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Info)
        .set_title(title)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}
