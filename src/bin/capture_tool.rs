//! capture_tool - color preview and still capture
//!
//! Keys: S starts the camera, C or Space saves the current frame, X stops the
//! camera. Frames are written to the capture folder as image_0000.jpg, ...

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use depthcam::capture::{render_panel, PREVIEW_INTERVAL};
use depthcam::gui::{self, ImageWindow, UiEvent};
use depthcam::{AppConfig, CaptureAction, CaptureController};

const WINDOW_TITLE: &str = "RealSense Camera Capture";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera serial number, or stub://<name> for the synthetic source.
    #[arg(long)]
    camera: Option<String>,
    /// Folder for saved images.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[show_image::main]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load()?;
    if let Some(camera) = args.camera {
        cfg.camera.device = camera;
    }
    if let Some(out) = args.out {
        cfg.capture.folder = out;
    }

    let preview_size = (cfg.capture.preview_width, cfg.capture.preview_height);
    let mut controller = CaptureController::new(cfg.camera.clone().color_only(), cfg.capture.clone())?;
    let mut window = ImageWindow::open(
        WINDOW_TITLE,
        preview_size.0,
        preview_size.1 + depthcam::capture::PANEL_HEIGHT,
    )?;
    log::info!(
        "capture_tool ready: camera={} folder={}",
        cfg.camera.device,
        cfg.capture.folder.display()
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut preview = None;
    let mut dirty = true;
    while !interrupted.load(Ordering::SeqCst) {
        let tick = Instant::now();

        for event in window.poll_events() {
            let UiEvent::Key(key) = event else { continue };
            let Some(action) = CaptureAction::from_key(key) else {
                continue;
            };
            if let Err(err) = controller.apply(action) {
                log::error!("{:?} failed: {:#}", action, err);
                if action == CaptureAction::Start {
                    gui::show_error("Error", controller.status());
                }
            }
            if action == CaptureAction::Stop {
                preview = None;
            }
            dirty = true;
        }
        if window.is_closed() {
            break;
        }

        match controller.refresh_preview() {
            Ok(Some(frame)) => {
                preview = Some(frame);
                dirty = true;
            }
            Ok(None) => {}
            Err(err) => {
                log::error!("preview failed: {:#}", err);
                controller.stop_camera()?;
                preview = None;
                dirty = true;
            }
        }

        if dirty {
            let panel = render_panel(
                preview.as_ref(),
                controller.status(),
                controller.buttons(),
                preview_size.0,
                preview_size.1,
            );
            window.show(&panel)?;
            dirty = false;
        }

        if let Some(rest) = PREVIEW_INTERVAL.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    log::info!("Stopping...");
    controller.stop_camera()?;
    Ok(())
}
