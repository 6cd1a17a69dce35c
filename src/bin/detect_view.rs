//! detect_view - live object detection with distance readout
//!
//! 1. Asks for a YOLOv8 model (unless one is configured)
//! 2. Starts the depth camera on a worker thread
//! 3. Runs detection on every color frame and draws boxes, labels and the
//!    distance at each box center
//! 4. Shows the newest annotated frame until the window is closed or Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use depthcam::gui::{self, ImageWindow, UiEvent};
use depthcam::{
    open_camera, open_detector, AppConfig, Annotator, DetectionWorker, DetectorSettings,
    FrameProcessor, FrameSlot, FrameSource, ShutdownOutcome, StreamController, WorkerOptions,
    DEFAULT_HEIGHT, DEFAULT_WIDTH,
};

const WINDOW_TITLE: &str = "YOLOv8 RealSense Detection";
/// Longest the UI waits for a frame before checking window events again.
const UI_TICK: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// YOLOv8 ONNX model; skips the file picker.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Camera serial number, or stub://<name> for the synthetic source.
    #[arg(long)]
    camera: Option<String>,
}

#[show_image::main]
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load()?;
    if let Some(camera) = args.camera {
        cfg.camera.device = camera;
    }

    let model_path = match args
        .model
        .or_else(|| cfg.model_path.clone())
        .or_else(gui::pick_model_file)
    {
        Some(path) => path,
        None => {
            gui::show_info("No model selected", "Exiting.");
            log::info!("no model selected, exiting");
            return Ok(());
        }
    };

    let mut settings = DetectorSettings::new(&model_path);
    settings.confidence_threshold = cfg.confidence_threshold;
    let detector = match open_detector(&settings) {
        Ok(detector) => detector,
        Err(err) => {
            log::error!("failed to load model {}: {:#}", model_path.display(), err);
            gui::show_error("Error", &format!("{:#}", err));
            return Err(err);
        }
    };
    let mut processor = FrameProcessor::new(detector, Annotator::default());
    if let Err(err) = processor.warm_up() {
        log::error!("model {} failed its first inference: {:#}", model_path.display(), err);
        gui::show_error("Error", &format!("{:#}", err));
        return Err(err);
    }

    // Open the window before the camera so a window failure never strands it.
    let mut window = match ImageWindow::open(WINDOW_TITLE, DEFAULT_WIDTH, DEFAULT_HEIGHT) {
        Ok(window) => window,
        Err(err) => {
            log::error!("failed to open window: {:#}", err);
            gui::show_error("Error", &format!("{:#}", err));
            return Err(err);
        }
    };

    let slot = FrameSlot::new();
    let camera_cfg = cfg.camera.clone();
    let opener = Box::new(move || -> Result<Box<dyn FrameSource>> { open_camera(&camera_cfg) });
    let mut stream = StreamController::new();
    let worker = match DetectionWorker::spawn(
        opener,
        processor,
        slot.clone(),
        WorkerOptions::default(),
    ) {
        Ok(worker) => worker,
        Err(err) => {
            log::error!("failed to start camera: {:#}", err);
            gui::show_error("Error", &format!("{:#}", err));
            return Err(err);
        }
    };
    stream.start()?;
    log::info!(
        "detect_view running: model={} camera={}",
        model_path.display(),
        cfg.camera.device
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut worker_ended = false;
    while !interrupted.load(Ordering::SeqCst) {
        if let Some(frame) = slot.wait_take(UI_TICK) {
            if let Err(err) = window.show(&frame) {
                log::error!("failed to display frame: {:#}", err);
                break;
            }
        }
        let events = window.poll_events();
        if window.is_closed() || events.contains(&UiEvent::Key('\u{1b}')) {
            break;
        }
        if !worker_ended && worker.is_finished() {
            // Frame loop failed; keep the last frame up until the user closes.
            worker_ended = true;
            if let Some(err) = worker.status().last_error {
                log::error!("detection stopped: {}", err);
            }
        }
    }

    log::info!("Stopping...");
    if let ShutdownOutcome::Joined(status) = worker.shutdown_stream(&mut stream, cfg.join_timeout)? {
        log::info!(
            "detection worker stopped after {} frames ({} empty polls)",
            status.frames_rendered,
            status.skipped_polls
        );
    }
    log::debug!("stream state at exit: {:?}", stream.state());
    Ok(())
}
