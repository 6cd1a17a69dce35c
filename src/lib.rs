//! Depth camera object detection
//!
//! Library behind the two depthcam tools:
//!
//! - `detect_view`: pulls paired color/depth frames from a depth camera, runs a
//!   YOLOv8 detector on every color frame and displays boxes, labels and the
//!   distance to each object's center.
//! - `capture_tool`: previews the color stream and saves still frames as
//!   numbered images.
//!
//! # Module Structure
//!
//! - `camera`: frame sources (synthetic `stub://`, Intel RealSense)
//! - `frame`: color/depth frame types and resizing
//! - `detect`: detector backends (stub, tract ONNX) and YOLOv8 post-processing
//! - `annotate`, `overlay`: depth lookup and drawing
//! - `slot`, `stream`, `pipeline`: worker thread, frame handoff, stream lifecycle
//! - `capture`: capture session and controller
//! - `config`: layered configuration
//! - `gui`: windows and dialogs (feature: gui)

pub mod annotate;
pub mod camera;
pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
#[cfg(feature = "gui")]
pub mod gui;
pub mod overlay;
pub mod pipeline;
pub mod slot;
pub mod stream;

/// Stream resolution and frame rate used by both tools.
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

pub use annotate::{Annotation, Annotator, AnnotatorConfig, ObjectReading};
pub use camera::{open_camera, CameraConfig, FrameSource, SourceStats, SyntheticCamera};
#[cfg(feature = "camera-realsense")]
pub use camera::RealSenseCamera;
pub use capture::{
    ButtonStates, CaptureAction, CaptureConfig, CaptureController, CaptureSession,
};
pub use config::AppConfig;
pub use detect::{open_detector, BoundingBox, Detection, DetectorBackend, DetectorSettings};
pub use frame::{ColorFrame, DepthFrame, FramePair};
pub use pipeline::{
    DetectionWorker, FrameProcessor, ShutdownOutcome, WorkerHandle, WorkerOptions, WorkerStatus,
};
pub use slot::FrameSlot;
pub use stream::{StreamController, StreamState};
