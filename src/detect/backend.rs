use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::ColorFrame;

/// Object detector backend.
///
/// A backend sees one frame at a time and returns the detections for that frame
/// only; there is no tracking or smoothing across calls. Inference runs
/// synchronously on the calling thread, so its latency bounds the display rate.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a single color frame.
    ///
    /// Boxes are returned in the frame's pixel coordinates.
    fn detect(&mut self, frame: &ColorFrame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
