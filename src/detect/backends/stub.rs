use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::ColorFrame;

/// Stub backend. Returns the same scripted detections for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    detections: Vec<Detection>,
    fail_on_call: Option<u64>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            ..Self::default()
        }
    }

    /// Fail on the n-th call to `detect` (1-based).
    pub fn failing_on(mut self, call: u64) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &ColorFrame) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(anyhow!("stub detector failure on call {}", self.calls));
        }
        Ok(self.detections.clone())
    }
}
