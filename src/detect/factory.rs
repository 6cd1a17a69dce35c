use std::path::PathBuf;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::StubBackend;

/// File extension accepted by the model picker and the loader.
pub const MODEL_EXTENSION: &str = "onnx";
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Which model to load and how to run it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorSettings {
    /// Local `.onnx` file, or `stub://…` for a detector that never reports objects.
    pub model_path: PathBuf,
    /// Square model input side in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
}

impl DetectorSettings {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: super::postprocess::DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    fn is_stub(&self) -> bool {
        self.model_path.to_string_lossy().starts_with("stub://")
    }
}

/// Load the detector backend named by `settings.model_path`.
pub fn open_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    if settings.is_stub() {
        return Ok(Box::new(StubBackend::new()));
    }

    let path = &settings.model_path;
    let has_model_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION));
    if !has_model_ext {
        return Err(anyhow!(
            "model {} must be a .{} file",
            path.display(),
            MODEL_EXTENSION
        ));
    }
    if !path.is_file() {
        return Err(anyhow!("model file {} does not exist", path.display()));
    }

    #[cfg(feature = "backend-tract")]
    {
        let backend = super::backends::TractBackend::new(path, settings.input_size)?
            .with_threshold(settings.confidence_threshold);
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "loading {} requires the backend-tract feature",
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_model_path_opens_stub_backend() -> Result<()> {
        let backend = open_detector(&DetectorSettings::new("stub://none"))?;
        assert_eq!(backend.name(), "stub");
        Ok(())
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = open_detector(&DetectorSettings::new("/tmp/yolov8n.pt"))
            .err()
            .expect("pt rejected");
        assert!(err.to_string().contains(".onnx"));
    }

    #[test]
    fn rejects_missing_file() {
        let err = open_detector(&DetectorSettings::new("/nonexistent/dir/yolov8n.onnx"))
            .err()
            .expect("missing rejected");
        assert!(err.to_string().contains("does not exist"));
    }
}
