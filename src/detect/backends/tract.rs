#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::{ClassNames, NAMES_METADATA_KEY};
use crate::detect::postprocess::{
    decode_yolov8, into_detections, non_max_suppression, InputScale,
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, MAX_DETECTIONS,
};
use crate::detect::result::Detection;
use crate::frame::{fit_to, ColorFrame};

/// Tract-based YOLOv8 backend for ONNX exports.
///
/// The model is loaded once from a local file and run on the CPU. Frames are
/// stretched to the square model input; boxes are mapped back to frame pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    class_names: Option<ClassNames>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let class_names = read_class_names(model_path)?;
        match &class_names {
            Some(names) => log::info!("model declares {} class names", names.len()),
            None => log::warn!(
                "model {} has no class names; using COCO labels",
                model_path.display()
            ),
        }

        Ok(Self {
            model,
            class_names,
            input_size,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &ColorFrame) -> Tensor {
        let side = self.input_size;
        let resized = fit_to(&frame.to_rgb_image(), side, side);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, side as usize, side as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &ColorFrame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let (channels, anchors) = match shape.as_slice() {
            [1, channels, anchors] => (*channels, *anchors),
            other => return Err(anyhow!("unexpected YOLOv8 output shape {:?}", other)),
        };
        let data: Vec<f32> = view.iter().copied().collect();

        let scale = InputScale::new(frame.width, frame.height, self.input_size, self.input_size);
        let candidates = decode_yolov8(&data, channels, anchors, self.confidence_threshold, scale)?;
        let kept = non_max_suppression(candidates, self.iou_threshold, MAX_DETECTIONS);
        Ok(into_detections(kept, self.class_names.as_ref()))
    }

    pub fn class_names(&self) -> Option<&ClassNames> {
        self.class_names.as_ref()
    }
}

/// Class names from the export's `names` metadata entry, if present.
fn read_class_names(model_path: &Path) -> Result<Option<ClassNames>> {
    let proto = tract_onnx::onnx()
        .proto_model_for_path(model_path)
        .with_context(|| format!("failed to read ONNX metadata from {}", model_path.display()))?;
    Ok(proto
        .metadata_props
        .iter()
        .find(|prop| prop.key == NAMES_METADATA_KEY)
        .and_then(|prop| ClassNames::from_metadata(&prop.value)))
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &ColorFrame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = ColorFrame::from_bgr(vec![114; (side * side * 3) as usize], side, side)?;
        self.detect(&blank).map(|_| ())
    }
}
